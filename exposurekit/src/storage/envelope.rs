//! Registration envelope stored in the secure item store.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::defaults::{decode, encode};
use crate::error::{StoreError, StoreResult};
use crate::types::PartialRegistration;

const ENVELOPE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct RegistrationEnvelope {
    version: u32,
    id: String,
    secret_key: Vec<u8>,
}

impl RegistrationEnvelope {
    pub(crate) fn seal(registration: &PartialRegistration) -> StoreResult<Vec<u8>> {
        let envelope = Self {
            version: ENVELOPE_VERSION,
            id: registration.id.clone(),
            secret_key: registration.secret_key.clone(),
        };
        encode(&envelope)
    }

    pub(crate) fn open(bytes: &[u8]) -> StoreResult<PartialRegistration> {
        let envelope: Self = decode(bytes)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported registration envelope version {}",
                envelope.version
            )));
        }
        Ok(PartialRegistration {
            id: envelope.id.clone(),
            secret_key: envelope.secret_key.clone(),
        })
    }
}
