//! Value objects persisted by the facade.

use std::fmt;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{StoreError, StoreResult};

/// Public key used to rotate the device's broadcast identifier.
///
/// Holds a SEC1-encoded P-256 point. Two keys are equal when they encode the
/// same point, so a compressed and an uncompressed encoding of one key
/// compare equal.
#[derive(Clone, uniffi::Record)]
pub struct BroadcastKey {
    /// SEC1 encoding of the public key.
    pub sec1_bytes: Vec<u8>,
}

impl BroadcastKey {
    /// Parses and normalizes a SEC1-encoded P-256 public key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if `bytes` is not a valid point.
    pub fn from_sec1(bytes: &[u8]) -> StoreResult<Self> {
        let key = parse_public_key(bytes)?;
        Ok(Self::from_public_key(&key))
    }

    /// Wraps a parsed key using its uncompressed encoding.
    #[must_use]
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self {
            sec1_bytes: key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Returns the parsed public key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] if the stored bytes are not a valid point.
    pub fn public_key(&self) -> StoreResult<PublicKey> {
        parse_public_key(&self.sec1_bytes)
    }

    /// Returns the uncompressed SEC1 encoding, validating the key.
    pub(crate) fn normalized(&self) -> StoreResult<Vec<u8>> {
        Ok(self
            .public_key()?
            .to_encoded_point(false)
            .as_bytes()
            .to_vec())
    }

    /// Short hex fingerprint for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.sec1_bytes);
        hex::encode(&digest[..8])
    }
}

fn parse_public_key(bytes: &[u8]) -> StoreResult<PublicKey> {
    PublicKey::from_sec1_bytes(bytes).map_err(|err| StoreError::InvalidKey(err.to_string()))
}

impl PartialEq for BroadcastKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.public_key(), other.public_key()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.sec1_bytes == other.sec1_bytes,
        }
    }
}

impl Eq for BroadcastKey {}

impl fmt::Debug for BroadcastKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// The device's enrolled identity.
///
/// Never stored as one unit: the id and secret key live in the secure item
/// store, the broadcast key in the key store.
#[derive(Clone, PartialEq, Eq, uniffi::Record)]
pub struct DeviceRegistration {
    /// Identifier assigned by the registration service.
    pub id: String,
    /// Secret shared with the registration service.
    pub secret_key: Vec<u8>,
    /// Public key used for broadcast identifier rotation.
    pub broadcast_rotation_key: BroadcastKey,
}

impl DeviceRegistration {
    /// Joins the credential half with the key half.
    #[must_use]
    pub fn from_parts(partial: &PartialRegistration, broadcast_rotation_key: BroadcastKey) -> Self {
        Self {
            id: partial.id.clone(),
            secret_key: partial.secret_key.clone(),
            broadcast_rotation_key,
        }
    }
}

impl fmt::Debug for DeviceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistration")
            .field("id", &self.id)
            .field("secret_key", &"<redacted>")
            .field("broadcast_rotation_key", &self.broadcast_rotation_key)
            .finish()
    }
}

/// The credential half of a [`DeviceRegistration`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PartialRegistration {
    /// Identifier assigned by the registration service.
    pub id: String,
    /// Secret shared with the registration service.
    pub secret_key: Vec<u8>,
}

impl From<&DeviceRegistration> for PartialRegistration {
    fn from(registration: &DeviceRegistration) -> Self {
        Self {
            id: registration.id.clone(),
            secret_key: registration.secret_key.clone(),
        }
    }
}

impl fmt::Debug for PartialRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialRegistration")
            .field("id", &self.id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Whether a self-diagnosis is the first one or a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
pub enum SelfDiagnosisKind {
    /// First submission.
    Initial,
    /// Follow-up after the initial isolation period.
    Subsequent,
}

/// Symptom reported in a self-diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum Symptom {
    /// High temperature.
    Temperature,
    /// New continuous cough.
    Cough,
    /// Loss of smell or taste.
    Anosmia,
    /// Sneezing.
    Sneeze,
    /// Nausea.
    Nausea,
}

/// A health-status submission made by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct SelfDiagnosis {
    /// Initial or follow-up submission.
    pub kind: SelfDiagnosisKind,
    /// Reported symptoms.
    pub symptoms: Vec<Symptom>,
    /// Symptom onset, seconds since the Unix epoch.
    pub start_date: u64,
    /// End of the isolation period, seconds since the Unix epoch.
    pub expiry_date: u64,
}

/// What happened during a contact-event upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
pub enum UploadLogEvent {
    /// An upload started.
    Started {
        /// Date of the newest contact event included, seconds since the Unix epoch.
        last_contact_event_date: u64,
    },
    /// An upload finished.
    Completed {
        /// Failure description, if the upload failed.
        error: Option<String>,
    },
}

/// One entry of the upload log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct UploadLogEntry {
    /// When the event happened, seconds since the Unix epoch.
    pub date: u64,
    /// The recorded event.
    pub event: UploadLogEvent,
}

/// Events reported to the monitoring sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum AppEvent {
    /// A registration was stored.
    RegistrationSucceeded,
    /// The user provided a partial postcode.
    PartialPostcodeProvided,
}
