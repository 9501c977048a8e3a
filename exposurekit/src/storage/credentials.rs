//! Secure credential store: the id and secret key half of the registration.

use std::sync::Arc;

use super::envelope::RegistrationEnvelope;
use super::traits::{DurableStore, SecureItemStore};
use crate::error::StoreResult;
use crate::types::PartialRegistration;

/// Holds the [`PartialRegistration`] in a single secure item slot.
pub struct CredentialStore {
    items: Arc<dyn SecureItemStore>,
    slot: String,
}

impl CredentialStore {
    /// Creates a store over `items`, using `slot` for the registration.
    #[must_use]
    pub fn new(items: Arc<dyn SecureItemStore>, slot: impl Into<String>) -> Self {
        Self {
            items,
            slot: slot.into(),
        }
    }

    /// Returns the stored credentials.
    ///
    /// Unreadable or undecodable items read as absent.
    #[must_use]
    pub fn get(&self) -> Option<PartialRegistration> {
        let bytes = self.read_raw()?;
        match RegistrationEnvelope::open(&bytes) {
            Ok(registration) => Some(registration),
            Err(err) => {
                log::error!("registration in {} failed to decode: {err}", self.slot);
                None
            }
        }
    }

    /// Replaces the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the medium rejects the write.
    pub fn set(&self, registration: &PartialRegistration) -> StoreResult<()> {
        let bytes = RegistrationEnvelope::seal(registration)?;
        self.items.write(self.slot.clone(), bytes)?;
        log::debug!("stored registration credentials for {}", registration.id);
        Ok(())
    }

    /// Deletes the stored credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the delete.
    pub fn clear(&self) -> StoreResult<()> {
        self.items.delete(self.slot.clone())
    }

    fn read_raw(&self) -> Option<Vec<u8>> {
        match self.items.read(self.slot.clone()) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to read {}: {err}", self.slot);
                None
            }
        }
    }
}

impl DurableStore for CredentialStore {
    fn name(&self) -> &'static str {
        "registration credentials"
    }

    fn has_data(&self) -> StoreResult<bool> {
        Ok(self.items.read(self.slot.clone())?.is_some())
    }

    fn clear(&self) -> StoreResult<()> {
        Self::clear(self)
    }
}
