//! Public key store for the broadcast rotation key.

use std::sync::Arc;

use super::traits::{DurableStore, KeyStore};
use crate::error::StoreResult;
use crate::types::BroadcastKey;

/// Holds the broadcast rotation public key under a single key store tag.
///
/// Kept apart from [`super::CredentialStore`] so that the secret and the
/// public half can be cleared and protected independently.
pub struct PublicKeyStore {
    keys: Arc<dyn KeyStore>,
    tag: String,
}

impl PublicKeyStore {
    /// Creates a store over `keys`, using `tag` for the broadcast key.
    #[must_use]
    pub fn new(keys: Arc<dyn KeyStore>, tag: impl Into<String>) -> Self {
        Self {
            keys,
            tag: tag.into(),
        }
    }

    /// Returns the stored key. Unreadable or invalid keys read as absent.
    #[must_use]
    pub fn read(&self) -> Option<BroadcastKey> {
        let bytes = self.read_raw()?;
        match BroadcastKey::from_sec1(&bytes) {
            Ok(key) => Some(key),
            Err(err) => {
                log::error!("key under {} is not a valid broadcast key: {err}", self.tag);
                None
            }
        }
    }

    /// Validates and stores `key` in uncompressed form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::InvalidKey`] for an invalid key, or the
    /// medium's error if the write is rejected.
    pub fn save(&self, key: &BroadcastKey) -> StoreResult<()> {
        let bytes = key.normalized()?;
        self.keys.save_key(self.tag.clone(), bytes)?;
        log::debug!("stored broadcast key {}", key.fingerprint());
        Ok(())
    }

    /// Deletes the stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the delete.
    pub fn clear(&self) -> StoreResult<()> {
        self.keys.delete_key(self.tag.clone())
    }

    fn read_raw(&self) -> Option<Vec<u8>> {
        match self.keys.read_key(self.tag.clone()) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to read {}: {err}", self.tag);
                None
            }
        }
    }
}

impl DurableStore for PublicKeyStore {
    fn name(&self) -> &'static str {
        "broadcast key"
    }

    fn has_data(&self) -> StoreResult<bool> {
        Ok(self.keys.read_key(self.tag.clone())?.is_some())
    }

    fn clear(&self) -> StoreResult<()> {
        Self::clear(self)
    }
}
