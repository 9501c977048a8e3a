//! Platform interfaces for persistence.
//!
//! Storage media are split by lifecycle. [`EphemeralStore`] is erased when the
//! app is uninstalled (iOS `UserDefaults`, Android `SharedPreferences`).
//! [`SecureItemStore`] and [`KeyStore`] survive reinstallation (Keychain,
//! Android Keystore-backed storage).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// A value held by the ephemeral store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
pub enum DefaultsValue {
    /// A point in time, seconds since the Unix epoch.
    Date {
        /// Seconds since the Unix epoch.
        seconds: u64,
    },
    /// A string.
    Text {
        /// The string.
        value: String,
    },
    /// A boolean.
    Flag {
        /// The boolean.
        value: bool,
    },
    /// An opaque byte blob, used for encoded composite values.
    Data {
        /// The blob.
        bytes: Vec<u8>,
    },
}

/// Flat key-value store whose contents are erased on uninstall.
///
/// Operations are infallible from the caller's point of view; implementations
/// log their own failures.
#[uniffi::export(with_foreign)]
pub trait EphemeralStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: String) -> Option<DefaultsValue>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: String, value: DefaultsValue);

    /// Removes the value stored under `key`.
    fn remove(&self, key: String);
}

/// Confidential storage that survives reinstallation.
///
/// Items are addressed by a slot name. Implementations must protect items at
/// rest (e.g. Keychain generic passwords with
/// `kSecAttrAccessibleAfterFirstUnlockThisDeviceOnly`).
#[uniffi::export(with_foreign)]
pub trait SecureItemStore: Send + Sync {
    /// Reads the item in `slot`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read (e.g. device locked).
    fn read(&self, slot: String) -> StoreResult<Option<Vec<u8>>>;

    /// Writes `bytes` to `slot`, replacing any existing item.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the write.
    fn write(&self, slot: String, bytes: Vec<u8>) -> StoreResult<()>;

    /// Deletes the item in `slot`. Deleting a missing item succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the delete.
    fn delete(&self, slot: String) -> StoreResult<()>;
}

/// Integrity-protected key storage that survives reinstallation.
///
/// Holds public keys only, so no confidentiality is required, but items must
/// not be modifiable by other apps (e.g. Keychain key items).
#[uniffi::export(with_foreign)]
pub trait KeyStore: Send + Sync {
    /// Reads the key stored under `tag`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn read_key(&self, tag: String) -> StoreResult<Option<Vec<u8>>>;

    /// Saves `key` under `tag`, replacing any existing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the write.
    fn save_key(&self, tag: String, key: Vec<u8>) -> StoreResult<()>;

    /// Deletes the key stored under `tag`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the delete.
    fn delete_key(&self, tag: String) -> StoreResult<()>;
}

/// Provider responsible for the platform storage media.
#[uniffi::export(with_foreign)]
pub trait StorageProvider: Send + Sync {
    /// Returns the ephemeral store.
    fn defaults(&self) -> Arc<dyn EphemeralStore>;

    /// Returns the secure item store.
    fn secure_items(&self) -> Arc<dyn SecureItemStore>;

    /// Returns the key store.
    fn key_store(&self) -> Arc<dyn KeyStore>;
}

/// A store whose contents survive reinstallation.
///
/// This is all the consistency checker needs to know about a durable store.
pub trait DurableStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the store currently holds any data.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read, e.g. a locked keychain.
    fn has_data(&self) -> StoreResult<bool>;

    /// Removes everything the store holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the delete.
    fn clear(&self) -> StoreResult<()>;
}
