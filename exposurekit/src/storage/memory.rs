//! In-memory storage media.
//!
//! These keep everything in process memory and are NOT durable. They exist so
//! the facade can be exercised in tests, and so hosts can simulate app
//! reinstalls by dropping the [`MemoryDefaults`] while keeping the durable
//! stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::traits::{DefaultsValue, EphemeralStore, KeyStore, SecureItemStore, StorageProvider};
use crate::error::{StoreError, StoreResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Memory Defaults
// =============================================================================

/// In-memory ephemeral store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryDefaults {
    values: Mutex<HashMap<String, DefaultsValue>>,
}

impl MemoryDefaults {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    /// Returns the stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.values).keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl EphemeralStore for MemoryDefaults {
    fn get(&self, key: String) -> Option<DefaultsValue> {
        lock(&self.values).get(&key).cloned()
    }

    fn set(&self, key: String, value: DefaultsValue) {
        lock(&self.values).insert(key, value);
    }

    fn remove(&self, key: String) {
        lock(&self.values).remove(&key);
    }
}

// =============================================================================
// Memory durable items
// =============================================================================

/// Slot map shared by the in-memory durable stores, with failure injection.
#[derive(Default)]
struct Items {
    items: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Items {
    fn read(&self, slot: &str) -> Result<Option<Vec<u8>>, String> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(format!("read of {slot} rejected"));
        }
        Ok(lock(&self.items).get(slot).cloned())
    }

    fn write(&self, slot: String, bytes: Vec<u8>) -> Result<(), String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(format!("write of {slot} rejected"));
        }
        lock(&self.items).insert(slot, bytes);
        Ok(())
    }

    fn delete(&self, slot: &str) -> Result<(), String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(format!("delete of {slot} rejected"));
        }
        lock(&self.items).remove(slot);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}

/// In-memory secure item store.
///
/// Writes and deletes can be made to fail, mimicking a Keychain that rejects
/// access while the device is locked.
#[derive(Default)]
pub struct MemorySecureItemStore {
    inner: Items,
}

impl MemorySecureItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes and deletes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns `true` if no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SecureItemStore for MemorySecureItemStore {
    fn read(&self, slot: String) -> StoreResult<Option<Vec<u8>>> {
        self.inner.read(&slot).map_err(StoreError::SecureStore)
    }

    fn write(&self, slot: String, bytes: Vec<u8>) -> StoreResult<()> {
        self.inner.write(slot, bytes).map_err(StoreError::SecureStore)
    }

    fn delete(&self, slot: String) -> StoreResult<()> {
        self.inner.delete(&slot).map_err(StoreError::SecureStore)
    }
}

/// In-memory key store.
#[derive(Default)]
pub struct MemoryKeyStore {
    inner: Items,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent saves and deletes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns `true` if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl KeyStore for MemoryKeyStore {
    fn read_key(&self, tag: String) -> StoreResult<Option<Vec<u8>>> {
        self.inner.read(&tag).map_err(StoreError::KeyStore)
    }

    fn save_key(&self, tag: String, key: Vec<u8>) -> StoreResult<()> {
        self.inner.write(tag, key).map_err(StoreError::KeyStore)
    }

    fn delete_key(&self, tag: String) -> StoreResult<()> {
        self.inner.delete(&tag).map_err(StoreError::KeyStore)
    }
}

// =============================================================================
// Memory provider
// =============================================================================

/// Bundles in-memory media into a [`StorageProvider`].
#[derive(Clone, Default)]
pub struct MemoryStorageProvider {
    /// Ephemeral store handed to the facade.
    pub defaults: Arc<MemoryDefaults>,
    /// Secure item store handed to the facade.
    pub secure_items: Arc<MemorySecureItemStore>,
    /// Key store handed to the facade.
    pub keys: Arc<MemoryKeyStore>,
}

impl MemoryStorageProvider {
    /// Creates a provider with empty media.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates uninstall and reinstall: the ephemeral store is replaced by
    /// an empty one while the durable stores are kept.
    #[must_use]
    pub fn reinstalled(&self) -> Self {
        Self {
            defaults: Arc::new(MemoryDefaults::new()),
            secure_items: Arc::clone(&self.secure_items),
            keys: Arc::clone(&self.keys),
        }
    }
}

impl StorageProvider for MemoryStorageProvider {
    fn defaults(&self) -> Arc<dyn EphemeralStore> {
        self.defaults.clone()
    }

    fn secure_items(&self) -> Arc<dyn SecureItemStore> {
        self.secure_items.clone()
    }

    fn key_store(&self) -> Arc<dyn KeyStore> {
        self.keys.clone()
    }
}
