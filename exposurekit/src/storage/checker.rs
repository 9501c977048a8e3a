//! Detects drift between the ephemeral store and the durable stores.
//!
//! Durable stores outlive an uninstall, the ephemeral store does not. After a
//! reinstall the app would otherwise resume with a stale secret key and no
//! matching app state. A sentinel flag in the ephemeral store records that
//! the current install has accepted the durable contents.

use std::sync::Arc;

use super::defaults::Defaults;
use super::traits::DurableStore;

pub(crate) const SYNC_SENTINEL_KEY: &str = "durableStoresSynced";

/// Consistency of the ephemeral store with the durable stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum StorageState {
    /// The sentinel is set: this install already accepted the durable stores.
    InSync,
    /// No sentinel and nothing durable: a fresh install.
    NotInitialized,
    /// No sentinel but durable data exists: the app was reinstalled and the
    /// durable data belongs to a previous install.
    OutOfSync,
}

/// Classifies storage using only the sentinel and durable presence predicates.
///
/// A store whose presence cannot be read counts as populated, so the stores
/// are never marked synced while their contents are unknown.
pub(crate) struct StorageChecker {
    defaults: Defaults,
    durable: Vec<Arc<dyn DurableStore>>,
}

impl StorageChecker {
    pub(crate) fn new(defaults: Defaults, durable: Vec<Arc<dyn DurableStore>>) -> Self {
        Self { defaults, durable }
    }

    pub(crate) fn state(&self) -> StorageState {
        if self.defaults.flag(SYNC_SENTINEL_KEY) {
            return StorageState::InSync;
        }
        let populated: Vec<&'static str> = self
            .durable
            .iter()
            .filter(|store| match store.has_data() {
                Ok(has_data) => has_data,
                Err(err) => {
                    // Unknown contents are never marked synced.
                    log::warn!("cannot probe {}, assuming it holds data: {err}", store.name());
                    true
                }
            })
            .map(|store| store.name())
            .collect();
        if populated.is_empty() {
            StorageState::NotInitialized
        } else {
            log::warn!(
                "durable data without sync sentinel: {}",
                populated.join(", ")
            );
            StorageState::OutOfSync
        }
    }

    pub(crate) fn mark_as_synced(&self) {
        self.defaults.set_flag(SYNC_SENTINEL_KEY, true);
    }
}
