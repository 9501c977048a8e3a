//! Typed access to the ephemeral store.
//!
//! Composite values are CBOR-encoded into [`DefaultsValue::Data`] blobs.
//! Nothing here fails: unreadable values read as absent and unencodable
//! values are dropped, with a log line saying which.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::traits::{DefaultsValue, EphemeralStore};
use crate::error::{StoreError, StoreResult};

/// How bad it is when a stored value no longer decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeFailure {
    /// Losing the value is acceptable, e.g. diagnostic history.
    Tolerated,
    /// The value should always decode; failure points at a bug.
    Unexpected,
}

/// Typed view over an [`EphemeralStore`].
#[derive(Clone)]
pub(crate) struct Defaults {
    store: Arc<dyn EphemeralStore>,
}

impl Defaults {
    pub(crate) fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    pub(crate) fn string(&self, key: &str) -> Option<String> {
        match self.store.get(key.to_string())? {
            DefaultsValue::Text { value } => Some(value),
            other => type_mismatch(key, "text", &other),
        }
    }

    pub(crate) fn set_string(&self, key: &str, value: Option<String>) {
        match value {
            Some(value) => self.store.set(key.to_string(), DefaultsValue::Text { value }),
            None => self.remove(key),
        }
    }

    pub(crate) fn date(&self, key: &str) -> Option<u64> {
        match self.store.get(key.to_string())? {
            DefaultsValue::Date { seconds } => Some(seconds),
            other => type_mismatch(key, "date", &other),
        }
    }

    pub(crate) fn set_date(&self, key: &str, seconds: Option<u64>) {
        match seconds {
            Some(seconds) => self
                .store
                .set(key.to_string(), DefaultsValue::Date { seconds }),
            None => self.remove(key),
        }
    }

    /// Reads a flag; absent reads as `false`.
    pub(crate) fn flag(&self, key: &str) -> bool {
        match self.store.get(key.to_string()) {
            None => false,
            Some(DefaultsValue::Flag { value }) => value,
            Some(other) => type_mismatch(key, "flag", &other).unwrap_or(false),
        }
    }

    pub(crate) fn set_flag(&self, key: &str, value: bool) {
        self.store.set(key.to_string(), DefaultsValue::Flag { value });
    }

    pub(crate) fn decoded<T: DeserializeOwned>(
        &self,
        key: &str,
        on_failure: DecodeFailure,
    ) -> Option<T> {
        let bytes = match self.store.get(key.to_string())? {
            DefaultsValue::Data { bytes } => bytes,
            other => return type_mismatch(key, "data", &other),
        };
        match decode(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                match on_failure {
                    DecodeFailure::Tolerated => {
                        log::warn!("discarding undecodable value for {key}: {err}");
                    }
                    DecodeFailure::Unexpected => {
                        log::error!("stored value for {key} failed to decode: {err}");
                    }
                }
                None
            }
        }
    }

    /// Encodes and stores `value`, or removes the key for `None`.
    ///
    /// On encode failure the previously stored value is left in place.
    pub(crate) fn set_encoded<T: Serialize>(&self, key: &str, value: Option<&T>) {
        let Some(value) = value else {
            self.remove(key);
            return;
        };
        match encode(value) {
            Ok(bytes) => self.store.set(key.to_string(), DefaultsValue::Data { bytes }),
            Err(err) => log::error!("failed to encode value for {key}, write dropped: {err}"),
        }
    }

    pub(crate) fn remove(&self, key: &str) {
        self.store.remove(key.to_string());
    }
}

fn type_mismatch<T>(key: &str, expected: &str, found: &DefaultsValue) -> Option<T> {
    log::warn!("ignoring value for {key}: expected {expected}, found {found:?}");
    None
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    Ok(bytes)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Keeps the last `capacity` items, preserving order.
pub(crate) fn keep_most_recent<T>(mut items: Vec<T>, capacity: usize) -> Vec<T> {
    if items.len() > capacity {
        items.drain(..items.len() - capacity);
    }
    items
}
