//! Error types for persistence components.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the persistence facade and its backing stores.
#[derive(Debug, Error, uniffi::Error)]
pub enum StoreError {
    /// Errors coming from the secure item store holding the registration.
    #[error("secure store error: {0}")]
    SecureStore(String),

    /// Errors coming from the store holding the broadcast public key.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The broadcast key is not a valid P-256 public key.
    #[error("invalid broadcast key: {0}")]
    InvalidKey(String),

    /// Filesystem failures from file-backed stores.
    #[error("io error: {0}")]
    Io(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for StoreError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}
