//! Per-environment storage configuration.

use strum::EnumString;

/// Default cap on retained upload log entries.
pub const DEFAULT_UPLOAD_LOG_CAPACITY: usize = 100;

/// Default cap on retained acknowledgment URLs.
pub const DEFAULT_ACKNOWLEDGMENT_URL_CAPACITY: usize = 100;

/// Deployment environment of the host application.
///
/// Staging and production builds can be installed side by side on a test
/// device, so each gets its own durable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Pre-release builds.
    Staging,
    /// App store builds.
    Production,
}

/// Names and limits used by [`crate::Persistence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Slot in the secure item store holding the registration credentials.
    pub secure_item_slot: String,
    /// Tag in the key store holding the broadcast rotation public key.
    pub broadcast_key_tag: String,
    /// Maximum number of upload log entries kept.
    pub upload_log_capacity: usize,
    /// Maximum number of acknowledgment URLs kept.
    pub acknowledgment_url_capacity: usize,
}

impl StoreConfig {
    /// Returns the configuration for `environment`.
    #[must_use]
    pub fn from_environment(environment: Environment) -> Self {
        let namespace = match environment {
            Environment::Staging => "exposurekit.staging",
            Environment::Production => "exposurekit",
        };
        Self {
            secure_item_slot: format!("{namespace}.registration"),
            broadcast_key_tag: format!("{namespace}.broadcast-rotation-key"),
            upload_log_capacity: DEFAULT_UPLOAD_LOG_CAPACITY,
            acknowledgment_url_capacity: DEFAULT_ACKNOWLEDGMENT_URL_CAPACITY,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_environment(Environment::Production)
    }
}
