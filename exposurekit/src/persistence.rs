//! The persistence facade.
//!
//! [`Persistence`] is the only component that touches the storage media. It
//! reconciles them once when opened and then exposes typed accessors for each
//! persisted field.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::storage::defaults::{keep_most_recent, DecodeFailure, Defaults};
use crate::storage::{
    CredentialStore, DurableStore, PublicKeyStore, StorageChecker, StorageProvider, StorageState,
};
use crate::types::{
    AppEvent, DeviceRegistration, PartialRegistration, SelfDiagnosis, UploadLogEntry,
};

/// Ephemeral store keys, one per persisted field.
mod keys {
    pub const POTENTIALLY_EXPOSED: &str = "potentiallyExposed";
    pub const SELF_DIAGNOSIS: &str = "selfDiagnosis";
    pub const PARTIAL_POSTCODE: &str = "partialPostcode";
    pub const BLUETOOTH_PERMISSION_REQUESTED: &str = "bluetoothPermissionRequested";
    pub const UPLOAD_LOG: &str = "uploadLog";
    pub const LINKING_ID: &str = "linkingId";
    pub const LAST_INSTALLED_VERSION: &str = "lastInstalledVersion";
    pub const LAST_INSTALLED_BUILD_NUMBER: &str = "lastInstalledBuildNumber";
    pub const ACKNOWLEDGMENT_URLS: &str = "acknowledgmentUrls";

    pub const FIELDS: [&str; 9] = [
        POTENTIALLY_EXPOSED,
        SELF_DIAGNOSIS,
        PARTIAL_POSTCODE,
        BLUETOOTH_PERMISSION_REQUESTED,
        UPLOAD_LOG,
        LINKING_ID,
        LAST_INSTALLED_VERSION,
        LAST_INSTALLED_BUILD_NUMBER,
        ACKNOWLEDGMENT_URLS,
    ];
}

/// Notified after a registration has been stored.
#[uniffi::export(with_foreign)]
pub trait PersistenceDelegate: Send + Sync {
    /// Called once per successful registration write, after both the
    /// credentials and the broadcast key are stored.
    fn registration_updated(&self, registration: DeviceRegistration);
}

/// Fire-and-forget sink for analytics events.
#[uniffi::export(with_foreign)]
pub trait AppMonitoring: Send + Sync {
    /// Records `event`.
    fn report(&self, event: AppEvent);
}

/// Typed, reconciled access to everything the app persists.
///
/// Holds the delegate and the monitor weakly: whoever registers them keeps
/// them alive.
pub struct Persistence {
    config: StoreConfig,
    defaults: Defaults,
    credentials: Arc<CredentialStore>,
    broadcast_key: Arc<PublicKeyStore>,
    durable: Vec<Arc<dyn DurableStore>>,
    monitor: Weak<dyn AppMonitoring>,
    delegate: RwLock<Option<Weak<dyn PersistenceDelegate>>>,
    startup_state: StorageState,
}

impl Persistence {
    /// Opens the facade over `provider`'s media.
    ///
    /// Checks the stores for consistency exactly once. Durable data left over
    /// from a previous install is wiped, and the sync sentinel is set unless
    /// the stores were already in sync.
    ///
    /// # Errors
    ///
    /// Returns an error if a durable store rejects the reconciling clear. The
    /// sentinel is then left unset so the next launch reconciles again.
    pub fn open(
        provider: &dyn StorageProvider,
        config: StoreConfig,
        monitor: &Arc<dyn AppMonitoring>,
    ) -> StoreResult<Self> {
        let defaults = Defaults::new(provider.defaults());
        let credentials = Arc::new(CredentialStore::new(
            provider.secure_items(),
            config.secure_item_slot.clone(),
        ));
        let broadcast_key = Arc::new(PublicKeyStore::new(
            provider.key_store(),
            config.broadcast_key_tag.clone(),
        ));
        let durable = vec![
            Arc::clone(&credentials) as Arc<dyn DurableStore>,
            Arc::clone(&broadcast_key) as Arc<dyn DurableStore>,
        ];
        let checker = StorageChecker::new(defaults.clone(), durable.clone());

        let startup_state = checker.state();
        let persistence = Self {
            config,
            defaults,
            credentials,
            broadcast_key,
            durable,
            monitor: Arc::downgrade(monitor),
            delegate: RwLock::new(None),
            startup_state,
        };

        match startup_state {
            StorageState::InSync => {}
            StorageState::NotInitialized => {
                log::info!("no persisted state found, starting fresh");
                checker.mark_as_synced();
            }
            StorageState::OutOfSync => {
                log::warn!("durable stores outlived the app's defaults, clearing all state");
                persistence.clear()?;
                checker.mark_as_synced();
            }
        }
        Ok(persistence)
    }

    /// The storage state observed when the facade was opened.
    #[must_use]
    pub const fn startup_state(&self) -> StorageState {
        self.startup_state
    }

    /// Registers `delegate` without retaining it.
    pub fn set_delegate(&self, delegate: &Arc<dyn PersistenceDelegate>) {
        *self
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(delegate));
    }

    /// Unregisters the delegate.
    pub fn remove_delegate(&self) {
        *self
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn delegate(&self) -> Option<Arc<dyn PersistenceDelegate>> {
        self.delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn report(&self, event: AppEvent) {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.report(event);
        }
    }

    // -- registration ---------------------------------------------------------

    /// Returns the registration, if both of its halves are stored.
    #[must_use]
    pub fn registration(&self) -> Option<DeviceRegistration> {
        match (self.credentials.get(), self.broadcast_key.read()) {
            (Some(partial), Some(key)) => Some(DeviceRegistration::from_parts(&partial, key)),
            (Some(partial), None) => {
                log::error!(
                    "registration {} has no broadcast key, treating device as unregistered",
                    partial.id
                );
                None
            }
            (None, Some(key)) => {
                log::debug!("broadcast key {} stored without credentials", key.fingerprint());
                None
            }
            (None, None) => None,
        }
    }

    /// Stores `registration`, or deletes the credentials for `None`.
    ///
    /// `None` leaves the broadcast key in place. On success the delegate is
    /// notified first, then the monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if the broadcast key is invalid or a store rejects the
    /// write. Nobody is notified in that case.
    pub fn set_registration(&self, registration: Option<&DeviceRegistration>) -> StoreResult<()> {
        let Some(registration) = registration else {
            log::info!("deleting registration credentials");
            return self.credentials.clear();
        };

        registration.broadcast_rotation_key.public_key()?;
        self.credentials
            .set(&PartialRegistration::from(registration))?;
        self.broadcast_key
            .save(&registration.broadcast_rotation_key)?;

        if let Some(delegate) = self.delegate() {
            delegate.registration_updated(registration.clone());
        }
        self.report(AppEvent::RegistrationSucceeded);
        Ok(())
    }

    // -- ephemeral fields -----------------------------------------------------

    /// When the user was last flagged as potentially exposed.
    #[must_use]
    pub fn potentially_exposed(&self) -> Option<u64> {
        self.defaults.date(keys::POTENTIALLY_EXPOSED)
    }

    /// Sets or clears the potential exposure date.
    pub fn set_potentially_exposed(&self, date: Option<u64>) {
        self.defaults.set_date(keys::POTENTIALLY_EXPOSED, date);
    }

    /// The user's latest self-diagnosis.
    #[must_use]
    pub fn self_diagnosis(&self) -> Option<SelfDiagnosis> {
        self.defaults
            .decoded(keys::SELF_DIAGNOSIS, DecodeFailure::Unexpected)
    }

    /// Sets or clears the self-diagnosis.
    pub fn set_self_diagnosis(&self, diagnosis: Option<&SelfDiagnosis>) {
        self.defaults.set_encoded(keys::SELF_DIAGNOSIS, diagnosis);
    }

    /// The first part of the user's postcode.
    #[must_use]
    pub fn partial_postcode(&self) -> Option<String> {
        self.defaults.string(keys::PARTIAL_POSTCODE)
    }

    /// Sets or clears the partial postcode.
    pub fn set_partial_postcode(&self, postcode: Option<String>) {
        let provided = postcode.is_some();
        self.defaults.set_string(keys::PARTIAL_POSTCODE, postcode);
        if provided {
            self.report(AppEvent::PartialPostcodeProvided);
        }
    }

    /// Whether the app has asked for Bluetooth permission.
    #[must_use]
    pub fn bluetooth_permission_requested(&self) -> bool {
        self.defaults.flag(keys::BLUETOOTH_PERMISSION_REQUESTED)
    }

    /// Records whether the app has asked for Bluetooth permission.
    pub fn set_bluetooth_permission_requested(&self, requested: bool) {
        self.defaults
            .set_flag(keys::BLUETOOTH_PERMISSION_REQUESTED, requested);
    }

    /// Recent upload events, oldest first.
    #[must_use]
    pub fn upload_log(&self) -> Vec<UploadLogEntry> {
        self.defaults
            .decoded(keys::UPLOAD_LOG, DecodeFailure::Tolerated)
            .unwrap_or_default()
    }

    /// Replaces the upload log, keeping only the most recent entries.
    pub fn set_upload_log(&self, entries: Vec<UploadLogEntry>) {
        let entries = keep_most_recent(entries, self.config.upload_log_capacity);
        self.defaults.set_encoded(keys::UPLOAD_LOG, Some(&entries));
    }

    /// Appends one entry to the upload log.
    pub fn append_upload_log(&self, entry: UploadLogEntry) {
        let mut entries = self.upload_log();
        entries.push(entry);
        self.set_upload_log(entries);
    }

    /// Identifier linking this device to a test result.
    #[must_use]
    pub fn linking_id(&self) -> Option<String> {
        self.defaults.string(keys::LINKING_ID)
    }

    /// Sets or clears the linking identifier.
    pub fn set_linking_id(&self, linking_id: Option<String>) {
        self.defaults.set_string(keys::LINKING_ID, linking_id);
    }

    /// App version that last ran on this device.
    #[must_use]
    pub fn last_installed_version(&self) -> Option<String> {
        self.defaults.string(keys::LAST_INSTALLED_VERSION)
    }

    /// Sets or clears the last installed version.
    pub fn set_last_installed_version(&self, version: Option<String>) {
        self.defaults.set_string(keys::LAST_INSTALLED_VERSION, version);
    }

    /// App build number that last ran on this device.
    #[must_use]
    pub fn last_installed_build_number(&self) -> Option<String> {
        self.defaults.string(keys::LAST_INSTALLED_BUILD_NUMBER)
    }

    /// Sets or clears the last installed build number.
    pub fn set_last_installed_build_number(&self, build_number: Option<String>) {
        self.defaults
            .set_string(keys::LAST_INSTALLED_BUILD_NUMBER, build_number);
    }

    /// Notification URLs the app already acknowledged.
    #[must_use]
    pub fn acknowledgment_urls(&self) -> Vec<String> {
        self.defaults
            .decoded(keys::ACKNOWLEDGMENT_URLS, DecodeFailure::Tolerated)
            .unwrap_or_default()
    }

    /// Replaces the acknowledged URLs.
    ///
    /// Duplicates keep their first position; beyond the capacity only the
    /// last URLs in `urls` are kept.
    pub fn set_acknowledgment_urls(&self, mut urls: Vec<String>) {
        let mut seen = HashSet::new();
        urls.retain(|url| seen.insert(url.clone()));
        let urls = keep_most_recent(urls, self.config.acknowledgment_url_capacity);
        self.defaults
            .set_encoded(keys::ACKNOWLEDGMENT_URLS, Some(&urls));
    }

    // -- reset ----------------------------------------------------------------

    /// Deletes every persisted field, then the credentials, then the key.
    ///
    /// Not atomic: if a durable store fails, the ephemeral fields are already
    /// gone and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first durable store error.
    pub fn clear(&self) -> StoreResult<()> {
        for key in keys::FIELDS {
            self.defaults.remove(key);
        }
        for store in &self.durable {
            store.clear()?;
        }
        log::info!("cleared persisted state");
        Ok(())
    }
}
