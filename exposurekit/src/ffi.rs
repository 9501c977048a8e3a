//! `UniFFI` entry point for Swift and Kotlin hosts.
//!
//! Foreign callers cannot hold on to a Rust `Arc`, so the handle retains the
//! host's monitor and delegate itself and hands weak references to
//! [`Persistence`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{Environment, StoreConfig};
use crate::error::StoreResult;
use crate::persistence::{AppMonitoring, Persistence, PersistenceDelegate};
use crate::storage::{StorageProvider, StorageState};
use crate::types::{DeviceRegistration, SelfDiagnosis, UploadLogEntry};

/// Persistence facade as seen from the host app.
///
/// # Example (Swift)
///
/// ```swift
/// let persistence = try PersistenceHandle(
///     provider: PlatformStorage(),
///     environment: .production,
///     monitor: Analytics.shared
/// )
/// if let registration = persistence.registration() { ... }
/// ```
#[derive(uniffi::Object)]
pub struct PersistenceHandle {
    inner: Persistence,
    _monitor: Arc<dyn AppMonitoring>,
    delegate: Mutex<Option<Arc<dyn PersistenceDelegate>>>,
}

#[uniffi::export]
impl PersistenceHandle {
    /// Opens persistence over the host's storage media, reconciling them.
    ///
    /// # Errors
    ///
    /// Returns an error if reconciliation could not clear a durable store.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        environment: Environment,
        monitor: Arc<dyn AppMonitoring>,
    ) -> StoreResult<Arc<Self>> {
        let config = StoreConfig::from_environment(environment);
        let inner = Persistence::open(provider.as_ref(), config, &monitor)?;
        Ok(Arc::new(Self {
            inner,
            _monitor: monitor,
            delegate: Mutex::new(None),
        }))
    }

    /// The storage state observed at startup.
    #[must_use]
    pub fn startup_state(&self) -> StorageState {
        self.inner.startup_state()
    }

    /// Registers (or with `None`, removes) the registration delegate.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn PersistenceDelegate>>) {
        let mut slot = self
            .delegate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &delegate {
            Some(delegate) => self.inner.set_delegate(delegate),
            None => self.inner.remove_delegate(),
        }
        *slot = delegate;
    }

    /// Returns the stored registration.
    #[must_use]
    pub fn registration(&self) -> Option<DeviceRegistration> {
        self.inner.registration()
    }

    /// Stores or deletes the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or a store rejects the write.
    #[allow(clippy::needless_pass_by_value)]
    pub fn set_registration(&self, registration: Option<DeviceRegistration>) -> StoreResult<()> {
        self.inner.set_registration(registration.as_ref())
    }

    /// Potential exposure date, seconds since the Unix epoch.
    #[must_use]
    pub fn potentially_exposed(&self) -> Option<u64> {
        self.inner.potentially_exposed()
    }

    /// Sets or clears the potential exposure date.
    pub fn set_potentially_exposed(&self, date: Option<u64>) {
        self.inner.set_potentially_exposed(date);
    }

    /// Latest self-diagnosis.
    #[must_use]
    pub fn self_diagnosis(&self) -> Option<SelfDiagnosis> {
        self.inner.self_diagnosis()
    }

    /// Sets or clears the self-diagnosis.
    #[allow(clippy::needless_pass_by_value)]
    pub fn set_self_diagnosis(&self, diagnosis: Option<SelfDiagnosis>) {
        self.inner.set_self_diagnosis(diagnosis.as_ref());
    }

    /// Partial postcode.
    #[must_use]
    pub fn partial_postcode(&self) -> Option<String> {
        self.inner.partial_postcode()
    }

    /// Sets or clears the partial postcode.
    pub fn set_partial_postcode(&self, postcode: Option<String>) {
        self.inner.set_partial_postcode(postcode);
    }

    /// Whether Bluetooth permission was requested.
    #[must_use]
    pub fn bluetooth_permission_requested(&self) -> bool {
        self.inner.bluetooth_permission_requested()
    }

    /// Records whether Bluetooth permission was requested.
    pub fn set_bluetooth_permission_requested(&self, requested: bool) {
        self.inner.set_bluetooth_permission_requested(requested);
    }

    /// Upload log, oldest first.
    #[must_use]
    pub fn upload_log(&self) -> Vec<UploadLogEntry> {
        self.inner.upload_log()
    }

    /// Replaces the upload log.
    pub fn set_upload_log(&self, entries: Vec<UploadLogEntry>) {
        self.inner.set_upload_log(entries);
    }

    /// Appends to the upload log.
    pub fn append_upload_log(&self, entry: UploadLogEntry) {
        self.inner.append_upload_log(entry);
    }

    /// Linking identifier.
    #[must_use]
    pub fn linking_id(&self) -> Option<String> {
        self.inner.linking_id()
    }

    /// Sets or clears the linking identifier.
    pub fn set_linking_id(&self, linking_id: Option<String>) {
        self.inner.set_linking_id(linking_id);
    }

    /// Last installed app version.
    #[must_use]
    pub fn last_installed_version(&self) -> Option<String> {
        self.inner.last_installed_version()
    }

    /// Sets or clears the last installed app version.
    pub fn set_last_installed_version(&self, version: Option<String>) {
        self.inner.set_last_installed_version(version);
    }

    /// Last installed build number.
    #[must_use]
    pub fn last_installed_build_number(&self) -> Option<String> {
        self.inner.last_installed_build_number()
    }

    /// Sets or clears the last installed build number.
    pub fn set_last_installed_build_number(&self, build_number: Option<String>) {
        self.inner.set_last_installed_build_number(build_number);
    }

    /// Acknowledged notification URLs.
    #[must_use]
    pub fn acknowledgment_urls(&self) -> Vec<String> {
        self.inner.acknowledgment_urls()
    }

    /// Replaces the acknowledged notification URLs.
    pub fn set_acknowledgment_urls(&self, urls: Vec<String>) {
        self.inner.set_acknowledgment_urls(urls);
    }

    /// Deletes all persisted state.
    ///
    /// # Errors
    ///
    /// Returns the first durable store error.
    pub fn clear(&self) -> StoreResult<()> {
        self.inner.clear()
    }
}
