//! Common test utilities shared across integration tests.

#![allow(dead_code, reason = "each integration test crate uses a subset")]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use exposurekit::{
    AppEvent, AppMonitoring, BroadcastKey, DeviceRegistration, Persistence, PersistenceDelegate,
    StorageProvider, StoreConfig,
};
use p256::SecretKey;
use rand::{rngs::OsRng, RngCore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Routes `log` records from the crate into a per-test `tracing` subscriber.
///
/// Set `RUST_LOG` to change verbosity. Keep the guard alive for the test.
pub fn init_logging() -> tracing::subscriber::DefaultGuard {
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("exposurekit=debug"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Monitor that records every reported event.
#[derive(Default)]
pub struct RecordingMonitor {
    events: Mutex<Vec<AppEvent>>,
}

impl RecordingMonitor {
    /// Events reported so far, in order.
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AppMonitoring for RecordingMonitor {
    fn report(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Delegate that records every registration update.
#[derive(Default)]
pub struct RecordingDelegate {
    updates: Mutex<Vec<DeviceRegistration>>,
}

impl RecordingDelegate {
    /// Registrations received so far, in order.
    pub fn updates(&self) -> Vec<DeviceRegistration> {
        self.updates.lock().unwrap().clone()
    }
}

impl PersistenceDelegate for RecordingDelegate {
    fn registration_updated(&self, registration: DeviceRegistration) {
        self.updates.lock().unwrap().push(registration);
    }
}

/// A facade opened over `provider`, with its recording collaborators.
pub struct Harness {
    /// The facade under test.
    pub persistence: Persistence,
    /// Receives the facade's monitoring events.
    pub monitor: Arc<RecordingMonitor>,
    /// Registered as the facade's delegate.
    pub delegate: Arc<RecordingDelegate>,
    // Persistence holds these weakly.
    _monitor: Arc<dyn AppMonitoring>,
    _delegate: Arc<dyn PersistenceDelegate>,
}

impl Harness {
    /// Opens the facade, panicking on failure.
    pub fn open(provider: &dyn StorageProvider) -> Self {
        Self::try_open(provider).expect("open persistence")
    }

    /// Opens the facade and registers the recording collaborators.
    pub fn try_open(provider: &dyn StorageProvider) -> exposurekit::StoreResult<Self> {
        let monitor = Arc::new(RecordingMonitor::default());
        let delegate = Arc::new(RecordingDelegate::default());
        let dyn_monitor: Arc<dyn AppMonitoring> = monitor.clone();
        let dyn_delegate: Arc<dyn PersistenceDelegate> = delegate.clone();

        let persistence = Persistence::open(provider, StoreConfig::default(), &dyn_monitor)?;
        persistence.set_delegate(&dyn_delegate);
        Ok(Self {
            persistence,
            monitor,
            delegate,
            _monitor: dyn_monitor,
            _delegate: dyn_delegate,
        })
    }
}

/// A fresh random P-256 broadcast key.
pub fn broadcast_key() -> BroadcastKey {
    BroadcastKey::from_public_key(&SecretKey::random(&mut OsRng).public_key())
}

/// A registration with a random id, secret and key.
pub fn registration() -> DeviceRegistration {
    let mut secret_key = vec![0u8; 32];
    OsRng.fill_bytes(&mut secret_key);
    DeviceRegistration {
        id: Uuid::new_v4().to_string(),
        secret_key,
        broadcast_rotation_key: broadcast_key(),
    }
}

/// A unique defaults file path inside `dir`.
pub fn temp_defaults_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path()
        .join(format!("exposurekit-{}", Uuid::new_v4()))
        .join("defaults.cbor")
}
