//! `ExposureKit` persists the state of a contact-tracing client.
//!
//! The host app supplies three storage media through [`StorageProvider`]:
//!
//! - an ephemeral key-value store that disappears with the app,
//! - a secure item store for the device registration secrets,
//! - a key store for the broadcast rotation public key.
//!
//! The two durable media survive an uninstall on most platforms. When the
//! facade is opened it compares them against a sentinel in the ephemeral
//! store and wipes leftovers from a previous install before anything is read.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use exposurekit::storage::MemoryStorageProvider;
//! use exposurekit::{AppEvent, AppMonitoring, Persistence, StoreConfig};
//!
//! struct Quiet;
//!
//! impl AppMonitoring for Quiet {
//!     fn report(&self, _event: AppEvent) {}
//! }
//!
//! let monitor: Arc<dyn AppMonitoring> = Arc::new(Quiet);
//! let persistence = Persistence::open(
//!     &MemoryStorageProvider::new(),
//!     StoreConfig::default(),
//!     &monitor,
//! )?;
//! persistence.set_bluetooth_permission_requested(true);
//! # Ok::<(), exposurekit::StoreError>(())
//! ```

pub mod config;
pub use config::{Environment, StoreConfig};

mod error;
pub use error::*;

/// Bridges the `log` facade to the host's logger.
pub mod logger;

pub mod ffi;
pub use ffi::PersistenceHandle;

mod persistence;
pub use persistence::{AppMonitoring, Persistence, PersistenceDelegate};

pub mod storage;
pub use storage::{StorageProvider, StorageState};

mod types;
pub use types::*;

uniffi::setup_scaffolding!("exposurekit");
