//! Storage media and the stores built on them.

mod broadcast_key;
mod checker;
mod credentials;
pub(crate) mod defaults;
mod envelope;
pub mod file;
pub mod memory;
pub mod traits;

pub use broadcast_key::PublicKeyStore;
pub(crate) use checker::StorageChecker;
pub use checker::StorageState;
pub use credentials::CredentialStore;
pub use file::FileDefaults;
pub use memory::{MemoryDefaults, MemoryKeyStore, MemorySecureItemStore, MemoryStorageProvider};
pub use traits::{DefaultsValue, DurableStore, EphemeralStore, KeyStore, SecureItemStore, StorageProvider};
