//! End-to-end behaviour of the persistence facade over in-memory and
//! file-backed media.

mod common;

use std::sync::Arc;

use common::Harness;
use exposurekit::storage::{FileDefaults, KeyStore, MemoryStorageProvider, StorageProvider};
use exposurekit::storage::{EphemeralStore, MemoryKeyStore, MemorySecureItemStore};
use exposurekit::{
    AppEvent, SelfDiagnosis, SelfDiagnosisKind, StorageState, StoreConfig, StoreError, Symptom,
    UploadLogEntry, UploadLogEvent,
};

const SENTINEL: &str = "durableStoresSynced";

fn diagnosis() -> SelfDiagnosis {
    SelfDiagnosis {
        kind: SelfDiagnosisKind::Initial,
        symptoms: vec![Symptom::Cough, Symptom::Temperature],
        start_date: 1_590_000_000,
        expiry_date: 1_590_604_800,
    }
}

fn populate(harness: &Harness) {
    let persistence = &harness.persistence;
    persistence
        .set_registration(Some(&common::registration()))
        .expect("set registration");
    persistence.set_potentially_exposed(Some(1_590_100_000));
    persistence.set_self_diagnosis(Some(&diagnosis()));
    persistence.set_partial_postcode(Some("SW1A".to_string()));
    persistence.set_bluetooth_permission_requested(true);
    persistence.append_upload_log(UploadLogEntry {
        date: 1_590_200_000,
        event: UploadLogEvent::Completed { error: None },
    });
    persistence.set_linking_id(Some("linking-id".to_string()));
    persistence.set_last_installed_version(Some("1.4.0".to_string()));
    persistence.set_last_installed_build_number(Some("312".to_string()));
    persistence.set_acknowledgment_urls(vec!["https://example.com/ack/1".to_string()]);
}

fn assert_empty(harness: &Harness) {
    let persistence = &harness.persistence;
    assert_eq!(persistence.registration(), None);
    assert_eq!(persistence.potentially_exposed(), None);
    assert_eq!(persistence.self_diagnosis(), None);
    assert_eq!(persistence.partial_postcode(), None);
    assert!(!persistence.bluetooth_permission_requested());
    assert!(persistence.upload_log().is_empty());
    assert_eq!(persistence.linking_id(), None);
    assert_eq!(persistence.last_installed_version(), None);
    assert_eq!(persistence.last_installed_build_number(), None);
    assert!(persistence.acknowledgment_urls().is_empty());
}

#[test]
fn test_fresh_install_marks_stores_synced() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();

    let harness = Harness::open(&provider);
    assert_eq!(
        harness.persistence.startup_state(),
        StorageState::NotInitialized
    );
    assert_eq!(provider.defaults.keys(), vec![SENTINEL.to_string()]);
    assert!(harness.monitor.events().is_empty());
    assert_empty(&harness);

    drop(harness);
    let reopened = Harness::open(&provider);
    assert_eq!(reopened.persistence.startup_state(), StorageState::InSync);
}

#[test]
fn test_registration_round_trip_notifies_delegate_then_monitor() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    let registration = common::registration();

    harness
        .persistence
        .set_registration(Some(&registration))
        .expect("set registration");

    assert_eq!(harness.persistence.registration(), Some(registration.clone()));
    assert_eq!(harness.delegate.updates(), vec![registration]);
    assert_eq!(
        harness.monitor.events(),
        vec![AppEvent::RegistrationSucceeded]
    );
}

#[test]
fn test_compressed_key_is_stored_uncompressed() {
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    let mut registration = common::registration();
    let key = registration
        .broadcast_rotation_key
        .public_key()
        .expect("valid key");
    registration.broadcast_rotation_key.sec1_bytes = key.to_encoded_point(true).as_bytes().to_vec();

    harness
        .persistence
        .set_registration(Some(&registration))
        .expect("set registration");

    let stored = provider
        .keys
        .read_key(StoreConfig::default().broadcast_key_tag)
        .expect("read")
        .expect("key present");
    assert_eq!(stored.len(), 65);
    assert_eq!(harness.persistence.registration(), Some(registration));
}

#[test]
fn test_removing_registration_keeps_broadcast_key() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    harness
        .persistence
        .set_registration(Some(&common::registration()))
        .expect("set registration");

    harness
        .persistence
        .set_registration(None)
        .expect("remove registration");

    assert_eq!(harness.persistence.registration(), None);
    assert!(provider.secure_items.is_empty());
    assert!(!provider.keys.is_empty());
    assert_eq!(harness.delegate.updates().len(), 1);
}

#[test]
fn test_credentials_without_key_read_as_unregistered() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    harness
        .persistence
        .set_registration(Some(&common::registration()))
        .expect("set registration");

    provider
        .keys
        .delete_key(StoreConfig::default().broadcast_key_tag)
        .expect("delete key");

    assert_eq!(harness.persistence.registration(), None);
    assert!(!provider.secure_items.is_empty());
}

#[test]
fn test_failed_key_write_does_not_notify() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    provider.keys.set_fail_writes(true);

    let result = harness
        .persistence
        .set_registration(Some(&common::registration()));

    assert!(matches!(result, Err(StoreError::KeyStore(_))));
    assert!(harness.delegate.updates().is_empty());
    assert!(harness.monitor.events().is_empty());
    assert_eq!(harness.persistence.registration(), None);
}

#[test]
fn test_failed_credential_write_does_not_touch_key() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    provider.secure_items.set_fail_writes(true);

    let result = harness
        .persistence
        .set_registration(Some(&common::registration()));

    assert!(matches!(result, Err(StoreError::SecureStore(_))));
    assert!(provider.keys.is_empty());
    assert!(harness.delegate.updates().is_empty());
}

#[test]
fn test_unreadable_secure_store_reads_as_unregistered() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    harness
        .persistence
        .set_registration(Some(&common::registration()))
        .expect("set registration");

    provider.secure_items.set_fail_reads(true);
    assert_eq!(harness.persistence.registration(), None);
}

#[test]
fn test_upload_log_keeps_most_recent_entries() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    let entries: Vec<UploadLogEntry> = (0..150)
        .map(|i| UploadLogEntry {
            date: 1_590_000_000 + i,
            event: UploadLogEvent::Started {
                last_contact_event_date: 1_589_000_000 + i,
            },
        })
        .collect();

    harness.persistence.set_upload_log(entries.clone());

    let stored = harness.persistence.upload_log();
    assert_eq!(stored.len(), 100);
    assert_eq!(stored, entries[50..]);

    harness.persistence.append_upload_log(UploadLogEntry {
        date: 1_600_000_000,
        event: UploadLogEvent::Completed {
            error: Some("timeout".to_string()),
        },
    });
    let stored = harness.persistence.upload_log();
    assert_eq!(stored.len(), 100);
    assert_eq!(stored[0], entries[51]);
    assert_eq!(stored[99].date, 1_600_000_000);
}

#[test]
fn test_ephemeral_fields_round_trip() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    let persistence = &harness.persistence;

    persistence.set_self_diagnosis(Some(&diagnosis()));
    assert_eq!(persistence.self_diagnosis(), Some(diagnosis()));
    persistence.set_self_diagnosis(None);
    assert_eq!(persistence.self_diagnosis(), None);

    persistence.set_potentially_exposed(Some(1_590_100_000));
    assert_eq!(persistence.potentially_exposed(), Some(1_590_100_000));

    persistence.set_linking_id(Some("abc".to_string()));
    persistence.set_linking_id(None);
    assert_eq!(persistence.linking_id(), None);

    persistence.set_bluetooth_permission_requested(true);
    assert!(persistence.bluetooth_permission_requested());
}

#[test]
fn test_partial_postcode_reports_only_when_provided() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);

    harness
        .persistence
        .set_partial_postcode(Some("SW1A".to_string()));
    harness.persistence.set_partial_postcode(None);

    assert_eq!(harness.persistence.partial_postcode(), None);
    assert_eq!(
        harness.monitor.events(),
        vec![AppEvent::PartialPostcodeProvided]
    );
}

#[test]
fn test_corrupt_self_diagnosis_reads_as_absent() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    provider.defaults.set(
        "selfDiagnosis".to_string(),
        exposurekit::storage::DefaultsValue::Data {
            bytes: vec![0xff, 0x00, 0x13],
        },
    );

    assert_eq!(harness.persistence.self_diagnosis(), None);
}

#[test]
fn test_clear_removes_everything_but_sentinel() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    populate(&harness);

    harness.persistence.clear().expect("clear");

    assert_empty(&harness);
    assert!(provider.secure_items.is_empty());
    assert!(provider.keys.is_empty());
    assert_eq!(provider.defaults.keys(), vec![SENTINEL.to_string()]);
}

#[test]
fn test_failed_clear_keeps_key_after_removing_fields() {
    let provider = MemoryStorageProvider::new();
    let harness = Harness::open(&provider);
    populate(&harness);
    provider.secure_items.set_fail_writes(true);

    let result = harness.persistence.clear();

    assert!(matches!(result, Err(StoreError::SecureStore(_))));
    assert_eq!(harness.persistence.partial_postcode(), None);
    assert!(harness.persistence.upload_log().is_empty());
    assert!(!provider.secure_items.is_empty());
    assert!(!provider.keys.is_empty());
    assert_eq!(provider.defaults.keys(), vec![SENTINEL.to_string()]);
}

#[test]
fn test_reinstall_wipes_durable_stores() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();
    let first = Harness::open(&provider);
    populate(&first);
    drop(first);

    let reinstalled = provider.reinstalled();
    let harness = Harness::open(&reinstalled);

    assert_eq!(harness.persistence.startup_state(), StorageState::OutOfSync);
    assert_empty(&harness);
    assert!(provider.secure_items.is_empty());
    assert!(provider.keys.is_empty());
    assert_eq!(reinstalled.defaults.keys(), vec![SENTINEL.to_string()]);
    assert!(harness.delegate.updates().is_empty());
    assert!(harness.monitor.events().is_empty());
}

#[test]
fn test_reinstall_with_only_a_key_left_behind() {
    let provider = MemoryStorageProvider::new();
    provider
        .keys
        .save_key(
            StoreConfig::default().broadcast_key_tag,
            common::broadcast_key().sec1_bytes,
        )
        .expect("save key");

    let harness = Harness::open(&provider);
    assert_eq!(harness.persistence.startup_state(), StorageState::OutOfSync);
    assert!(provider.keys.is_empty());
}

#[test]
fn test_failed_reconciliation_leaves_sentinel_unset() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();
    populate(&Harness::open(&provider));

    let reinstalled = provider.reinstalled();
    reinstalled.secure_items.set_fail_writes(true);
    let result = Harness::try_open(&reinstalled);

    assert!(matches!(result, Err(StoreError::SecureStore(_))));
    assert!(!reinstalled.defaults.keys().contains(&SENTINEL.to_string()));
    assert!(!reinstalled.secure_items.is_empty());

    reinstalled.secure_items.set_fail_writes(false);
    let harness = Harness::open(&reinstalled);
    assert_eq!(harness.persistence.startup_state(), StorageState::OutOfSync);
    assert!(reinstalled.secure_items.is_empty());
    assert!(reinstalled.keys.is_empty());
}

#[test]
fn test_reinstall_while_keychain_unreadable_still_wipes() {
    let _logging = common::init_logging();
    let provider = MemoryStorageProvider::new();
    populate(&Harness::open(&provider));

    let reinstalled = provider.reinstalled();
    reinstalled.secure_items.set_fail_reads(true);
    reinstalled.keys.set_fail_reads(true);
    let first_launch = Harness::open(&reinstalled);
    assert_eq!(
        first_launch.persistence.startup_state(),
        StorageState::OutOfSync
    );
    drop(first_launch);

    reinstalled.secure_items.set_fail_reads(false);
    reinstalled.keys.set_fail_reads(false);
    let second_launch = Harness::open(&reinstalled);
    assert_eq!(
        second_launch.persistence.startup_state(),
        StorageState::InSync
    );
    assert_eq!(second_launch.persistence.registration(), None);
    assert!(reinstalled.secure_items.is_empty());
    assert!(reinstalled.keys.is_empty());
}

#[test]
fn test_reinstall_while_keychain_locked_retries_next_launch() {
    let provider = MemoryStorageProvider::new();
    populate(&Harness::open(&provider));

    let reinstalled = provider.reinstalled();
    reinstalled.secure_items.set_fail_reads(true);
    reinstalled.secure_items.set_fail_writes(true);
    assert!(matches!(
        Harness::try_open(&reinstalled),
        Err(StoreError::SecureStore(_))
    ));
    assert!(!reinstalled.defaults.keys().contains(&SENTINEL.to_string()));

    reinstalled.secure_items.set_fail_reads(false);
    reinstalled.secure_items.set_fail_writes(false);
    let harness = Harness::open(&reinstalled);
    assert_eq!(harness.persistence.startup_state(), StorageState::OutOfSync);
    assert_eq!(harness.persistence.registration(), None);
    assert!(reinstalled.secure_items.is_empty());
}

#[test]
fn test_environments_use_separate_slots() {
    let provider = MemoryStorageProvider::new();
    let monitor: Arc<dyn exposurekit::AppMonitoring> =
        Arc::new(common::RecordingMonitor::default());
    let staging = exposurekit::Persistence::open(
        &provider,
        StoreConfig::from_environment(exposurekit::Environment::Staging),
        &monitor,
    )
    .expect("open staging");
    staging
        .set_registration(Some(&common::registration()))
        .expect("set registration");

    let production = exposurekit::Persistence::open(&provider, StoreConfig::default(), &monitor)
        .expect("open production");
    assert_eq!(production.registration(), None);
    assert!(staging.registration().is_some());
}

/// Ephemeral file store plus durable in-memory stores.
struct FileBackedProvider {
    defaults: Arc<FileDefaults>,
    secure_items: Arc<MemorySecureItemStore>,
    keys: Arc<MemoryKeyStore>,
}

impl StorageProvider for FileBackedProvider {
    fn defaults(&self) -> Arc<dyn EphemeralStore> {
        self.defaults.clone()
    }

    fn secure_items(&self) -> Arc<dyn exposurekit::storage::SecureItemStore> {
        self.secure_items.clone()
    }

    fn key_store(&self) -> Arc<dyn KeyStore> {
        self.keys.clone()
    }
}

#[test]
fn test_file_backed_defaults_survive_restart_and_detect_reinstall() {
    let _logging = common::init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = common::temp_defaults_path(&dir);
    let secure_items = Arc::new(MemorySecureItemStore::new());
    let keys = Arc::new(MemoryKeyStore::new());
    let open_provider = || FileBackedProvider {
        defaults: Arc::new(FileDefaults::open(&path).expect("open defaults")),
        secure_items: Arc::clone(&secure_items),
        keys: Arc::clone(&keys),
    };

    let registration = common::registration();
    {
        let harness = Harness::open(&open_provider());
        harness
            .persistence
            .set_registration(Some(&registration))
            .expect("set registration");
        harness
            .persistence
            .set_last_installed_version(Some("1.4.0".to_string()));
    }

    let restarted = Harness::open(&open_provider());
    assert_eq!(restarted.persistence.startup_state(), StorageState::InSync);
    assert_eq!(restarted.persistence.registration(), Some(registration));
    assert_eq!(
        restarted.persistence.last_installed_version().as_deref(),
        Some("1.4.0")
    );
    drop(restarted);

    std::fs::remove_file(&path).expect("uninstall");
    let reinstalled = Harness::open(&open_provider());
    assert_eq!(
        reinstalled.persistence.startup_state(),
        StorageState::OutOfSync
    );
    assert_empty(&reinstalled);
}

#[test]
fn test_memory_defaults_reinstall_is_independent() {
    let provider = MemoryStorageProvider::new();
    let reinstalled = provider.reinstalled();
    provider
        .defaults
        .set("k".to_string(), exposurekit::storage::DefaultsValue::Flag { value: true });

    assert!(reinstalled.defaults.is_empty());
    assert!(Arc::ptr_eq(&provider.keys, &reinstalled.keys));
}
