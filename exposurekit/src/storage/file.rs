//! File-backed ephemeral store.
//!
//! Keeps the whole key-value map in memory and rewrites a single CBOR file on
//! every change. The file should live inside the app container so that it is
//! removed together with the app.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::defaults::{decode, encode};
use super::traits::{DefaultsValue, EphemeralStore};
use crate::error::{StoreError, StoreResult};

/// Ephemeral store persisted to one file with atomic replace.
pub struct FileDefaults {
    path: PathBuf,
    values: Mutex<HashMap<String, DefaultsValue>>,
}

impl FileDefaults {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. A file that does not decode is
    /// discarded with a warning; the next write replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// exists but cannot be read.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| map_io_err(&path, &err))?;
        }
        let values = match fs::read(&path) {
            Ok(bytes) => decode(&bytes).unwrap_or_else(|err| {
                log::warn!("discarding unreadable defaults file {}: {err}", path.display());
                HashMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(map_io_err(&path, &err)),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, DefaultsValue>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, values: &HashMap<String, DefaultsValue>) {
        if let Err(err) = self.write_atomic(values) {
            log::error!("failed to persist defaults to {}: {err}", self.path.display());
        }
    }

    /// Write to a sibling temp file, sync, rename over the target, then sync
    /// the directory so the rename itself is durable.
    fn write_atomic(&self, values: &HashMap<String, DefaultsValue>) -> StoreResult<()> {
        let bytes = encode(values)?;
        let tmp_path = self.path.with_extension("tmp");
        let mut file = File::create(&tmp_path).map_err(|err| map_io_err(&tmp_path, &err))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|err| map_io_err(&tmp_path, &err))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            map_io_err(&self.path, &err)
        })?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
            return Ok(());
        };
        File::open(dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|err| map_io_err(dir, &err))
    }

    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    const fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl EphemeralStore for FileDefaults {
    fn get(&self, key: String) -> Option<DefaultsValue> {
        self.values().get(&key).cloned()
    }

    fn set(&self, key: String, value: DefaultsValue) {
        let mut values = self.values();
        values.insert(key, value);
        self.persist(&values);
    }

    fn remove(&self, key: String) {
        let mut values = self.values();
        if values.remove(&key).is_some() {
            self.persist(&values);
        }
    }
}

fn map_io_err(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {err}", path.display()))
}
