//! Key-value persistence with file locking.
//!
//! Every persisted collection lives under a fixed key. [`JsonFileStore`]
//! keeps one JSON document per key in the data directory; [`MemoryStore`]
//! is an in-memory stand-in that also counts writes.

use crate::{Error, Result};
use fs2::FileExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Key of the ignored-metric set
pub const IGNORED_METRICS_KEY: &str = "ignored_metrics";
/// Key of the blood-pressure session list
pub const BP_SESSIONS_KEY: &str = "bp_sessions";
/// Key of the sleep entry list
pub const SLEEP_ENTRIES_KEY: &str = "sleep_entries";
/// Key of the lab result list
pub const LAB_RESULTS_KEY: &str = "lab_results";

/// Minimal storage contract: read or overwrite the document under a key
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&mut self, key: &str, value: &Value) -> Result<()>;
}

/// File-per-key JSON store
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::Other(format!("Invalid store key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    /// Read the document under `key` with a shared lock
    ///
    /// A missing or unparseable file reads as `None`; callers fall back to
    /// their defaults.
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            tracing::debug!("No stored value for {} at {:?}", key, path);
            return Ok(None);
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Failed to parse {:?}: {}. Treating as empty.", path, e);
                Ok(None)
            }
        }
    }

    /// Atomically replace the document under `key`
    ///
    /// Writes to a temp file in the same directory, syncs it, then renames
    /// it over the original.
    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let temp = NamedTempFile::new_in(&self.dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} to {:?}", key, path);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, Value>,
    writes: HashMap<String, usize>,
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls made for `key`
    pub fn writes(&self, key: &str) -> usize {
        self.lock().writes.get(key).copied().unwrap_or(0)
    }

    /// Seed a value without counting it as a write
    pub fn seed(&self, key: &str, value: Value) {
        self.lock().values.insert(key.to_string(), value);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock().values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let mut inner = self.lock();
        inner.values.insert(key.to_string(), value.clone());
        *inner.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
