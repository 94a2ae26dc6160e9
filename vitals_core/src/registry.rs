//! Ignored-metric registry with debounced persistence.
//!
//! The in-memory set is the only thing reads ever consult. Every change
//! hands a snapshot of the set to a background writer, which waits for a
//! quiet period (the debounce window) before storing it. A newer snapshot
//! arriving inside the window replaces the pending one and restarts the
//! wait, so a burst of changes produces a single write of the final state.
//!
//! Dropping the registry flushes any pending snapshot before returning.

use crate::store::{KeyValueStore, IGNORED_METRICS_KEY};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Read-only view used by scoring to skip ignored metrics
pub trait MetricFilter {
    fn is_ignored(&self, key: &str) -> bool;
}

impl MetricFilter for BTreeSet<String> {
    fn is_ignored(&self, key: &str) -> bool {
        self.contains(key)
    }
}

impl MetricFilter for HashSet<String> {
    fn is_ignored(&self, key: &str) -> bool {
        self.contains(key)
    }
}

/// Filter that ignores nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFilter;

impl MetricFilter for NoFilter {
    fn is_ignored(&self, _key: &str) -> bool {
        false
    }
}

/// Persisted set of metric keys excluded from scoring
pub struct IgnoredMetrics {
    keys: BTreeSet<String>,
    writer: DebouncedWriter,
}

impl IgnoredMetrics {
    /// Load the persisted set from `store` and start its writer
    ///
    /// Stored data of the wrong shape is logged and replaced by an empty set.
    pub fn open<S>(store: S, window: Duration) -> Result<Self>
    where
        S: KeyValueStore + Send + 'static,
    {
        let keys = match store.get(IGNORED_METRICS_KEY) {
            Ok(Some(value)) => parse_ignored(value).unwrap_or_else(|e| {
                tracing::warn!("{}. Starting with no ignored metrics.", e);
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                tracing::warn!(
                    "Unable to read ignored metrics: {}. Starting with no ignored metrics.",
                    e
                );
                BTreeSet::new()
            }
        };

        tracing::debug!("Loaded {} ignored metrics", keys.len());
        let writer = DebouncedWriter::spawn(store, IGNORED_METRICS_KEY, window)?;
        Ok(Self { keys, writer })
    }

    /// Exclude `key` from scoring. Returns false if it was already ignored.
    pub fn ignore(&mut self, key: impl Into<String>) -> bool {
        let changed = self.keys.insert(key.into());
        if changed {
            self.writer.schedule(self.snapshot());
        }
        changed
    }

    /// Include `key` in scoring again. Returns false if it was not ignored.
    pub fn unignore(&mut self, key: &str) -> bool {
        let changed = self.keys.remove(key);
        if changed {
            self.writer.schedule(self.snapshot());
        }
        changed
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Write any pending change now instead of waiting out the window
    pub fn flush(&self) {
        self.writer.flush();
    }

    fn snapshot(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

impl MetricFilter for IgnoredMetrics {
    fn is_ignored(&self, key: &str) -> bool {
        IgnoredMetrics::is_ignored(self, key)
    }
}

impl std::fmt::Debug for IgnoredMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgnoredMetrics")
            .field("keys", &self.keys)
            .finish()
    }
}

/// Validate the persisted representation: a JSON array of strings
pub fn parse_ignored(value: Value) -> Result<BTreeSet<String>> {
    let Value::Array(items) = value else {
        return Err(Error::CorruptState(format!(
            "{} is not a list: {}",
            IGNORED_METRICS_KEY, value
        )));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(key) => Ok(key),
            other => Err(Error::CorruptState(format!(
                "{} contains a non-string entry: {}",
                IGNORED_METRICS_KEY, other
            ))),
        })
        .collect()
}

enum Command {
    Schedule(Vec<String>),
    Flush(Sender<()>),
}

/// Background writer holding at most one pending snapshot
struct DebouncedWriter {
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl DebouncedWriter {
    fn spawn<S>(store: S, key: &'static str, window: Duration) -> Result<Self>
    where
        S: KeyValueStore + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name(format!("{}-writer", key))
            .spawn(move || run_writer(store, key, window, rx))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    fn schedule(&self, snapshot: Vec<String>) {
        if let Some(tx) = &self.tx {
            if tx.send(Command::Schedule(snapshot)).is_err() {
                tracing::error!("Ignored-metrics writer has stopped; change not persisted");
            }
        }
    }

    fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for DebouncedWriter {
    fn drop(&mut self) {
        // Closing the channel makes the worker write what is pending and exit
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Ignored-metrics writer panicked during shutdown");
            }
        }
    }
}

fn run_writer<S: KeyValueStore>(
    mut store: S,
    key: &'static str,
    window: Duration,
    rx: Receiver<Command>,
) {
    let mut pending: Option<Vec<String>> = None;

    loop {
        let command = if pending.is_none() {
            match rx.recv() {
                Ok(command) => command,
                Err(_) => return,
            }
        } else {
            match rx.recv_timeout(window) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    write_snapshot(&mut store, key, pending.take());
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    write_snapshot(&mut store, key, pending.take());
                    return;
                }
            }
        };

        match command {
            Command::Schedule(snapshot) => {
                if pending.is_some() {
                    tracing::debug!("Rescheduling pending {} write", key);
                }
                pending = Some(snapshot);
            }
            Command::Flush(ack) => {
                write_snapshot(&mut store, key, pending.take());
                let _ = ack.send(());
            }
        }
    }
}

fn write_snapshot<S: KeyValueStore>(store: &mut S, key: &str, snapshot: Option<Vec<String>>) {
    let Some(snapshot) = snapshot else {
        return;
    };
    let count = snapshot.len();
    match store.set(key, &Value::from(snapshot)) {
        Ok(()) => tracing::info!("Persisted {} ignored metrics", count),
        Err(e) => tracing::error!("Failed to persist ignored metrics: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};
    use serde_json::json;
    use std::thread;

    const LONG_WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn test_burst_is_persisted_once_after_window() {
        crate::logging::init_test();
        let store = MemoryStore::new();
        store.seed(IGNORED_METRICS_KEY, json!(["ldl"]));

        let mut registry =
            IgnoredMetrics::open(store.clone(), Duration::from_millis(200)).unwrap();
        registry.ignore("hdl");
        registry.ignore("tsh");
        registry.ignore("hba1c");

        // Inside the window the store still holds the pre-burst state
        assert_eq!(store.get(IGNORED_METRICS_KEY).unwrap(), Some(json!(["ldl"])));
        assert_eq!(store.writes(IGNORED_METRICS_KEY), 0);

        thread::sleep(Duration::from_millis(800));

        assert_eq!(
            store.get(IGNORED_METRICS_KEY).unwrap(),
            Some(json!(["hba1c", "hdl", "ldl", "tsh"]))
        );
        assert_eq!(store.writes(IGNORED_METRICS_KEY), 1);
    }

    #[test]
    fn test_reads_are_immediate() {
        let mut registry = IgnoredMetrics::open(MemoryStore::new(), LONG_WINDOW).unwrap();
        assert!(!registry.is_ignored("sleep"));

        assert!(registry.ignore("sleep"));
        assert!(registry.is_ignored("sleep"));

        assert!(registry.unignore("sleep"));
        assert!(!registry.is_ignored("sleep"));
    }

    #[test]
    fn test_drop_flushes_pending_write() {
        let store = MemoryStore::new();
        let mut registry = IgnoredMetrics::open(store.clone(), LONG_WINDOW).unwrap();
        registry.ignore("blood_pressure");
        drop(registry);

        assert_eq!(
            store.get(IGNORED_METRICS_KEY).unwrap(),
            Some(json!(["blood_pressure"]))
        );
        assert_eq!(store.writes(IGNORED_METRICS_KEY), 1);
    }

    #[test]
    fn test_explicit_flush_writes_once() {
        let store = MemoryStore::new();
        let mut registry = IgnoredMetrics::open(store.clone(), LONG_WINDOW).unwrap();
        registry.ignore("ldl");
        registry.unignore("ldl");
        registry.ignore("hdl");

        registry.flush();
        assert_eq!(store.get(IGNORED_METRICS_KEY).unwrap(), Some(json!(["hdl"])));
        assert_eq!(store.writes(IGNORED_METRICS_KEY), 1);

        // Nothing pending: neither another flush nor drop writes again
        registry.flush();
        drop(registry);
        assert_eq!(store.writes(IGNORED_METRICS_KEY), 1);
    }

    #[test]
    fn test_no_op_changes_do_not_write() {
        let store = MemoryStore::new();
        store.seed(IGNORED_METRICS_KEY, json!(["ldl"]));
        let mut registry = IgnoredMetrics::open(store.clone(), LONG_WINDOW).unwrap();

        assert!(!registry.ignore("ldl"));
        assert!(!registry.unignore("missing"));
        drop(registry);

        assert_eq!(store.writes(IGNORED_METRICS_KEY), 0);
    }

    #[test]
    fn test_corrupt_state_resets_to_empty() {
        for corrupt in [json!({"ldl": true}), json!(["ldl", 7]), json!("ldl"), json!(null)] {
            let store = MemoryStore::new();
            store.seed(IGNORED_METRICS_KEY, corrupt);

            let registry = IgnoredMetrics::open(store, LONG_WINDOW).unwrap();
            assert!(registry.is_empty());
        }
    }

    #[test]
    fn test_parse_ignored_reports_corruption() {
        assert!(matches!(
            parse_ignored(json!([1, 2])),
            Err(Error::CorruptState(_))
        ));
        let keys = parse_ignored(json!(["b", "a", "b"])).unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_survives_restart_with_file_store() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let store = JsonFileStore::new(temp_dir.path());
            let mut registry = IgnoredMetrics::open(store, LONG_WINDOW).unwrap();
            registry.ignore("vitamin_d");
        }

        let registry =
            IgnoredMetrics::open(JsonFileStore::new(temp_dir.path()), LONG_WINDOW).unwrap();
        assert!(registry.is_ignored("vitamin_d"));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["vitamin_d"]);
    }

    #[test]
    fn test_metric_filter_impls() {
        let set: BTreeSet<String> = ["sleep".to_string()].into_iter().collect();
        assert!(set.is_ignored("sleep"));
        assert!(!NoFilter.is_ignored("sleep"));
    }
}
