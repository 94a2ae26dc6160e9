//! Recorded history: blood-pressure sessions, sleep entries and lab results.
//!
//! Each collection is stored under its own key. Loading never fails on bad
//! data: a collection that cannot be read is logged and started over empty,
//! leaving the other collections intact.

use crate::catalog::{self, MetricCatalog};
use crate::session::{build_session, replace_session};
use crate::store::{KeyValueStore, BP_SESSIONS_KEY, LAB_RESULTS_KEY, SLEEP_ENTRIES_KEY};
use crate::{Error, LabResult, RawReading, Result, Session, SleepEntry};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Longest plausible night, in minutes
pub const MAX_SLEEP_MINUTES: u32 = 24 * 60;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Journal {
    pub sessions: Vec<Session>,
    pub sleep: Vec<SleepEntry>,
    pub labs: Vec<LabResult>,
}

impl Journal {
    /// Load every collection from `store`
    pub fn load(store: &impl KeyValueStore) -> Self {
        let mut sessions: Vec<Session> = load_collection(store, BP_SESSIONS_KEY);
        if let Some(bad) = sessions.iter().find(|s| s.reading_count != s.readings.len()) {
            let e = Error::CorruptState(format!(
                "session {} claims {} readings but has {}",
                bad.session_id,
                bad.reading_count,
                bad.readings.len()
            ));
            tracing::warn!("{}. Starting {} over.", e, BP_SESSIONS_KEY);
            sessions.clear();
        }

        let journal = Self {
            sessions,
            sleep: load_collection(store, SLEEP_ENTRIES_KEY),
            labs: load_collection(store, LAB_RESULTS_KEY),
        };

        tracing::debug!(
            "Loaded journal: {} sessions, {} sleep entries, {} lab results",
            journal.sessions.len(),
            journal.sleep.len(),
            journal.labs.len()
        );
        journal
    }

    /// Write every collection to `store`
    pub fn save(&self, store: &mut impl KeyValueStore) -> Result<()> {
        save_collection(store, BP_SESSIONS_KEY, &self.sessions)?;
        save_collection(store, SLEEP_ENTRIES_KEY, &self.sleep)?;
        save_collection(store, LAB_RESULTS_KEY, &self.labs)?;
        tracing::info!("Saved journal");
        Ok(())
    }

    /// Load, modify and save back
    ///
    /// Nothing is written when `f` fails.
    pub fn update<S, F>(store: &mut S, f: F) -> Result<Self>
    where
        S: KeyValueStore,
        F: FnOnce(&mut Journal) -> Result<()>,
    {
        let mut journal = Self::load(store);
        f(&mut journal)?;
        journal.save(store)?;
        Ok(journal)
    }

    /// Record a new session from readings taken together
    pub fn add_session(
        &mut self,
        datetime: NaiveDateTime,
        readings: &[RawReading],
        notes: Option<String>,
    ) -> Result<&Session> {
        let session = build_session(Uuid::new_v4(), datetime, readings, notes)?;
        tracing::info!(
            "Recorded session {} ({} readings)",
            session.session_id,
            session.reading_count
        );
        self.sessions.push(session);
        Ok(&self.sessions[self.sessions.len() - 1])
    }

    /// Rebuild a session from a new reading set
    pub fn replace_session(
        &mut self,
        session_id: Uuid,
        readings: &[RawReading],
    ) -> Result<&Session> {
        let index = self.session_index(session_id)?;
        let rebuilt = replace_session(&self.sessions[index], readings)?;
        tracing::info!("Replaced readings of session {}", session_id);
        self.sessions[index] = rebuilt;
        Ok(&self.sessions[index])
    }

    pub fn remove_session(&mut self, session_id: Uuid) -> Result<Session> {
        let index = self.session_index(session_id)?;
        tracing::info!("Removed session {}", session_id);
        Ok(self.sessions.remove(index))
    }

    pub fn add_sleep(&mut self, entry: SleepEntry) -> Result<&SleepEntry> {
        validate_sleep(&entry)?;
        tracing::info!("Recorded sleep for night of {}", entry.date);
        self.sleep.push(entry);
        Ok(&self.sleep[self.sleep.len() - 1])
    }

    /// Record a lab result for a catalogued metric
    pub fn add_lab(&mut self, metric_key: &str, date: NaiveDate, value: f64) -> Result<&LabResult> {
        let result = new_lab_result(catalog::default_catalog(), metric_key, date, value)?;
        tracing::info!("Recorded {} = {} on {}", metric_key, value, date);
        self.labs.push(result);
        Ok(&self.labs[self.labs.len() - 1])
    }

    /// Sessions oldest first
    pub fn sessions_sorted(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.iter().collect();
        sessions.sort_by_key(|s| s.datetime);
        sessions
    }

    /// Sleep entries oldest first
    pub fn sleep_sorted(&self) -> Vec<&SleepEntry> {
        let mut entries: Vec<&SleepEntry> = self.sleep.iter().collect();
        entries.sort_by_key(|e| e.date);
        entries
    }

    /// Results for one metric oldest first, same-day results in entry order
    pub fn labs_for(&self, metric_key: &str) -> Vec<&LabResult> {
        let mut results: Vec<&LabResult> = self
            .labs
            .iter()
            .filter(|r| r.metric_key == metric_key)
            .collect();
        results.sort_by_key(|r| r.date);
        results
    }

    fn session_index(&self, session_id: Uuid) -> Result<usize> {
        self.sessions
            .iter()
            .position(|s| s.session_id == session_id)
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))
    }
}

/// Check the duration and sleep-stage minutes of an entry
pub fn validate_sleep(entry: &SleepEntry) -> Result<()> {
    if entry.duration_minutes == 0 || entry.duration_minutes > MAX_SLEEP_MINUTES {
        return Err(Error::validation(
            "duration_minutes",
            entry.duration_minutes,
            format!("must be between 1 and {}", MAX_SLEEP_MINUTES),
        ));
    }

    let deep = entry.deep_minutes.unwrap_or(0);
    let staged = deep
        .checked_add(entry.rem_minutes.unwrap_or(0))
        .ok_or_else(|| Error::validation("deep_minutes", deep, "deep + REM minutes overflow"))?;
    if staged > entry.duration_minutes {
        return Err(Error::validation(
            "deep_minutes",
            staged,
            format!(
                "deep + REM minutes exceed the {} minutes slept",
                entry.duration_minutes
            ),
        ));
    }
    Ok(())
}

/// Build a lab result, checking the metric against `catalog`
pub fn new_lab_result(
    catalog: &MetricCatalog,
    metric_key: &str,
    date: NaiveDate,
    value: f64,
) -> Result<LabResult> {
    if !catalog.get(metric_key).map_or(false, |m| m.lab) {
        return Err(Error::validation(
            "metric_key",
            metric_key,
            "not a known lab metric",
        ));
    }
    if !value.is_finite() {
        return Err(Error::validation("value", value, "must be a finite number"));
    }

    Ok(LabResult {
        id: Uuid::new_v4(),
        metric_key: metric_key.to_string(),
        date,
        value,
    })
}

fn load_collection<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Vec<T> {
    let value = match store.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!("Unable to read {}: {}. Starting it over.", key, e);
            return Vec::new();
        }
    };

    match serde_json::from_value(value) {
        Ok(items) => items,
        Err(e) => {
            let e = Error::CorruptState(format!("{}: {}", key, e));
            tracing::warn!("{}. Starting it over.", e);
            Vec::new()
        }
    }
}

fn save_collection<T: Serialize>(
    store: &mut impl KeyValueStore,
    key: &str,
    items: &[T],
) -> Result<()> {
    store.set(key, &serde_json::to_value(items)?)
}
