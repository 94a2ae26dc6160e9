//! CSV export of recorded sessions and sleep entries.

use crate::{Result, Session, SleepEntry};
use std::path::Path;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A row in the sessions CSV
#[derive(Debug, serde::Serialize)]
struct SessionRow {
    session_id: String,
    datetime: String,
    systolic: u16,
    diastolic: u16,
    pulse: Option<u16>,
    category: &'static str,
    reading_count: usize,
    notes: Option<String>,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        SessionRow {
            session_id: session.session_id.to_string(),
            datetime: session.datetime.format(DATETIME_FORMAT).to_string(),
            systolic: session.systolic,
            diastolic: session.diastolic,
            pulse: session.pulse,
            category: session.category().label(),
            reading_count: session.reading_count,
            notes: session.notes.clone(),
        }
    }
}

/// A row in the sleep CSV
#[derive(Debug, serde::Serialize)]
struct SleepRow {
    date: String,
    duration_minutes: u32,
    deep_minutes: Option<u32>,
    rem_minutes: Option<u32>,
    bedtime: Option<String>,
    notes: Option<String>,
}

impl From<&SleepEntry> for SleepRow {
    fn from(entry: &SleepEntry) -> Self {
        SleepRow {
            date: entry.date.to_string(),
            duration_minutes: entry.duration_minutes,
            deep_minutes: entry.deep_minutes,
            rem_minutes: entry.rem_minutes,
            bedtime: entry.bedtime.map(|t| t.format("%H:%M").to_string()),
            notes: entry.notes.clone(),
        }
    }
}

/// Write sessions, oldest first, to a CSV file at `path`
///
/// Overwrites any existing file. Returns the number of rows written.
pub fn write_sessions_csv(sessions: &[Session], path: &Path) -> Result<usize> {
    let mut sorted: Vec<&Session> = sessions.iter().collect();
    sorted.sort_by_key(|s| s.datetime);
    let rows = sorted.into_iter().map(SessionRow::from);
    write_rows(path, rows)
}

/// Write sleep entries, oldest first, to a CSV file at `path`
pub fn write_sleep_csv(entries: &[SleepEntry], path: &Path) -> Result<usize> {
    let mut sorted: Vec<&SleepEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.date);
    let rows = sorted.into_iter().map(SleepRow::from);
    write_rows(path, rows)
}

fn write_rows<R: serde::Serialize>(path: &Path, rows: impl Iterator<Item = R>) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} rows to {:?}", count, path);
    Ok(count)
}
