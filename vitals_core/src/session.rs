//! Reading session aggregation.
//!
//! Groups blood-pressure readings taken in one sitting into a [`Session`]
//! whose representative values are the rounded means of its readings.
//! Sessions are never patched in place: any edit rebuilds the session from
//! its full reading set so `reading_count` and the means cannot drift.

use crate::{Error, RawReading, Reading, Result, Session, TimeOfDay};
use chrono::NaiveDateTime;
use std::ops::RangeInclusive;
use uuid::Uuid;

/// Clinically plausible systolic range (mmHg)
pub const SYSTOLIC_RANGE: RangeInclusive<u16> = 60..=250;
/// Clinically plausible diastolic range (mmHg)
pub const DIASTOLIC_RANGE: RangeInclusive<u16> = 40..=150;
/// Clinically plausible pulse range (bpm)
pub const PULSE_RANGE: RangeInclusive<u16> = 30..=220;

/// Build a session from the readings entered together
///
/// Fails with [`Error::Validation`] when `readings` is empty or any reading
/// is outside the clinical bounds. Pure: the caller persists the result.
pub fn build_session(
    session_id: Uuid,
    datetime: NaiveDateTime,
    readings: &[RawReading],
    notes: Option<String>,
) -> Result<Session> {
    if readings.is_empty() {
        return Err(Error::validation(
            "readings",
            0,
            "a session needs at least one reading",
        ));
    }

    let readings = readings
        .iter()
        .map(|raw| validate_reading(session_id, datetime, raw))
        .collect::<Result<Vec<_>>>()?;

    let empty = || Error::Other("session has no readings".into());
    let systolic = rounded_mean(readings.iter().map(|r| r.systolic)).ok_or_else(empty)?;
    let diastolic = rounded_mean(readings.iter().map(|r| r.diastolic)).ok_or_else(empty)?;
    let pulse = rounded_mean(readings.iter().filter_map(|r| r.pulse));

    tracing::debug!(
        "Built session {} from {} readings: {}/{}",
        session_id,
        readings.len(),
        systolic,
        diastolic
    );

    Ok(Session {
        session_id,
        datetime,
        systolic,
        diastolic,
        pulse,
        notes,
        reading_count: readings.len(),
        readings,
    })
}

/// Rebuild `existing` from a new reading set
///
/// Keeps the session id, datetime and notes; everything else is recomputed.
pub fn replace_session(existing: &Session, new_readings: &[RawReading]) -> Result<Session> {
    build_session(
        existing.session_id,
        existing.datetime,
        new_readings,
        existing.notes.clone(),
    )
}

/// Check one raw reading against the clinical bounds and the session's sitting
pub fn validate_reading(
    session_id: Uuid,
    session_datetime: NaiveDateTime,
    raw: &RawReading,
) -> Result<Reading> {
    check_range("systolic", raw.systolic, &SYSTOLIC_RANGE)?;
    check_range("diastolic", raw.diastolic, &DIASTOLIC_RANGE)?;
    if let Some(pulse) = raw.pulse {
        check_range("pulse", pulse, &PULSE_RANGE)?;
    }

    if raw.systolic <= raw.diastolic {
        return Err(Error::validation(
            "diastolic",
            raw.diastolic,
            format!("must be lower than systolic ({})", raw.systolic),
        ));
    }

    let datetime = raw.datetime.unwrap_or(session_datetime);
    if datetime.date() != session_datetime.date()
        || TimeOfDay::of(datetime.time()) != TimeOfDay::of(session_datetime.time())
    {
        return Err(Error::validation(
            "datetime",
            datetime,
            format!("not in the same sitting as the session at {}", session_datetime),
        ));
    }

    Ok(Reading {
        id: Uuid::new_v4(),
        datetime,
        systolic: raw.systolic,
        diastolic: raw.diastolic,
        pulse: raw.pulse,
        arm: raw.arm,
        notes: raw.notes.clone(),
        session_id,
    })
}

fn check_range(field: &'static str, value: u16, range: &RangeInclusive<u16>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(
            field,
            value,
            format!("must be between {} and {}", range.start(), range.end()),
        ))
    }
}

fn rounded_mean(values: impl Iterator<Item = u16>) -> Option<u16> {
    let (sum, count) = values.fold((0u32, 0u32), |(sum, count), v| {
        (sum + u32::from(v), count + 1)
    });
    if count == 0 {
        return None;
    }
    // Bounded by the largest input, so it always fits back into u16
    Some((f64::from(sum) / f64::from(count)).round() as u16)
}
