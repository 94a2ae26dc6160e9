//! Core domain types for the vitals system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Blood-pressure readings and the sessions that group them
//! - Sleep entries
//! - Blood-test (lab) results
//! - Clinical categories and time-of-day buckets

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Blood Pressure
// ============================================================================

/// Arm used for a measurement
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    Left,
    Right,
}

/// Coarse time-of-day bucket. Readings of one session share a bucket.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 05:00 - 11:59
    Morning,
    /// 12:00 - 16:59
    Afternoon,
    /// 17:00 - 20:59
    Evening,
    /// 21:00 - 04:59
    Night,
}

impl TimeOfDay {
    pub fn of(time: NaiveTime) -> Self {
        match time.hour() {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

/// Unvalidated reading as entered by the user
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RawReading {
    pub systolic: u16,
    pub diastolic: u16,
    pub pulse: Option<u16>,
    pub arm: Option<Arm>,
    pub notes: Option<String>,
    /// Falls back to the session datetime when absent
    pub datetime: Option<NaiveDateTime>,
}

impl RawReading {
    pub fn new(systolic: u16, diastolic: u16, pulse: Option<u16>) -> Self {
        Self {
            systolic,
            diastolic,
            pulse,
            ..Self::default()
        }
    }
}

/// One validated blood-pressure measurement. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub id: Uuid,
    pub datetime: NaiveDateTime,
    pub systolic: u16,
    pub diastolic: u16,
    pub pulse: Option<u16>,
    pub arm: Option<Arm>,
    pub notes: Option<String>,
    pub session_id: Uuid,
}

/// One or more readings taken in a single sitting, reduced to a
/// representative measurement.
///
/// Sessions are only ever produced by [`crate::session::build_session`];
/// an edit rebuilds the whole session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: Uuid,
    pub datetime: NaiveDateTime,
    pub systolic: u16,
    pub diastolic: u16,
    pub pulse: Option<u16>,
    pub notes: Option<String>,
    pub readings: Vec<Reading>,
    pub reading_count: usize,
}

impl Session {
    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::of(self.datetime.time())
    }

    pub fn category(&self) -> BpCategory {
        BpCategory::classify(f64::from(self.systolic), f64::from(self.diastolic))
    }
}

/// Blood pressure category (AHA thresholds)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BpCategory {
    /// Systolic < 120 and diastolic < 80
    Normal,
    /// Systolic 120-129 and diastolic < 80
    Elevated,
    /// Systolic 130-139 or diastolic 80-89
    Hypertension1,
    /// Systolic >= 140 or diastolic >= 90
    Hypertension2,
    /// Systolic >= 180 or diastolic >= 120
    HypertensiveCrisis,
}

impl BpCategory {
    /// The category insights treat as optimal
    pub const OPTIMAL: BpCategory = BpCategory::Normal;

    pub fn classify(systolic: f64, diastolic: f64) -> Self {
        if systolic >= 180.0 || diastolic >= 120.0 {
            BpCategory::HypertensiveCrisis
        } else if systolic >= 140.0 || diastolic >= 90.0 {
            BpCategory::Hypertension2
        } else if systolic >= 130.0 || diastolic >= 80.0 {
            BpCategory::Hypertension1
        } else if systolic >= 120.0 {
            BpCategory::Elevated
        } else {
            BpCategory::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BpCategory::Normal => "Normal",
            BpCategory::Elevated => "Elevated",
            BpCategory::Hypertension1 => "Hypertension Stage 1",
            BpCategory::Hypertension2 => "Hypertension Stage 2",
            BpCategory::HypertensiveCrisis => "Hypertensive Crisis",
        }
    }
}

impl fmt::Display for BpCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Sleep and Lab Results
// ============================================================================

/// One night of sleep. `date` is the date the night started.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SleepEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub deep_minutes: Option<u32>,
    pub rem_minutes: Option<u32>,
    pub bedtime: Option<NaiveTime>,
    pub notes: Option<String>,
}

impl SleepEntry {
    /// Deep + REM share of total sleep, in percent
    pub fn restorative_percent(&self) -> Option<f64> {
        match (self.deep_minutes, self.rem_minutes) {
            (Some(deep), Some(rem)) if self.duration_minutes > 0 => {
                Some((f64::from(deep) + f64::from(rem)) / f64::from(self.duration_minutes) * 100.0)
            }
            _ => None,
        }
    }
}

/// One blood-test metric observation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LabResult {
    pub id: Uuid,
    pub metric_key: String,
    pub date: NaiveDate,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bp_category_normal() {
        assert_eq!(BpCategory::classify(110.0, 75.0), BpCategory::Normal);
    }

    #[test]
    fn test_bp_category_elevated() {
        assert_eq!(BpCategory::classify(125.0, 75.0), BpCategory::Elevated);
    }

    #[test]
    fn test_bp_category_hypertension1() {
        assert_eq!(BpCategory::classify(135.0, 75.0), BpCategory::Hypertension1);
        assert_eq!(BpCategory::classify(118.0, 85.0), BpCategory::Hypertension1);
    }

    #[test]
    fn test_bp_category_hypertension2() {
        assert_eq!(BpCategory::classify(145.0, 75.0), BpCategory::Hypertension2);
        assert_eq!(BpCategory::classify(120.0, 95.0), BpCategory::Hypertension2);
    }

    #[test]
    fn test_bp_category_crisis() {
        assert_eq!(BpCategory::classify(185.0, 75.0), BpCategory::HypertensiveCrisis);
        assert_eq!(BpCategory::classify(120.0, 125.0), BpCategory::HypertensiveCrisis);
    }

    #[test]
    fn test_time_of_day_buckets() {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(TimeOfDay::of(at(4, 59)), TimeOfDay::Night);
        assert_eq!(TimeOfDay::of(at(5, 0)), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::of(at(12, 0)), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::of(at(17, 30)), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::of(at(23, 10)), TimeOfDay::Night);
    }

    #[test]
    fn test_restorative_percent_requires_both_stages() {
        let mut entry = SleepEntry {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            duration_minutes: 400,
            deep_minutes: Some(60),
            rem_minutes: Some(100),
            bedtime: None,
            notes: None,
        };
        assert_eq!(entry.restorative_percent(), Some(40.0));

        entry.rem_minutes = None;
        assert_eq!(entry.restorative_percent(), None);
    }
}
