//! Per-domain subscores and the overall health score.
//!
//! ## Blood pressure
//! - Base from the category of the mean session values
//!   (Normal 100, Elevated 85, Stage 1 70, Stage 2 50, Crisis 25)
//! - Variability penalty: `min(25, max(0, sd(systolic) - 5) * 2)`
//! - Trend modifier: newer half vs older half of the sessions, up to ±10
//!
//! ## Sleep
//! - Duration score: 100, minus half a point per minute outside 7-9 hours
//! - Restorative share (deep + REM) scaled against a 45% target
//! - Consistency bonus from the spread of bedtimes (+5 / 0 / -5)
//!
//! A domain with too little history in the window has no subscore.

use crate::catalog::{self, BLOOD_PRESSURE_DOMAIN, SLEEP_DOMAIN};
use crate::change::{classify, ChangeType};
use crate::config::ScoringConfig;
use crate::registry::MetricFilter;
use crate::{BpCategory, Session, SleepEntry};
use chrono::{Duration, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const OPTIMAL_SLEEP_MINUTES: (f64, f64) = (420.0, 540.0);
const RESTORATIVE_TARGET_PERCENT: f64 = 45.0;
const UNKNOWN_RESTORATIVE_SCORE: f64 = 70.0;
const MAX_TREND_MODIFIER: f64 = 10.0;
const MAX_VARIABILITY_PENALTY: f64 = 25.0;

/// Blood-pressure subscore
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BpScore {
    pub value: f64,
    pub category: BpCategory,
    pub avg_systolic: f64,
    pub avg_diastolic: f64,
    pub base: f64,
    pub variability_penalty: f64,
    /// Positive when blood pressure is improving
    pub trend_modifier: f64,
    pub session_count: usize,
}

impl BpScore {
    /// Named contributions to `value`
    pub fn components(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("base", self.base),
            ("variability_penalty", 0.0 - self.variability_penalty),
            ("trend_modifier", self.trend_modifier),
        ])
    }
}

/// Sleep subscore
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SleepScore {
    pub value: f64,
    pub avg_duration_minutes: f64,
    pub duration_score: f64,
    /// Mean deep + REM percentage, when any entry records stages
    pub avg_restorative: Option<f64>,
    pub restorative_score: f64,
    pub consistency_bonus: f64,
    pub entry_count: usize,
}

impl SleepScore {
    pub fn components(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("duration_score", self.duration_score),
            ("restorative_score", self.restorative_score),
            ("consistency_bonus", self.consistency_bonus),
        ])
    }
}

/// Both subscores; either may be absent for lack of data
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthScore {
    pub bp_score: Option<BpScore>,
    pub sleep_score: Option<SleepScore>,
}

impl HealthScore {
    /// Mean of the available subscores
    pub fn overall(&self) -> Option<f64> {
        let values: Vec<f64> = self
            .bp_score
            .iter()
            .map(|s| s.value)
            .chain(self.sleep_score.iter().map(|s| s.value))
            .collect();
        mean(&values).map(f64::round)
    }
}

/// History that counts toward the score: inside the window ending on
/// `today`, with ignored domains left empty
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoredHistory {
    pub sessions: Vec<Session>,
    pub sleep: Vec<SleepEntry>,
}

/// Select the sessions and sleep entries a score on `today` is built from
pub fn scored_history(
    sessions: &[Session],
    sleep: &[SleepEntry],
    today: NaiveDate,
    config: &ScoringConfig,
    filter: &impl MetricFilter,
) -> ScoredHistory {
    let start = Duration::try_days(config.window_days)
        .and_then(|window| today.checked_sub_signed(window))
        .unwrap_or(NaiveDate::MIN);
    let in_window = |date: NaiveDate| date > start && date <= today;

    let sessions = if filter.is_ignored(BLOOD_PRESSURE_DOMAIN) {
        tracing::debug!("Blood pressure is ignored; skipping sessions");
        Vec::new()
    } else {
        sessions
            .iter()
            .filter(|s| in_window(s.date()))
            .cloned()
            .collect()
    };

    let sleep = if filter.is_ignored(SLEEP_DOMAIN) {
        tracing::debug!("Sleep is ignored; skipping entries");
        Vec::new()
    } else {
        sleep.iter().filter(|e| in_window(e.date)).cloned().collect()
    };

    ScoredHistory { sessions, sleep }
}

/// Score the history that falls in the window ending on `today`
///
/// Domains the filter ignores are left out entirely.
pub fn compute_health_score(
    sessions: &[Session],
    sleep: &[SleepEntry],
    today: NaiveDate,
    config: &ScoringConfig,
    filter: &impl MetricFilter,
) -> HealthScore {
    let history = scored_history(sessions, sleep, today, config, filter);
    score_history(&history, config, filter)
}

/// Subscores over history already selected by [`scored_history`]
pub fn score_history(
    history: &ScoredHistory,
    config: &ScoringConfig,
    filter: &impl MetricFilter,
) -> HealthScore {
    let bp_score = if filter.is_ignored(BLOOD_PRESSURE_DOMAIN) {
        None
    } else {
        bp_score(&history.sessions, config)
    };
    let sleep_score = if filter.is_ignored(SLEEP_DOMAIN) {
        None
    } else {
        sleep_score(&history.sleep, config)
    };

    HealthScore {
        bp_score,
        sleep_score,
    }
}

/// Blood-pressure subscore over `sessions`, if there are enough of them
pub fn bp_score(sessions: &[Session], config: &ScoringConfig) -> Option<BpScore> {
    if sessions.len() < config.min_bp_sessions {
        tracing::debug!(
            "Only {} BP sessions (need {}); no subscore",
            sessions.len(),
            config.min_bp_sessions
        );
        return None;
    }

    let mut ordered: Vec<&Session> = sessions.iter().collect();
    ordered.sort_by_key(|s| s.datetime);

    let systolic: Vec<f64> = ordered.iter().map(|s| f64::from(s.systolic)).collect();
    let diastolic: Vec<f64> = ordered.iter().map(|s| f64::from(s.diastolic)).collect();
    let avg_systolic = mean(&systolic)?;
    let avg_diastolic = mean(&diastolic)?;

    let category = BpCategory::classify(avg_systolic, avg_diastolic);
    let base = category_base(category);

    let spread = std_dev(&systolic)?;
    let variability_penalty = round_tenths(((spread - 5.0).max(0.0) * 2.0).min(MAX_VARIABILITY_PENALTY));

    let trend_modifier = trend_modifier(&systolic);

    let value = (base - variability_penalty + trend_modifier).clamp(0.0, 100.0).round();

    tracing::debug!(
        "BP subscore {} (base {}, penalty {}, trend {})",
        value,
        base,
        variability_penalty,
        trend_modifier
    );

    Some(BpScore {
        value,
        category,
        avg_systolic: round_tenths(avg_systolic),
        avg_diastolic: round_tenths(avg_diastolic),
        base,
        variability_penalty,
        trend_modifier,
        session_count: sessions.len(),
    })
}

/// Sleep subscore over `entries`, if there are enough of them
pub fn sleep_score(entries: &[SleepEntry], config: &ScoringConfig) -> Option<SleepScore> {
    if entries.len() < config.min_sleep_entries {
        tracing::debug!(
            "Only {} sleep entries (need {}); no subscore",
            entries.len(),
            config.min_sleep_entries
        );
        return None;
    }

    let durations: Vec<f64> = entries.iter().map(|e| f64::from(e.duration_minutes)).collect();
    let avg_duration_minutes = mean(&durations)?;

    let (low, high) = OPTIMAL_SLEEP_MINUTES;
    let outside = if avg_duration_minutes < low {
        low - avg_duration_minutes
    } else if avg_duration_minutes > high {
        avg_duration_minutes - high
    } else {
        0.0
    };
    let duration_score = round_tenths((100.0 - outside * 0.5).clamp(0.0, 100.0));

    let restorative: Vec<f64> = entries.iter().filter_map(|e| e.restorative_percent()).collect();
    let avg_restorative = mean(&restorative).map(round_tenths);
    let restorative_score = avg_restorative
        .map(|r| round_tenths((r / RESTORATIVE_TARGET_PERCENT * 100.0).clamp(0.0, 100.0)))
        .unwrap_or(UNKNOWN_RESTORATIVE_SCORE);

    let consistency_bonus = consistency_bonus(entries);

    let value = (0.6 * duration_score + 0.4 * restorative_score + consistency_bonus)
        .clamp(0.0, 100.0)
        .round();

    tracing::debug!(
        "Sleep subscore {} (duration {}, restorative {}, consistency {})",
        value,
        duration_score,
        restorative_score,
        consistency_bonus
    );

    Some(SleepScore {
        value,
        avg_duration_minutes: round_tenths(avg_duration_minutes),
        duration_score,
        avg_restorative,
        restorative_score,
        consistency_bonus,
        entry_count: entries.len(),
    })
}

fn category_base(category: BpCategory) -> f64 {
    match category {
        BpCategory::Normal => 100.0,
        BpCategory::Elevated => 85.0,
        BpCategory::Hypertension1 => 70.0,
        BpCategory::Hypertension2 => 50.0,
        BpCategory::HypertensiveCrisis => 25.0,
    }
}

/// Compare the newer half of chronologically ordered systolic values with
/// the older half; the newer half takes the middle value of an odd count.
fn trend_modifier(systolic: &[f64]) -> f64 {
    let split = systolic.len() / 2;
    let (older, newer) = systolic.split_at(split);
    let (Some(older_mean), Some(newer_mean)) = (mean(older), mean(newer)) else {
        return 0.0;
    };

    let policy = catalog::default_catalog().policy(catalog::SYSTOLIC);
    let magnitude = ((newer_mean - older_mean).abs() / 2.0).round().min(MAX_TREND_MODIFIER);

    match policy.map(|p| classify(Some(newer_mean), Some(older_mean), p)) {
        Some(ChangeType::Improving) => magnitude,
        Some(ChangeType::Worsening) => -magnitude,
        _ => 0.0,
    }
}

fn consistency_bonus(entries: &[SleepEntry]) -> f64 {
    let bedtimes: Vec<f64> = entries
        .iter()
        .filter_map(|e| e.bedtime)
        .map(|t| {
            let minutes = f64::from(t.hour() * 60 + t.minute());
            // After-midnight bedtimes belong to the previous evening
            if t.hour() < 12 {
                minutes + 1440.0
            } else {
                minutes
            }
        })
        .collect();

    if bedtimes.len() < 2 {
        return 0.0;
    }

    match std_dev(&bedtimes) {
        Some(sd) if sd <= 30.0 => 5.0,
        Some(sd) if sd <= 60.0 => 0.0,
        Some(_) => -5.0,
        None => 0.0,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NoFilter;
    use crate::session::build_session;
    use crate::RawReading;
    use chrono::{NaiveDateTime, NaiveTime};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn at(d: u32) -> NaiveDateTime {
        day(d).and_hms_opt(8, 0, 0).unwrap()
    }

    fn session(d: u32, systolic: u16, diastolic: u16) -> Session {
        build_session(
            Uuid::new_v4(),
            at(d),
            &[RawReading::new(systolic, diastolic, Some(70))],
            None,
        )
        .unwrap()
    }

    fn night(d: u32, minutes: u32, stages: Option<(u32, u32)>, bedtime: Option<(u32, u32)>) -> SleepEntry {
        SleepEntry {
            id: Uuid::new_v4(),
            date: day(d),
            duration_minutes: minutes,
            deep_minutes: stages.map(|s| s.0),
            rem_minutes: stages.map(|s| s.1),
            bedtime: bedtime.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            notes: None,
        }
    }

    #[test]
    fn test_bp_score_requires_minimum_sessions() {
        let config = ScoringConfig::default();
        assert!(bp_score(&[session(1, 120, 80)], &config).is_none());
        assert!(bp_score(&[], &config).is_none());
    }

    #[test]
    fn test_bp_score_components() {
        // Given out of order; scoring sorts by datetime
        let sessions = [
            session(4, 130, 90),
            session(1, 150, 90),
            session(3, 140, 90),
            session(2, 150, 90),
        ];
        let score = bp_score(&sessions, &ScoringConfig::default()).unwrap();

        assert_eq!(score.category, BpCategory::Hypertension2);
        assert_eq!(score.base, 50.0);
        assert_eq!(score.avg_systolic, 142.5);
        // sd = 8.29 -> (8.29 - 5) * 2
        assert_eq!(score.variability_penalty, 6.6);
        // Older mean 150, newer mean 135: improving by round(7.5)
        assert_eq!(score.trend_modifier, 8.0);
        assert_eq!(score.value, 51.0);
        assert_eq!(score.components()["variability_penalty"], -6.6);
    }

    #[test]
    fn test_bp_trend_worsening_and_capped() {
        let sessions = [session(1, 120, 70), session(2, 165, 85)];
        let score = bp_score(&sessions, &ScoringConfig::default()).unwrap();
        // +45 mmHg -> magnitude 22.5 rounds to 23, capped at 10
        assert_eq!(score.trend_modifier, -10.0);
    }

    #[test]
    fn test_bp_trend_neutral_when_both_halves_optimal() {
        let sessions = [session(1, 118, 75), session(2, 104, 70)];
        let score = bp_score(&sessions, &ScoringConfig::default()).unwrap();
        assert_eq!(score.trend_modifier, 0.0);
        assert_eq!(score.category, BpCategory::Normal);
    }

    #[test]
    fn test_stable_normal_pressure_scores_full() {
        let sessions = [session(1, 112, 72), session(2, 114, 74), session(3, 113, 73)];
        let score = bp_score(&sessions, &ScoringConfig::default()).unwrap();
        assert_eq!(score.variability_penalty, 0.0);
        assert_eq!(score.value, 100.0);
    }

    #[test]
    fn test_sleep_score_components() {
        let entries = [
            night(1, 300, Some((60, 60)), Some((23, 0))),
            night(2, 300, Some((60, 60)), Some((23, 20))),
        ];
        let score = sleep_score(&entries, &ScoringConfig::default()).unwrap();

        assert_eq!(score.avg_duration_minutes, 300.0);
        // 120 minutes short of 7 hours
        assert_eq!(score.duration_score, 40.0);
        assert_eq!(score.avg_restorative, Some(40.0));
        assert_eq!(score.restorative_score, 88.9);
        assert_eq!(score.consistency_bonus, 5.0);
        // 0.6 * 40 + 0.4 * 88.9 + 5 = 64.56
        assert_eq!(score.value, 65.0);
    }

    #[test]
    fn test_sleep_without_stages_uses_neutral_restorative() {
        let entries = [night(1, 480, None, None), night(2, 480, None, None)];
        let score = sleep_score(&entries, &ScoringConfig::default()).unwrap();

        assert_eq!(score.duration_score, 100.0);
        assert_eq!(score.avg_restorative, None);
        assert_eq!(score.restorative_score, 70.0);
        assert_eq!(score.consistency_bonus, 0.0);
        assert_eq!(score.value, 88.0);
    }

    #[test]
    fn test_bedtimes_across_midnight_are_consistent() {
        let entries = [
            night(1, 450, None, Some((23, 50))),
            night(2, 450, None, Some((0, 10))),
        ];
        let score = sleep_score(&entries, &ScoringConfig::default()).unwrap();
        assert_eq!(score.consistency_bonus, 5.0);

        let erratic = [
            night(1, 450, None, Some((21, 0))),
            night(2, 450, None, Some((2, 0))),
        ];
        let score = sleep_score(&erratic, &ScoringConfig::default()).unwrap();
        assert_eq!(score.consistency_bonus, -5.0);
    }

    #[test]
    fn test_health_score_domains_are_independent() {
        let config = ScoringConfig::default();
        let sessions = [session(10, 118, 76), session(11, 116, 74)];

        let score = compute_health_score(&sessions, &[], day(12), &config, &NoFilter);
        assert!(score.bp_score.is_some());
        assert!(score.sleep_score.is_none());
        assert_eq!(score.overall(), score.bp_score.as_ref().map(|s| s.value));

        let empty = compute_health_score(&[], &[], day(12), &config, &NoFilter);
        assert_eq!(empty.overall(), None);
    }

    #[test]
    fn test_health_score_window_and_filter() {
        let config = ScoringConfig {
            window_days: 7,
            ..ScoringConfig::default()
        };
        // Only the last two sessions fall in the window ending on the 20th
        let sessions = [session(1, 170, 100), session(18, 118, 76), session(19, 116, 74)];
        let sleep = [night(18, 480, None, None), night(19, 480, None, None)];

        let score = compute_health_score(&sessions, &sleep, day(20), &config, &NoFilter);
        assert_eq!(score.bp_score.as_ref().unwrap().session_count, 2);
        assert_eq!(score.overall(), Some(94.0));

        let ignored: BTreeSet<String> = ["sleep".to_string()].into_iter().collect();
        let score = compute_health_score(&sessions, &sleep, day(20), &config, &ignored);
        assert!(score.sleep_score.is_none());
        assert!(score.bp_score.is_some());
    }

    #[test]
    fn test_scored_history_drops_ignored_and_old() {
        let config = ScoringConfig {
            window_days: 7,
            ..ScoringConfig::default()
        };
        let sessions = [session(1, 170, 100), session(18, 118, 76)];
        let sleep = [night(2, 300, None, None), night(18, 480, None, None)];

        let history = scored_history(&sessions, &sleep, day(20), &config, &NoFilter);
        assert_eq!(history.sessions.len(), 1);
        assert_eq!(history.sleep.len(), 1);

        let ignored: BTreeSet<String> = ["sleep".to_string()].into_iter().collect();
        let history = scored_history(&sessions, &sleep, day(20), &config, &ignored);
        assert!(history.sleep.is_empty());
        assert_eq!(history.sessions.len(), 1);
    }

    #[test]
    fn test_huge_window_covers_all_history() {
        let config = ScoringConfig {
            window_days: 100_000_000,
            ..ScoringConfig::default()
        };
        let sessions = [session(1, 120, 80), session(2, 118, 78)];

        let score = compute_health_score(&sessions, &[], day(20), &config, &NoFilter);
        assert_eq!(score.bp_score.map(|s| s.session_count), Some(2));

        let config = ScoringConfig {
            window_days: i64::MAX,
            ..ScoringConfig::default()
        };
        let history = scored_history(&sessions, &[], day(20), &config, &NoFilter);
        assert_eq!(history.sessions.len(), 2);
    }
}
