//! Plain-language insights derived from a [`HealthScore`].
//!
//! Each rule either fires or not. Firing rules are collected in a fixed
//! order and the first [`MAX_INSIGHTS`] are kept; there is no ranking by
//! severity. When nothing fires a single fallback message is returned.
//!
//! Rule order:
//! 1. BP variability penalty above 10
//! 2. BP trend (improving or worsening)
//! 3. BP category is optimal
//! 4. Sleep duration score below 60
//! 5. Restorative sleep below 35%
//! 6. Irregular bedtimes
//! 7. Elevated systolic after short nights

use crate::score::HealthScore;
use crate::{BpCategory, Session, SleepEntry};
use chrono::NaiveDate;
use std::collections::HashSet;

pub const MAX_INSIGHTS: usize = 3;

pub const VARIABILITY_WARNING: &str =
    "Your blood pressure readings vary a lot. Measuring at the same time each day gives steadier numbers.";
pub const TREND_WARNING: &str =
    "Your blood pressure has been trending higher recently. Keep an eye on it.";
pub const OPTIMAL_CATEGORY: &str =
    "Your average blood pressure is in the normal range. Keep it up!";
pub const RESTORATIVE_WARNING: &str =
    "Less than 35% of your sleep is deep or REM sleep.";
pub const INCONSISTENT_SLEEP: &str =
    "Your bedtime varies a lot from night to night. A regular schedule helps recovery.";
pub const SHORT_SLEEP_CORRELATION: &str =
    "Your blood pressure tends to be higher after nights with less than 6 hours of sleep.";
pub const FALLBACK: &str = "Keep tracking to unlock personalized insights.";

const VARIABILITY_THRESHOLD: f64 = 10.0;
const LOW_DURATION_SCORE: f64 = 60.0;
const LOW_RESTORATIVE_PERCENT: f64 = 35.0;
const SHORT_NIGHT_MINUTES: u32 = 360;
const ELEVATED_SYSTOLIC: f64 = 130.0;

/// Derive at most [`MAX_INSIGHTS`] insights, or the fallback message
pub fn compose_insights(
    score: &HealthScore,
    sessions: &[Session],
    sleep: &[SleepEntry],
) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(bp) = &score.bp_score {
        if bp.variability_penalty > VARIABILITY_THRESHOLD {
            insights.push(VARIABILITY_WARNING.to_string());
        }

        if bp.trend_modifier > 0.0 {
            insights.push(trend_improving(bp.trend_modifier));
        } else if bp.trend_modifier < 0.0 {
            insights.push(TREND_WARNING.to_string());
        }

        if bp.category == BpCategory::OPTIMAL {
            insights.push(OPTIMAL_CATEGORY.to_string());
        }
    }

    if let Some(sleep_score) = &score.sleep_score {
        if sleep_score.duration_score < LOW_DURATION_SCORE {
            insights.push(short_sleep(sleep_score.avg_duration_minutes));
        }

        if matches!(sleep_score.avg_restorative, Some(r) if r < LOW_RESTORATIVE_PERCENT) {
            insights.push(RESTORATIVE_WARNING.to_string());
        }

        if sleep_score.consistency_bonus < 0.0 {
            insights.push(INCONSISTENT_SLEEP.to_string());
        }
    }

    if short_sleep_raises_systolic(sessions, sleep) {
        insights.push(SHORT_SLEEP_CORRELATION.to_string());
    }

    if insights.is_empty() {
        return vec![FALLBACK.to_string()];
    }

    if insights.len() > MAX_INSIGHTS {
        tracing::debug!("Dropping {} lower-order insights", insights.len() - MAX_INSIGHTS);
        insights.truncate(MAX_INSIGHTS);
    }
    insights
}

fn trend_improving(modifier: f64) -> String {
    format!(
        "Your blood pressure is improving (+{} points from your recent trend).",
        modifier.abs()
    )
}

fn short_sleep(avg_minutes: f64) -> String {
    format!(
        "You're averaging {:.1} hours of sleep. Most adults need 7-9 hours.",
        avg_minutes / 60.0
    )
}

/// Mean systolic of readings taken the day after a short night exceeds 130
fn short_sleep_raises_systolic(sessions: &[Session], sleep: &[SleepEntry]) -> bool {
    let mornings_after: HashSet<NaiveDate> = sleep
        .iter()
        .filter(|e| e.duration_minutes < SHORT_NIGHT_MINUTES)
        .filter_map(|e| e.date.succ_opt())
        .collect();

    if mornings_after.is_empty() {
        return false;
    }

    let systolic: Vec<f64> = sessions
        .iter()
        .flat_map(|s| &s.readings)
        .filter(|r| mornings_after.contains(&r.datetime.date()))
        .map(|r| f64::from(r.systolic))
        .collect();

    if systolic.is_empty() {
        return false;
    }

    let mean = systolic.iter().sum::<f64>() / systolic.len() as f64;
    mean > ELEVATED_SYSTOLIC
}
