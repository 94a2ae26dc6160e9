//! Change indicators for lab metrics and blood-pressure sessions.
//!
//! Each indicator pairs the latest observation of a metric with the one
//! before it and classifies the change under the metric's catalog policy.

use crate::catalog::{MetricCatalog, DIASTOLIC, PULSE, SYSTOLIC};
use crate::change::{classify, format_delta, format_pct, ChangeType, DeltaStyle};
use crate::registry::MetricFilter;
use crate::{LabResult, Session};
use serde::Serialize;

/// Latest value of a metric against the previous one
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricTrend {
    pub key: String,
    pub name: String,
    pub unit: String,
    pub current: f64,
    pub previous: Option<f64>,
    pub kind: ChangeType,
    /// Formatted delta; absent with a single observation
    pub delta: Option<String>,
    pub pct: Option<String>,
}

/// Trend of every non-ignored lab metric that has at least one result
///
/// Results are ordered by date; same-day results keep their insertion order,
/// so the last one entered counts as the latest.
pub fn metric_trends(
    labs: &[LabResult],
    catalog: &MetricCatalog,
    filter: &impl MetricFilter,
    style: DeltaStyle,
) -> Vec<MetricTrend> {
    let mut trends = Vec::new();

    for metric in catalog.metrics.values() {
        if filter.is_ignored(&metric.key) {
            continue;
        }

        let mut results: Vec<&LabResult> =
            labs.iter().filter(|r| r.metric_key == metric.key).collect();
        results.sort_by_key(|r| r.date);

        let Some(latest) = results.last() else {
            continue;
        };
        let previous = results.len().checked_sub(2).map(|i| results[i].value);

        trends.push(build_trend(
            &metric.key,
            &metric.name,
            &metric.unit,
            latest.value,
            previous,
            catalog,
            style,
        ));
    }

    tracing::debug!("Computed {} lab metric trends", trends.len());
    trends
}

/// Systolic, diastolic and pulse of the latest session against the previous
///
/// Empty without sessions. Pulse is left out when the latest session has
/// none. Deltas are whole mmHg / bpm.
pub fn session_indicators(
    sessions: &[Session],
    catalog: &MetricCatalog,
    neutral_icon: bool,
) -> Vec<MetricTrend> {
    let mut sorted: Vec<&Session> = sessions.iter().collect();
    sorted.sort_by_key(|s| s.datetime);

    let Some(latest) = sorted.last() else {
        return Vec::new();
    };
    let previous = sorted.len().checked_sub(2).map(|i| sorted[i]);

    let style = DeltaStyle {
        integer: true,
        neutral_icon,
    };

    let mut indicators = Vec::with_capacity(3);
    let values: [(&str, Option<u16>, Option<u16>); 3] = [
        (
            SYSTOLIC,
            Some(latest.systolic),
            previous.map(|p| p.systolic),
        ),
        (
            DIASTOLIC,
            Some(latest.diastolic),
            previous.map(|p| p.diastolic),
        ),
        (PULSE, latest.pulse, previous.and_then(|p| p.pulse)),
    ];

    for (key, current, previous) in values {
        let (Some(current), Some(metric)) = (current, catalog.get(key)) else {
            continue;
        };
        indicators.push(build_trend(
            key,
            &metric.name,
            &metric.unit,
            f64::from(current),
            previous.map(f64::from),
            catalog,
            style,
        ));
    }

    indicators
}

fn build_trend(
    key: &str,
    name: &str,
    unit: &str,
    current: f64,
    previous: Option<f64>,
    catalog: &MetricCatalog,
    style: DeltaStyle,
) -> MetricTrend {
    let kind = match catalog.policy(key) {
        Some(policy) => classify(Some(current), previous, policy),
        None => ChangeType::Neutral,
    };

    MetricTrend {
        key: key.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        current,
        previous,
        kind,
        delta: previous.map(|p| format_delta(current, p, style)),
        pct: previous.map(|p| format_pct(current, p, style)),
    }
}
