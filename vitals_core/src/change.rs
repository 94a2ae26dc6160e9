//! Change classification between two observations of a metric.
//!
//! Whether a change is good depends on the metric, so every metric carries a
//! [`ChangeConfig`] policy:
//! - `HigherIsBetter`: increases of at least one unit improve
//! - `LowerIsBetter`: decreases improve, unless both values are already at or
//!   below `optimal_max`
//! - `Midpoint`: moving closer to a target improves, and two values inside
//!   the buffer zone around the target are equivalent
//!
//! Classification never fails: missing data and misconfigured policies both
//! degrade to [`ChangeType::Neutral`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendered in place of a delta that truncates to zero
pub const ZERO_DELTA: &str = "\u{2014}";

/// Per-metric policy deciding which direction is an improvement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeConfig {
    HigherIsBetter,
    LowerIsBetter {
        #[serde(default)]
        optimal_max: Option<f64>,
    },
    Midpoint {
        #[serde(default)]
        midpoint: Option<f64>,
        #[serde(default)]
        buffer_min: Option<f64>,
        #[serde(default)]
        buffer_max: Option<f64>,
    },
}

impl ChangeConfig {
    pub fn lower_is_better(optimal_max: Option<f64>) -> Self {
        ChangeConfig::LowerIsBetter { optimal_max }
    }

    pub fn midpoint(midpoint: f64, buffer_min: f64, buffer_max: f64) -> Self {
        ChangeConfig::Midpoint {
            midpoint: Some(midpoint),
            buffer_min: Some(buffer_min),
            buffer_max: Some(buffer_max),
        }
    }

    /// Report configuration mistakes that `classify` would silently absorb
    pub fn validate(&self) -> Result<()> {
        match self {
            ChangeConfig::HigherIsBetter | ChangeConfig::LowerIsBetter { .. } => Ok(()),
            ChangeConfig::Midpoint {
                midpoint,
                buffer_min,
                buffer_max,
            } => {
                if midpoint.is_none() {
                    return Err(Error::Config("midpoint policy without a midpoint".into()));
                }
                if let (Some(min), Some(max)) = (buffer_min, buffer_max) {
                    if min > max {
                        return Err(Error::Config(format!(
                            "buffer_min {} is above buffer_max {}",
                            min, max
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

/// Direction of a change under a policy
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Improving,
    Worsening,
    Neutral,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Improving => "improving",
            ChangeType::Worsening => "worsening",
            ChangeType::Neutral => "neutral",
        })
    }
}

/// Classification plus the truncated numeric change
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChangeResult {
    #[serde(rename = "type")]
    pub kind: ChangeType,
    /// `current - previous`, truncated toward zero to one decimal
    pub delta: f64,
    /// Percent change relative to `previous`; 0 when `previous` is 0
    pub pct_change: f64,
}

/// Classify the change from `previous` to `current`
///
/// Either side missing means insufficient data, reported as `Neutral`.
pub fn classify(current: Option<f64>, previous: Option<f64>, config: &ChangeConfig) -> ChangeType {
    let (Some(current), Some(previous)) = (current, previous) else {
        return ChangeType::Neutral;
    };

    match config {
        ChangeConfig::HigherIsBetter => {
            let diff = current - previous;
            if diff.abs() < 1.0 {
                ChangeType::Neutral
            } else if diff > 0.0 {
                ChangeType::Improving
            } else {
                ChangeType::Worsening
            }
        }

        ChangeConfig::LowerIsBetter { optimal_max } => {
            if let Some(max) = optimal_max {
                if current <= *max && previous <= *max {
                    return ChangeType::Neutral;
                }
            }
            if current < previous {
                ChangeType::Improving
            } else if current > previous {
                ChangeType::Worsening
            } else {
                ChangeType::Neutral
            }
        }

        ChangeConfig::Midpoint {
            midpoint,
            buffer_min,
            buffer_max,
        } => {
            let Some(target) = midpoint else {
                tracing::warn!("Midpoint policy has no midpoint; treating change as neutral");
                return ChangeType::Neutral;
            };

            if let (Some(min), Some(max)) = (buffer_min, buffer_max) {
                let buffered = |v: f64| v >= *min && v <= *max;
                if buffered(current) && buffered(previous) {
                    return ChangeType::Neutral;
                }
            }

            let current_distance = (current - target).abs();
            let previous_distance = (previous - target).abs();
            if (current_distance - previous_distance).abs() < 1e-9 {
                ChangeType::Neutral
            } else if current_distance < previous_distance {
                ChangeType::Improving
            } else {
                ChangeType::Worsening
            }
        }
    }
}

/// Classify and measure the change from `previous` to `current`
pub fn compare(current: f64, previous: f64, config: &ChangeConfig) -> ChangeResult {
    ChangeResult {
        kind: classify(Some(current), Some(previous), config),
        delta: truncate_tenths(current - previous),
        pct_change: truncate_tenths(percent_change(current, previous)),
    }
}

/// Rendering options for deltas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeltaStyle {
    /// Round to whole units instead of truncating to tenths
    pub integer: bool,
    /// Render a zero change as `±0` instead of a dash
    pub neutral_icon: bool,
}

/// Format `current - previous` as a signed string, e.g. `+1.9` or `-3`
pub fn format_delta(current: f64, previous: f64, style: DeltaStyle) -> String {
    format_signed(current - previous, style, "")
}

/// Format the percent change from `previous` to `current`, e.g. `+12.5%`
pub fn format_pct(current: f64, previous: f64, style: DeltaStyle) -> String {
    format_signed(percent_change(current, previous), style, "%")
}

fn format_signed(raw: f64, style: DeltaStyle, suffix: &str) -> String {
    let value = if style.integer {
        raw.round()
    } else {
        truncate_tenths(raw)
    };

    if value == 0.0 {
        return match (style.neutral_icon, style.integer) {
            (false, _) => ZERO_DELTA.to_string(),
            (true, true) => format!("\u{b1}0{}", suffix),
            (true, false) => format!("\u{b1}0.0{}", suffix),
        };
    }

    let sign = if value > 0.0 { "+" } else { "" };
    if style.integer {
        format!("{}{}{}", sign, value as i64, suffix)
    } else {
        format!("{}{:.1}{}", sign, value, suffix)
    }
}

fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Truncate toward zero to one decimal place
///
/// The nudge absorbs binary representation error, so that `120.7 - 118.4`
/// (2.29999...) still truncates to 2.3.
pub fn truncate_tenths(value: f64) -> f64 {
    let scaled = value * 10.0;
    let truncated = (scaled + scaled.signum() * 1e-9).trunc() / 10.0;
    if truncated == 0.0 {
        0.0
    } else {
        truncated
    }
}
