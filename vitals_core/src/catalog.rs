//! Built-in catalog of tracked metrics and their change policies.
//!
//! Covers the blood-pressure and sleep indicators plus common blood-test
//! metrics. Keys double as ignored-metric keys.

use crate::change::ChangeConfig;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

pub const SYSTOLIC: &str = "systolic";
pub const DIASTOLIC: &str = "diastolic";
pub const PULSE: &str = "pulse";
pub const SLEEP_DURATION: &str = "sleep_duration";

/// Domain keys; ignoring one drops that whole subscore
pub const BLOOD_PRESSURE_DOMAIN: &str = "blood_pressure";
pub const SLEEP_DOMAIN: &str = "sleep";

/// A metric with its display data and change policy
#[derive(Clone, Debug, PartialEq)]
pub struct MetricDefinition {
    pub key: String,
    pub name: String,
    pub unit: String,
    pub change: ChangeConfig,
    /// Recorded as a lab result rather than derived from sessions or sleep
    pub lab: bool,
}

/// Metric definitions keyed by metric key
#[derive(Clone, Debug, Default)]
pub struct MetricCatalog {
    pub metrics: BTreeMap<String, MetricDefinition>,
}

impl MetricCatalog {
    pub fn get(&self, key: &str) -> Option<&MetricDefinition> {
        self.metrics.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.metrics.contains_key(key)
    }

    /// Metrics recorded as lab results, in key order
    pub fn lab_metrics(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.values().filter(|m| m.lab)
    }

    /// Change policy for `key`, if it is catalogued
    pub fn policy(&self, key: &str) -> Option<&ChangeConfig> {
        self.metrics.get(key).map(|m| &m.change)
    }

    /// Check every definition, returning one message per problem
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (key, metric) in &self.metrics {
            if key != &metric.key {
                errors.push(format!("Metric {} is filed under key {}", metric.key, key));
            }
            if let Err(e) = metric.change.validate() {
                errors.push(format!("Metric {}: {}", key, e));
            }
        }
        errors
    }

    fn insert(&mut self, key: &str, name: &str, unit: &str, change: ChangeConfig, lab: bool) {
        self.metrics.insert(
            key.to_string(),
            MetricDefinition {
                key: key.to_string(),
                name: name.to_string(),
                unit: unit.to_string(),
                change,
                lab,
            },
        );
    }
}

static DEFAULT_CATALOG: Lazy<MetricCatalog> = Lazy::new(build_default_catalog);

/// Shared, lazily built default catalog
pub fn default_catalog() -> &'static MetricCatalog {
    &DEFAULT_CATALOG
}

/// Build the default catalog from scratch
pub fn build_default_catalog() -> MetricCatalog {
    let mut catalog = MetricCatalog::default();

    // Vitals
    catalog.insert(
        SYSTOLIC,
        "Systolic",
        "mmHg",
        ChangeConfig::lower_is_better(Some(120.0)),
        false,
    );
    catalog.insert(
        DIASTOLIC,
        "Diastolic",
        "mmHg",
        ChangeConfig::lower_is_better(Some(80.0)),
        false,
    );
    catalog.insert(PULSE, "Pulse", "bpm", ChangeConfig::midpoint(70.0, 60.0, 100.0), false);
    catalog.insert(
        SLEEP_DURATION,
        "Sleep duration",
        "min",
        ChangeConfig::midpoint(480.0, 420.0, 540.0),
        false,
    );

    // Lipids
    catalog.insert("ldl", "LDL cholesterol", "mg/dL", ChangeConfig::lower_is_better(Some(100.0)), true);
    catalog.insert("hdl", "HDL cholesterol", "mg/dL", ChangeConfig::HigherIsBetter, true);
    catalog.insert(
        "total_cholesterol",
        "Total cholesterol",
        "mg/dL",
        ChangeConfig::lower_is_better(Some(200.0)),
        true,
    );
    catalog.insert(
        "triglycerides",
        "Triglycerides",
        "mg/dL",
        ChangeConfig::lower_is_better(Some(150.0)),
        true,
    );

    // Metabolic
    catalog.insert(
        "fasting_glucose",
        "Fasting glucose",
        "mg/dL",
        ChangeConfig::midpoint(85.0, 70.0, 99.0),
        true,
    );
    catalog.insert("hba1c", "HbA1c", "%", ChangeConfig::lower_is_better(Some(5.6)), true);
    catalog.insert("tsh", "TSH", "mIU/L", ChangeConfig::midpoint(2.0, 0.5, 4.0), true);
    catalog.insert("vitamin_d", "Vitamin D", "ng/mL", ChangeConfig::midpoint(50.0, 30.0, 80.0), true);
    catalog.insert(
        "body_temperature",
        "Body temperature",
        "\u{b0}F",
        ChangeConfig::midpoint(98.6, 97.0, 99.5),
        true,
    );

    catalog
}
