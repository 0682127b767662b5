//! Serializable summaries handed to exposers and sinks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::MetricSnapshot;

/// Everything a consumer reads in one pass, ordered by name.
///
/// Serializes as `{"counters": {..}, "gauges": {..}, "metrics": {..}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub counters: BTreeMap<String, i64>,
    pub gauges: BTreeMap<String, f64>,
    pub metrics: BTreeMap<String, MetricSummary>,
}

impl StatsSummary {
    pub fn new(
        counters: BTreeMap<String, i64>,
        gauges: BTreeMap<String, f64>,
        metrics: &BTreeMap<String, MetricSnapshot>,
    ) -> Self {
        Self {
            counters,
            gauges,
            metrics: metrics
                .iter()
                .map(|(name, snapshot)| (name.clone(), MetricSummary::from(snapshot)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The exported shape of one timing metric.
///
/// Percentile fields are histogram bucket values; an off-scale rank is
/// reported as `i64::MAX`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub average: f64,
    pub count: u64,
    pub max: f64,
    pub min: f64,
    pub p0: i64,
    pub p25: i64,
    pub p50: i64,
    pub p75: i64,
    pub p9: i64,
    pub p99: i64,
    pub p999: i64,
    pub p9999: i64,
    pub standard_deviation: f64,
}

impl From<&MetricSnapshot> for MetricSummary {
    fn from(snapshot: &MetricSnapshot) -> Self {
        let histogram = snapshot.histogram();

        Self {
            average: snapshot.mean(),
            count: snapshot.count(),
            max: snapshot.max(),
            min: snapshot.min(),
            p0: histogram.percentile(0.0),
            p25: histogram.percentile(0.25),
            p50: histogram.percentile(0.5),
            p75: histogram.percentile(0.75),
            p9: histogram.percentile(0.9),
            p99: histogram.percentile(0.99),
            p999: histogram.percentile(0.999),
            p9999: histogram.percentile(0.9999),
            standard_deviation: snapshot.standard_deviation(),
        }
    }
}
