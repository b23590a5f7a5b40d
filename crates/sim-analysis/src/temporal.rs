//! Temporal Analyzer (§4.7): trend detection and anomaly flagging over a
//! Run's snapshot history. Operates on completed `Run`s only; it never
//! touches the State Store or the Twin Graph directly.

use chrono::{DateTime, Utc};
use sim_domain::{EntityStatus, Snapshot};

const ANOMALY_WINDOW: usize = 5;
const TREND_MIN_POINTS: usize = 3;
const FLAT_SLOPE_EPSILON: f64 = 0.01;
const ANOMALY_Z_THRESHOLD: f64 = 2.0;
const ANOMALY_Z_HIGH: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    /// R² of the fit; 1.0 when the series is constant.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnomalySeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Anomaly {
    pub step: i64,
    pub value: f64,
    pub z_score: f64,
    pub severity: AnomalySeverity,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricSeries {
    pub metric: String,
    pub trend: Option<Trend>,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EntityTimeSeriesPoint {
    pub step: i64,
    pub timestamp: DateTime<Utc>,
    pub status: EntityStatus,
    pub utilization: f64,
    pub available: bool,
}

/// Run-level metrics the Temporal Analyzer knows how to extract by name
/// without a caller-supplied accessor.
pub const DEFAULT_METRICS: &[&str] = &["average_utilization", "peak_utilization", "active_entities", "failed_entities", "degraded_entities"];

fn metric_value(metrics: &sim_domain::RunMetrics, name: &str) -> Option<f64> {
    match name {
        "average_utilization" => Some(metrics.average_utilization),
        "peak_utilization" => Some(metrics.peak_utilization),
        "active_entities" => Some(metrics.active_entities as f64),
        "failed_entities" => Some(metrics.failed_entities as f64),
        "degraded_entities" => Some(metrics.degraded_entities as f64),
        _ => None,
    }
}

/// Stateless: every method is a pure function of the snapshot slice passed
/// in, so the same `Run` always analyzes the same way.
pub struct TemporalAnalyzer;

impl TemporalAnalyzer {
    /// Trend + anomalies for one named metric. Returns `None` if `name`
    /// isn't a recognized metric (use [`analyze_series`] for ad-hoc data).
    pub fn analyze_metric(snapshots: &[Snapshot], name: &str) -> Option<MetricSeries> {
        if snapshots.is_empty() {
            return Some(MetricSeries { metric: name.to_string(), trend: None, anomalies: Vec::new() });
        }
        metric_value(&snapshots[0].metrics, name)?;
        let steps: Vec<i64> = snapshots.iter().map(|s| s.step).collect();
        let values: Vec<f64> = snapshots.iter().map(|s| metric_value(&s.metrics, name).unwrap()).collect();
        Some(analyze_series(name, &steps, &values))
    }

    /// Every [`DEFAULT_METRICS`] entry, in order.
    pub fn analyze_all(snapshots: &[Snapshot]) -> Vec<MetricSeries> {
        DEFAULT_METRICS.iter().filter_map(|m| Self::analyze_metric(snapshots, m)).collect()
    }

    /// History of one entity's observable state across the run's snapshots.
    /// Entities absent from a given snapshot (shouldn't happen post-init,
    /// but the Twin Graph is immutable so this can't grow) are skipped.
    pub fn entity_time_series(snapshots: &[Snapshot], uri: &str) -> Vec<EntityTimeSeriesPoint> {
        snapshots.iter()
                 .filter_map(|s| {
                     s.state.get(uri).map(|e| EntityTimeSeriesPoint { step: s.step, timestamp: s.wall_clock, status: e.status, utilization: e.utilization, available: e.available })
                 })
                 .collect()
    }
}

/// Build a [`MetricSeries`] from an arbitrary caller-supplied (step, value)
/// series, e.g. a custom metric not covered by [`DEFAULT_METRICS`].
pub fn analyze_series(metric: &str, steps: &[i64], values: &[f64]) -> MetricSeries {
    MetricSeries { metric: metric.to_string(), trend: trend(values), anomalies: anomalies(steps, values) }
}

fn trend(values: &[f64]) -> Option<Trend> {
    if values.len() < TREND_MIN_POINTS {
        return None;
    }
    let n = values.len() as f64;
    let x_mean = (values.len() as f64 - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let confidence = if ss_tot == 0.0 {
        1.0
    } else {
        let ss_res: f64 = values.iter().enumerate().map(|(i, y)| (y - (slope * i as f64 + intercept)).powi(2)).sum();
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    let direction = if slope > FLAT_SLOPE_EPSILON {
        TrendDirection::Increasing
    } else if slope < -FLAT_SLOPE_EPSILON {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Some(Trend { direction, slope, confidence })
}

/// Each point from `ANOMALY_WINDOW - 1` onward is compared against the mean
/// and stdev of the preceding `ANOMALY_WINDOW - 1` points, so a flagged
/// point never dilutes its own baseline.
fn anomalies(steps: &[i64], values: &[f64]) -> Vec<Anomaly> {
    if values.len() < ANOMALY_WINDOW {
        return Vec::new();
    }
    let mut out = Vec::new();
    for i in (ANOMALY_WINDOW - 1)..values.len() {
        let baseline = &values[i + 1 - ANOMALY_WINDOW..i];
        let mean = baseline.iter().sum::<f64>() / baseline.len() as f64;
        let variance = baseline.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / baseline.len() as f64;
        let stdev = variance.sqrt();
        if stdev == 0.0 {
            continue;
        }
        let z = (values[i] - mean) / stdev;
        if z.abs() > ANOMALY_Z_THRESHOLD {
            let severity = if z.abs() > ANOMALY_Z_HIGH { AnomalySeverity::High } else { AnomalySeverity::Medium };
            out.push(Anomaly { step: steps[i], value: values[i], z_score: z, severity });
        }
    }
    out
}
