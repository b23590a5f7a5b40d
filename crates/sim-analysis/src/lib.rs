//! sim-analysis: the Temporal Analyzer and Impact Analyzer (§4.7, §4.8).
//!
//! Both analyzers are pure functions over a completed `Run`'s snapshots
//! and event log; neither holds state or performs I/O.

pub mod impact;
pub mod temporal;

pub use impact::{analyze, AffectedEntity, AlternativeAction, ImpactReport, ImpactType, OverallImpact, Urgency};
pub use temporal::{Anomaly, AnomalySeverity, EntityTimeSeriesPoint, MetricSeries, TemporalAnalyzer, Trend, TrendDirection, DEFAULT_METRICS};
