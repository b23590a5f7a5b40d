//! Fixed numeric constants named throughout §4 of the specification.

/// Default cap on a run's duration in steps (§4.5).
pub const DEFAULT_MAX_DURATION: i64 = 1000;

/// Direct-handling degraded threshold (I2).
pub const DEGRADED_THRESHOLD: f64 = 0.95;

/// Bottleneck threshold used by the run-completion summary and the
/// Impact Analyzer's critical path (§4.5, §4.8).
pub const BOTTLENECK_THRESHOLD: f64 = 0.9;

/// System-failure predicate ratio (§4.5 step 4).
pub const SYSTEM_FAILURE_RATIO: f64 = 0.5;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
