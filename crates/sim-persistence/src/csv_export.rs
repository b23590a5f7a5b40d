//! CSV export of a single metric's time series (§6): `step,timestamp,value`
//! with RFC-3339 timestamps and four decimal places on value.

use std::fmt::Write as _;

use crate::pg::SnapshotRow;

/// `name` must be one of the `RunMetrics` field names
/// (`average_utilization`, `peak_utilization`, `active_entities`,
/// `failed_entities`, `degraded_entities`); rows missing that field are
/// skipped rather than erroring the whole export.
pub fn metric_time_series_csv(rows: &[SnapshotRow], metric: &str) -> String {
    let mut out = String::from("step,timestamp,value\n");
    for row in rows {
        let Some(value) = row.metrics.get(metric).and_then(|v| v.as_f64()) else {
            continue;
        };
        writeln!(out, "{},{},{:.4}", row.step_number, row.wall_clock.to_rfc3339(), value).expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn row(step: i64, value: f64) -> SnapshotRow {
        SnapshotRow { run_id: "r1".to_string(),
                      step_number: step,
                      wall_clock: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, step as u32).unwrap(),
                      state: json!({}),
                      description: String::new(),
                      metrics: json!({ "average_utilization": value }) }
    }

    #[test]
    fn formats_with_four_decimal_places() {
        let csv = metric_time_series_csv(&[row(0, 0.5)], "average_utilization");
        assert!(csv.contains("0,2026-01-01T00:00:00+00:00,0.5000"));
    }

    #[test]
    fn header_is_always_present() {
        let csv = metric_time_series_csv(&[], "average_utilization");
        assert_eq!(csv, "step,timestamp,value\n");
    }

    #[test]
    fn rows_missing_the_metric_are_skipped() {
        let csv = metric_time_series_csv(&[row(0, 0.5)], "peak_utilization");
        assert_eq!(csv, "step,timestamp,value\n");
    }
}
