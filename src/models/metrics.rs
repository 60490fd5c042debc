//! Derived KPI rows, one per (metric_name, date).

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// Metric names produced by the performance aggregator.
pub const DETECTION_RATE: &str = "detection_rate";
pub const PREVENTION_RATE: &str = "prevention_rate";
pub const FALSE_POSITIVE_RATE: &str = "false_positive_rate";
pub const MTTD_SECONDS: &str = "mttd_seconds";
pub const MTTR_SECONDS: &str = "mttr_seconds";

/// One KPI value for one day. Recomputation overwrites in place.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct PerformanceMetric {
    pub metric_name: String,
    pub value: f64,
    pub date: NaiveDate,
}
