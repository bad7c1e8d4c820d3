//! Computed table profiles.

use crate::core::MetricValue;
use crate::error::{ErrorKind, TermError};
use crate::profiler::Metric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A metric that was requested but could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFailure {
    /// Column the metric targets, `None` for table-level metrics
    pub column: Option<String>,
    /// The failed metric
    pub metric: Metric,
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable cause
    pub message: String,
}

impl MetricFailure {
    /// Creates a failure record from an error.
    pub fn from_error(column: Option<&str>, metric: Metric, error: &TermError) -> Self {
        Self {
            column: column.map(str::to_string),
            metric,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Metric values of one column.
///
/// A metric whose SQL aggregate evaluated to NULL (for example the mean of an
/// all-null column) is absent from `values`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub values: BTreeMap<Metric, MetricValue>,
}

impl ColumnProfile {
    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.values.get(&metric)
    }
}

/// The computed profile of a table.
///
/// All maps are ordered so that serializing the profile of an unchanged snapshot
/// produces identical bytes on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    /// Table identifier
    pub table: String,
    /// Table-level metric values
    pub table_metrics: BTreeMap<Metric, MetricValue>,
    /// Column-level metric values keyed by column name
    pub columns: BTreeMap<String, ColumnProfile>,
    /// Requested metrics that failed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<MetricFailure>,
}

impl TableProfile {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Returns a table-level metric value.
    pub fn table_value(&self, metric: Metric) -> Option<&MetricValue> {
        self.table_metrics.get(&metric)
    }

    /// Returns a column-level metric value.
    pub fn column_value(&self, column: &str, metric: Metric) -> Option<&MetricValue> {
        self.columns.get(column).and_then(|c| c.get(metric))
    }

    /// Returns the row count if it was computed.
    pub fn row_count(&self) -> Option<i64> {
        self.table_value(Metric::RowCount).and_then(MetricValue::as_i64)
    }

    /// Returns the failure recorded for a metric, if any.
    pub fn failure(&self, column: Option<&str>, metric: Metric) -> Option<&MetricFailure> {
        self.failures
            .iter()
            .find(|f| f.metric == metric && f.column.as_deref() == column)
    }

    pub(crate) fn insert_table_value(&mut self, metric: Metric, value: MetricValue) {
        self.table_metrics.insert(metric, value);
    }

    pub(crate) fn insert_column_value(&mut self, column: &str, metric: Metric, value: MetricValue) {
        self.column_entry(column).values.insert(metric, value);
    }

    /// Makes sure the column appears in the profile even when every metric was
    /// absent or failed.
    pub(crate) fn column_entry(&mut self, column: &str) -> &mut ColumnProfile {
        self.columns.entry(column.to_string()).or_default()
    }

    pub(crate) fn record_failure(&mut self, failure: MetricFailure) {
        self.failures.push(failure);
    }

    /// Total number of metric values present.
    pub fn value_count(&self) -> usize {
        self.table_metrics.len() + self.columns.values().map(|c| c.values.len()).sum::<usize>()
    }
}
