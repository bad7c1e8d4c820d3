//! The closed catalogue of metrics the profiler can compute.

use crate::core::ColumnCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a metric describes a whole table or a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricScope {
    Table,
    Column,
}

/// How the profiler obtains a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    /// Read from the catalog descriptor, no query
    Catalog,
    /// One aggregate expression inside the combined column query
    Aggregate,
    /// Computed in-process from other values of the combined column query
    Derived,
    /// A dedicated query of its own
    Dedicated,
}

/// A profile metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of rows in the table
    RowCount,
    /// Number of columns reported by the catalog
    ColumnCount,
    /// Number of non-null values
    ValuesCount,
    /// Number of null values
    NullCount,
    /// Null values over all rows
    NullProportion,
    /// Number of distinct non-null values
    DistinctCount,
    /// Distinct values over non-null values
    DistinctProportion,
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Arithmetic mean of non-null values
    Mean,
    /// Sum of non-null values
    Sum,
    /// Sample standard deviation
    StdDev,
    /// Shortest string length
    MinLength,
    /// Longest string length
    MaxLength,
    /// 50th percentile
    Median,
    /// Most frequent values with their counts
    Histogram,
}

impl Metric {
    /// All metrics, in declaration order.
    pub const ALL: [Metric; 16] = [
        Metric::RowCount,
        Metric::ColumnCount,
        Metric::ValuesCount,
        Metric::NullCount,
        Metric::NullProportion,
        Metric::DistinctCount,
        Metric::DistinctProportion,
        Metric::Min,
        Metric::Max,
        Metric::Mean,
        Metric::Sum,
        Metric::StdDev,
        Metric::MinLength,
        Metric::MaxLength,
        Metric::Median,
        Metric::Histogram,
    ];

    /// Stable snake_case name, also used as the SQL column alias.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::RowCount => "row_count",
            Metric::ColumnCount => "column_count",
            Metric::ValuesCount => "values_count",
            Metric::NullCount => "null_count",
            Metric::NullProportion => "null_proportion",
            Metric::DistinctCount => "distinct_count",
            Metric::DistinctProportion => "distinct_proportion",
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::Mean => "mean",
            Metric::Sum => "sum",
            Metric::StdDev => "std_dev",
            Metric::MinLength => "min_length",
            Metric::MaxLength => "max_length",
            Metric::Median => "median",
            Metric::Histogram => "histogram",
        }
    }

    pub fn scope(&self) -> MetricScope {
        match self {
            Metric::RowCount | Metric::ColumnCount => MetricScope::Table,
            _ => MetricScope::Column,
        }
    }

    pub fn source(&self) -> MetricSource {
        match self {
            Metric::ColumnCount => MetricSource::Catalog,
            Metric::RowCount | Metric::Median | Metric::Histogram => MetricSource::Dedicated,
            Metric::NullProportion | Metric::DistinctProportion => MetricSource::Derived,
            _ => MetricSource::Aggregate,
        }
    }

    /// Returns true when the metric makes sense for a column of this category.
    pub fn applies_to(&self, category: ColumnCategory) -> bool {
        match self {
            Metric::RowCount | Metric::ColumnCount => false,
            Metric::ValuesCount
            | Metric::NullCount
            | Metric::NullProportion
            | Metric::DistinctCount
            | Metric::DistinctProportion
            | Metric::Histogram => true,
            Metric::Min | Metric::Max => category != ColumnCategory::Boolean,
            Metric::Mean | Metric::Sum | Metric::StdDev | Metric::Median => {
                category == ColumnCategory::Numeric
            }
            Metric::MinLength | Metric::MaxLength => category == ColumnCategory::String,
        }
    }

    /// Metrics a derived metric is computed from.
    pub(crate) fn derived_inputs(&self) -> &'static [Metric] {
        match self {
            Metric::NullProportion => &[Metric::NullCount],
            Metric::DistinctProportion => &[Metric::DistinctCount, Metric::ValuesCount],
            _ => &[],
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
