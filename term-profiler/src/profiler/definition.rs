//! Profiler definitions: which metrics to compute for which tables and columns.

use super::{Metric, MetricScope};
use crate::core::{Column, MetricFailure, Table};
use crate::error::TermError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics selected for one table.
///
/// Columns listed in `column_metrics` get exactly those metrics; a listed metric
/// that does not apply to the column's category is reported as a configuration
/// failure. Every other column gets `default_column_metrics`, silently filtered
/// to the metrics that apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSelection {
    /// Table-level metrics
    #[serde(default)]
    pub table_metrics: Vec<Metric>,
    /// Explicit metrics per column
    #[serde(default)]
    pub column_metrics: BTreeMap<String, Vec<Metric>>,
    /// Metrics for columns without an explicit entry
    #[serde(default)]
    pub default_column_metrics: Vec<Metric>,
}

impl MetricSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row and column counts plus every single-query column metric.
    pub fn standard() -> Self {
        Self {
            table_metrics: vec![Metric::RowCount, Metric::ColumnCount],
            column_metrics: BTreeMap::new(),
            default_column_metrics: vec![
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
            ],
        }
    }

    /// Every metric in the catalogue, including the dedicated median and
    /// histogram queries.
    pub fn all() -> Self {
        Self {
            table_metrics: vec![Metric::RowCount, Metric::ColumnCount],
            column_metrics: BTreeMap::new(),
            default_column_metrics: Metric::ALL
                .into_iter()
                .filter(|m| m.scope() == MetricScope::Column)
                .collect(),
        }
    }

    pub fn with_table_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.table_metrics.extend(metrics);
        self
    }

    pub fn with_column(
        mut self,
        column: impl Into<String>,
        metrics: impl IntoIterator<Item = Metric>,
    ) -> Self {
        self.column_metrics
            .entry(column.into())
            .or_default()
            .extend(metrics);
        self
    }

    pub fn with_default_column_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.default_column_metrics.extend(metrics);
        self
    }

    /// Resolves the selection against a table descriptor.
    pub fn resolve(&self, table: &Table) -> ResolvedSelection {
        let mut failures = Vec::new();

        let mut table_metrics = Vec::new();
        for &metric in &self.table_metrics {
            if metric.scope() == MetricScope::Table {
                push_unique(&mut table_metrics, metric);
            } else {
                failures.push(misplaced(None, metric, "is a column metric"));
            }
        }

        for name in self.column_metrics.keys() {
            if table.column(name).is_none() {
                for &metric in &self.column_metrics[name] {
                    failures.push(MetricFailure::from_error(
                        Some(name.as_str()),
                        metric,
                        &TermError::Configuration(format!(
                            "column '{name}' does not exist in table '{}'",
                            table.name
                        )),
                    ));
                }
            }
        }

        let mut columns = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            let mut metrics = Vec::new();
            match self.column_metrics.get(&column.name) {
                Some(explicit) => {
                    for &metric in explicit {
                        if metric.scope() == MetricScope::Table {
                            failures.push(misplaced(Some(column.name.as_str()), metric, "is a table metric"));
                        } else if !metric.applies_to(column.category) {
                            failures.push(misplaced(
                                Some(column.name.as_str()),
                                metric,
                                &format!("does not apply to {} columns", column.category),
                            ));
                        } else {
                            push_unique(&mut metrics, metric);
                        }
                    }
                }
                None => {
                    for &metric in &self.default_column_metrics {
                        if metric.scope() == MetricScope::Column && metric.applies_to(column.category)
                        {
                            push_unique(&mut metrics, metric);
                        }
                    }
                }
            }
            metrics.sort();
            columns.push(ResolvedColumn {
                column: column.clone(),
                metrics,
            });
        }

        table_metrics.sort();
        ResolvedSelection {
            table_metrics,
            columns,
            failures,
        }
    }
}

fn push_unique(metrics: &mut Vec<Metric>, metric: Metric) {
    if !metrics.contains(&metric) {
        metrics.push(metric);
    }
}

fn misplaced(column: Option<&str>, metric: Metric, reason: &str) -> MetricFailure {
    MetricFailure::from_error(
        column,
        metric,
        &TermError::Configuration(format!("metric '{metric}' {reason}")),
    )
}

/// Metrics to compute for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub column: Column,
    pub metrics: Vec<Metric>,
}

/// A [`MetricSelection`] matched against a table descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    /// Table-level metrics, sorted and deduplicated
    pub table_metrics: Vec<Metric>,
    /// Columns in catalog order with their sorted metrics
    pub columns: Vec<ResolvedColumn>,
    /// Requested metrics rejected before any query ran
    pub failures: Vec<MetricFailure>,
}

impl ResolvedSelection {
    /// Total number of metrics to compute.
    pub fn metric_count(&self) -> usize {
        self.table_metrics.len() + self.columns.iter().map(|c| c.metrics.len()).sum::<usize>()
    }
}

/// The profiler part of a workflow: a selection per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilerDef {
    /// Name of the profiler definition
    pub name: String,
    /// Selections keyed by table identifier
    #[serde(default)]
    pub tables: BTreeMap<String, MetricSelection>,
    /// Selection for tables without an entry; `None` profiles only listed tables
    #[serde(default)]
    pub default_selection: Option<MetricSelection>,
}

impl ProfilerDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>, selection: MetricSelection) -> Self {
        self.tables.insert(table.into(), selection);
        self
    }

    pub fn with_default_selection(mut self, selection: MetricSelection) -> Self {
        self.default_selection = Some(selection);
        self
    }

    /// Returns the selection that applies to `table`.
    pub fn selection_for(&self, table: &str) -> Option<&MetricSelection> {
        self.tables.get(table).or(self.default_selection.as_ref())
    }
}
