//! Query planning for profile metrics.
//!
//! Every aggregate-sourced metric of a column is folded into one `SELECT`, next
//! to a hidden `COUNT(*)` that feeds the derived proportions:
//!
//! ```sql
//! SELECT COUNT(*), SUM(CASE WHEN "v" IS NULL THEN 1 ELSE 0 END), AVG("v"), ...
//! FROM "t"
//! ```
//!
//! Results are read back by position, never by alias.

use super::{Metric, MetricSource};
use crate::adapter::{Query, QueryResult};
use crate::core::Value;
use crate::dialect::{Dialect, ExpressionKind};
use crate::error::{Result, TermError};
use std::collections::BTreeMap;

/// Renders the aggregate expression of an aggregate-sourced metric.
pub fn aggregate_expr(dialect: &Dialect, metric: Metric, column_sql: &str) -> Result<String> {
    let simple = |kind| dialect.expr(kind, &[column_sql]);
    match metric {
        Metric::ValuesCount => simple(ExpressionKind::Count),
        Metric::NullCount => simple(ExpressionKind::NullCount),
        Metric::DistinctCount => simple(ExpressionKind::DistinctCount),
        Metric::Min => simple(ExpressionKind::Min),
        Metric::Max => simple(ExpressionKind::Max),
        Metric::Mean => simple(ExpressionKind::Average),
        Metric::Sum => simple(ExpressionKind::Sum),
        Metric::StdDev => simple(ExpressionKind::StdDev),
        Metric::MinLength => {
            let length = simple(ExpressionKind::Length)?;
            dialect.expr(ExpressionKind::Min, &[length.as_str()])
        }
        Metric::MaxLength => {
            let length = simple(ExpressionKind::Length)?;
            dialect.expr(ExpressionKind::Max, &[length.as_str()])
        }
        other => Err(TermError::Internal(format!(
            "metric '{other}' is not computed by an aggregate"
        ))),
    }
}

/// The combined aggregate query of one column.
#[derive(Debug)]
pub struct ColumnPlan {
    total_expr: String,
    aggregates: Vec<(Metric, String)>,
    failures: Vec<(Metric, TermError)>,
}

impl ColumnPlan {
    /// Plans the aggregate part of `metrics` for one column.
    ///
    /// Derived metrics pull their inputs into the query even when the inputs
    /// were not requested. Metrics whose expression cannot be rendered in this
    /// dialect are returned by [`take_failures`](Self::take_failures) and left out
    /// of the query.
    pub fn build(dialect: &Dialect, column_sql: &str, metrics: &[Metric]) -> Result<Self> {
        let total_expr = dialect.expr(ExpressionKind::RowCount, &[])?;

        let mut needed: Vec<Metric> = Vec::new();
        for &metric in metrics {
            match metric.source() {
                MetricSource::Aggregate => needed.push(metric),
                MetricSource::Derived => needed.extend_from_slice(metric.derived_inputs()),
                _ => {}
            }
        }
        needed.sort();
        needed.dedup();

        let mut aggregates = Vec::with_capacity(needed.len());
        let mut failures = Vec::new();
        for metric in needed {
            match aggregate_expr(dialect, metric, column_sql) {
                Ok(expr) => aggregates.push((metric, expr)),
                Err(e) => failures.push((metric, e)),
            }
        }

        Ok(Self {
            total_expr,
            aggregates,
            failures,
        })
    }

    /// Metrics in the query, in select-list order after the hidden count.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.aggregates.iter().map(|(m, _)| *m)
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    /// Metrics that could not be rendered, with the reason.
    pub fn take_failures(&mut self) -> Vec<(Metric, TermError)> {
        std::mem::take(&mut self.failures)
    }

    /// The single query computing every planned aggregate.
    pub fn combined_query(&self, table_sql: &str) -> Query {
        let mut select = Vec::with_capacity(self.aggregates.len() + 1);
        select.push(self.total_expr.as_str());
        select.extend(self.aggregates.iter().map(|(_, expr)| expr.as_str()));
        Query::new(format!("SELECT {} FROM {table_sql}", select.join(", ")))
    }

    /// A query computing only `metric`, used to isolate a failing aggregate.
    pub fn single_query(&self, table_sql: &str, metric: Metric) -> Option<Query> {
        self.aggregates
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, expr)| {
                Query::new(format!(
                    "SELECT {}, {expr} FROM {table_sql}",
                    self.total_expr
                ))
            })
    }

    /// Reads the combined query's row: the total and one value per metric.
    pub fn read_combined(&self, result: &QueryResult) -> Result<(Value, BTreeMap<Metric, Value>)> {
        let row = result
            .first_row()
            .ok_or_else(|| TermError::Internal("aggregate query returned no row".to_string()))?;
        if row.len() != self.aggregates.len() + 1 {
            return Err(TermError::Internal(format!(
                "aggregate query returned {} columns, expected {}",
                row.len(),
                self.aggregates.len() + 1
            )));
        }
        let values = self
            .metrics()
            .zip(row[1..].iter().cloned())
            .collect();
        Ok((row[0].clone(), values))
    }
}

/// Reads the `(total, value)` row of a [`ColumnPlan::single_query`].
pub fn read_single(result: &QueryResult) -> Result<(Value, Value)> {
    match result.first_row() {
        Some([total, value]) => Ok((total.clone(), value.clone())),
        _ => Err(TermError::Internal(
            "single aggregate query returned an unexpected shape".to_string(),
        )),
    }
}

/// `SELECT COUNT(*) FROM table`.
pub fn row_count_query(dialect: &Dialect, table_sql: &str) -> Result<Query> {
    let count = dialect.expr(ExpressionKind::RowCount, &[])?;
    Ok(Query::new(format!("SELECT {count} FROM {table_sql}")))
}

/// The dedicated median query of a column.
pub fn median_query(dialect: &Dialect, table_sql: &str, column_sql: &str) -> Result<Query> {
    let median = dialect.expr(ExpressionKind::Median, &[column_sql])?;
    Ok(Query::new(format!("SELECT {median} FROM {table_sql}")))
}

/// The dedicated histogram query of a column: the `limit` most frequent
/// non-null values, ties broken by value.
pub fn histogram_query(
    dialect: &Dialect,
    table_sql: &str,
    column_sql: &str,
    limit: usize,
) -> Result<Query> {
    let count = dialect.expr(ExpressionKind::RowCount, &[])?;
    let not_null = dialect.expr(ExpressionKind::IsNotNull, &[column_sql])?;
    Ok(Query::new(format!(
        "SELECT {column_sql} AS bucket, {count} AS frequency FROM {table_sql} \
         WHERE {not_null} GROUP BY {column_sql} ORDER BY frequency DESC, bucket ASC LIMIT {limit}"
    )))
}
