//! Table profiling with batched per-column aggregate queries.
//!
//! For each table the profiler issues the fewest queries that compute the
//! selected metrics:
//!
//! - **Table metrics**: one `COUNT(*)` query for the row count; the column count
//!   comes from the catalog descriptor.
//! - **Column aggregates**: one combined `SELECT` per column holding every
//!   aggregate metric plus a hidden `COUNT(*)`. Null and distinct proportions
//!   are derived in-process from the same row.
//! - **Median and histogram**: one dedicated query each.
//!
//! A metric that fails is recorded as a [`MetricFailure`] and the rest of the
//! table still completes. When the combined query of a column fails, each of its
//! aggregates is retried on its own so that only the broken metric is reported.
//! Connection loss and cancellation end the table's profile with an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use datafusion::prelude::SessionContext;
//! use std::sync::Arc;
//! use term_profiler::adapter::{DataFusionConnector, WarehouseAdapter, WarehouseConnector};
//! use term_profiler::core::{Column, Table};
//! use term_profiler::dialect::ExpressionRegistry;
//! use term_profiler::profiler::{MetricSelection, Profiler};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let connection = DataFusionConnector::new(SessionContext::new()).connect().await.unwrap();
//! let dialect = Arc::new(ExpressionRegistry::with_builtins()).dialect("datafusion");
//! let mut adapter = WarehouseAdapter::new(connection, dialect);
//!
//! let orders = Table::new("orders", vec![Column::new("amount", "numeric(10,2)")]);
//! let profiler = Profiler::builder().histogram_max_buckets(5).build();
//! let profile = profiler
//!     .profile(&mut adapter, &orders, &MetricSelection::standard())
//!     .await
//!     .unwrap();
//! println!("row count: {:?}", profile.row_count());
//! # })
//! ```

mod definition;
mod metrics;
pub mod plan;

pub use definition::{MetricSelection, ProfilerDef, ResolvedColumn, ResolvedSelection};
pub use metrics::{Metric, MetricScope, MetricSource};
pub use plan::ColumnPlan;

use crate::adapter::WarehouseAdapter;
use crate::core::{Column, HistogramBucket, MetricFailure, MetricValue, Table, TableProfile, Value};
use crate::error::{Result, TermError};
use crate::log_outcome;
use crate::logging::LogConfig;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Profiler settings.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Maximum number of buckets in a histogram
    pub histogram_max_buckets: usize,
    /// Logging behaviour
    pub log_config: LogConfig,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            histogram_max_buckets: 10,
            log_config: LogConfig::default(),
        }
    }
}

/// Builder for [`Profiler`].
#[derive(Debug, Clone, Default)]
pub struct ProfilerBuilder {
    config: ProfilerConfig,
}

impl ProfilerBuilder {
    /// Sets the maximum number of histogram buckets. Zero is raised to one.
    pub fn histogram_max_buckets(mut self, buckets: usize) -> Self {
        self.config.histogram_max_buckets = buckets.max(1);
        self
    }

    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.config.log_config = config;
        self
    }

    pub fn build(self) -> Profiler {
        Profiler {
            config: self.config,
        }
    }
}

/// Computes table profiles through a [`WarehouseAdapter`].
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    config: ProfilerConfig,
}

impl Profiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    pub fn builder() -> ProfilerBuilder {
        ProfilerBuilder::default()
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profiles one table.
    ///
    /// The returned profile holds only requested metrics. Metrics that could not
    /// be computed are listed in [`TableProfile::failures`].
    ///
    /// # Errors
    ///
    /// Fails when the table identifier cannot be quoted, or with a session-fatal
    /// error (connection lost, cancellation) raised by any query.
    #[instrument(skip_all, fields(table = %table.name))]
    pub async fn profile(
        &self,
        adapter: &mut WarehouseAdapter,
        table: &Table,
        selection: &MetricSelection,
    ) -> Result<TableProfile> {
        let resolved = selection.resolve(table);
        let table_sql = adapter.dialect().quote_table(&table.name)?;
        let mut profile = TableProfile::new(&table.name);

        for failure in resolved.failures {
            profile.record_failure(failure);
        }

        for &metric in &resolved.table_metrics {
            self.profile_table_metric(adapter, table, &table_sql, metric, &mut profile)
                .await?;
        }

        for column in &resolved.columns {
            if column.metrics.is_empty() {
                continue;
            }
            self.profile_column(adapter, &table_sql, &column.column, &column.metrics, &mut profile)
                .await?;
        }

        info!(
            values = profile.value_count(),
            failures = profile.failures.len(),
            "Profiled table"
        );
        Ok(profile)
    }

    async fn profile_table_metric(
        &self,
        adapter: &mut WarehouseAdapter,
        table: &Table,
        table_sql: &str,
        metric: Metric,
        profile: &mut TableProfile,
    ) -> Result<()> {
        match metric {
            Metric::ColumnCount => {
                profile.insert_table_value(
                    Metric::ColumnCount,
                    MetricValue::Integer(table.columns.len() as i64),
                );
            }
            Metric::RowCount => {
                let outcome = match plan::row_count_query(adapter.dialect(), table_sql) {
                    Ok(query) => adapter.execute_scalar(&query).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(value) => {
                        if let Some(value) = value.into_metric_value() {
                            profile.insert_table_value(Metric::RowCount, value);
                        }
                    }
                    Err(e) if e.is_session_fatal() => return Err(e),
                    Err(e) => self.record(profile, None, metric, &e),
                }
            }
            other => {
                let error = TermError::Configuration(format!("metric '{other}' is a column metric"));
                self.record(profile, None, other, &error);
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(column = %column.name))]
    async fn profile_column(
        &self,
        adapter: &mut WarehouseAdapter,
        table_sql: &str,
        column: &Column,
        metrics: &[Metric],
        profile: &mut TableProfile,
    ) -> Result<()> {
        let name = column.name.as_str();
        profile.column_entry(name);

        let dialect = adapter.dialect().clone();
        let column_sql = match dialect.quote_identifier(name) {
            Ok(sql) => sql,
            Err(e) => {
                for &metric in metrics {
                    self.record(profile, Some(name), metric, &e);
                }
                return Ok(());
            }
        };

        let (total, values, errors) = match ColumnPlan::build(&dialect, &column_sql, metrics) {
            Ok(mut plan) => {
                let mut errors: BTreeMap<Metric, TermError> =
                    plan.take_failures().into_iter().collect();
                let (total, values) = self
                    .run_column_plan(adapter, table_sql, &plan, &mut errors)
                    .await?;
                (total, values, errors)
            }
            Err(e) => {
                for &metric in metrics {
                    self.record(profile, Some(name), metric, &e);
                }
                return Ok(());
            }
        };

        for &metric in metrics {
            match metric.source() {
                MetricSource::Aggregate => {
                    if let Some(error) = errors.get(&metric) {
                        self.record(profile, Some(name), metric, error);
                    } else if let Some(value) =
                        values.get(&metric).cloned().and_then(Value::into_metric_value)
                    {
                        profile.insert_column_value(name, metric, value);
                    }
                }
                MetricSource::Derived => {
                    let failed_input = metric
                        .derived_inputs()
                        .iter()
                        .find_map(|input| errors.get(input).map(|e| (*input, e)));
                    if let Some((input, error)) = failed_input {
                        let mut failure = MetricFailure::from_error(Some(name), metric, error);
                        failure.message = format!("input '{input}' failed: {}", failure.message);
                        self.record_failure(profile, failure);
                    } else if let Some(value) = derive(metric, &total, &values) {
                        profile.insert_column_value(name, metric, value);
                    }
                }
                MetricSource::Dedicated => {
                    self.profile_dedicated(adapter, table_sql, &column_sql, name, metric, profile)
                        .await?;
                }
                MetricSource::Catalog => {}
            }
        }
        Ok(())
    }

    /// Runs the combined query, falling back to one query per aggregate when it
    /// fails with a non-fatal error.
    async fn run_column_plan(
        &self,
        adapter: &mut WarehouseAdapter,
        table_sql: &str,
        plan: &ColumnPlan,
        errors: &mut BTreeMap<Metric, TermError>,
    ) -> Result<(Value, BTreeMap<Metric, Value>)> {
        if plan.is_empty() {
            return Ok((Value::Null, BTreeMap::new()));
        }

        let combined = adapter
            .execute(&plan.combined_query(table_sql))
            .await
            .and_then(|result| plan.read_combined(&result));
        match combined {
            Ok(row) => return Ok(row),
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => warn!("Combined column query failed, isolating metrics: {e}"),
        }

        let mut total = Value::Null;
        let mut values = BTreeMap::new();
        for metric in plan.metrics() {
            let Some(query) = plan.single_query(table_sql, metric) else {
                continue;
            };
            let single = adapter
                .execute(&query)
                .await
                .and_then(|result| plan::read_single(&result));
            match single {
                Ok((row_total, value)) => {
                    total = row_total;
                    values.insert(metric, value);
                }
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => {
                    debug!(metric = %metric, "Isolated metric failed: {e}");
                    errors.insert(metric, e);
                }
            }
        }
        Ok((total, values))
    }

    async fn profile_dedicated(
        &self,
        adapter: &mut WarehouseAdapter,
        table_sql: &str,
        column_sql: &str,
        column: &str,
        metric: Metric,
        profile: &mut TableProfile,
    ) -> Result<()> {
        let outcome = match metric {
            Metric::Median => self.median(adapter, table_sql, column_sql).await,
            Metric::Histogram => self.histogram(adapter, table_sql, column_sql).await,
            other => Err(TermError::Internal(format!(
                "metric '{other}' has no dedicated query"
            ))),
        };
        match outcome {
            Ok(Some(value)) => profile.insert_column_value(column, metric, value),
            Ok(None) => {}
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => self.record(profile, Some(column), metric, &e),
        }
        Ok(())
    }

    async fn median(
        &self,
        adapter: &mut WarehouseAdapter,
        table_sql: &str,
        column_sql: &str,
    ) -> Result<Option<MetricValue>> {
        let query = plan::median_query(adapter.dialect(), table_sql, column_sql)?;
        Ok(adapter.execute_scalar(&query).await?.into_metric_value())
    }

    async fn histogram(
        &self,
        adapter: &mut WarehouseAdapter,
        table_sql: &str,
        column_sql: &str,
    ) -> Result<Option<MetricValue>> {
        let query = plan::histogram_query(
            adapter.dialect(),
            table_sql,
            column_sql,
            self.config.histogram_max_buckets,
        )?;
        let result = adapter.execute(&query).await?;
        let mut buckets = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            let [value, frequency] = row.as_slice() else {
                return Err(TermError::Internal(
                    "histogram query returned an unexpected shape".to_string(),
                ));
            };
            let count = frequency.as_i64().ok_or_else(|| {
                TermError::Internal(format!("histogram frequency '{frequency}' is not an integer"))
            })?;
            buckets.push(HistogramBucket {
                value: value.to_string(),
                count: count.max(0) as u64,
            });
        }
        Ok(Some(MetricValue::Histogram(buckets)))
    }

    fn record(&self, profile: &mut TableProfile, column: Option<&str>, metric: Metric, error: &TermError) {
        self.record_failure(profile, MetricFailure::from_error(column, metric, error));
    }

    fn record_failure(&self, profile: &mut TableProfile, failure: MetricFailure) {
        log_outcome!(
            self.config.log_config,
            column = failure.column.as_deref().unwrap_or("<table>"),
            metric = %failure.metric,
            kind = %failure.kind,
            "Metric failed: {}",
            failure.message
        );
        profile.record_failure(failure);
    }
}

/// Computes a derived metric from the combined query's values.
///
/// Proportions over zero rows are undefined and yield `None`.
fn derive(metric: Metric, total: &Value, values: &BTreeMap<Metric, Value>) -> Option<MetricValue> {
    let ratio = |numerator: Option<f64>, denominator: Option<f64>| match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(MetricValue::Float(n / d)),
        _ => None,
    };
    let value = |m: Metric| values.get(&m).and_then(Value::as_f64);
    match metric {
        Metric::NullProportion => ratio(value(Metric::NullCount), total.as_f64()),
        Metric::DistinctProportion => ratio(value(Metric::DistinctCount), value(Metric::ValuesCount)),
        _ => None,
    }
}
