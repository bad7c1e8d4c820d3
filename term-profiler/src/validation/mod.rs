//! Test evaluation against profiles and live queries.
//!
//! Each [`TestCase`] is evaluated in the cheapest way that decides it:
//!
//! 1. From values already in the [`TableProfile`] (row count, null count,
//!    distinct count, min/max, min/max length).
//! 2. From the catalog descriptor (column count).
//! 3. Otherwise with a dedicated query counting violating rows:
//!
//! ```sql
//! SELECT COUNT(*), SUM(CASE WHEN "c" IS NOT NULL AND NOT (<predicate>) THEN 1 ELSE 0 END)
//! FROM "t"
//! ```
//!
//! A row-level test passes when the share of violating rows does not exceed its
//! tolerance. A test whose evidence cannot be obtained is `aborted`, never
//! `fail`. Connection loss and cancellation stop the evaluation and are returned
//! as errors.

mod definition;

pub use definition::{TestCase, TestDef, TestKind};

use crate::adapter::{Query, QueryBuilder, WarehouseAdapter};
use crate::core::{
    Column, EvaluationPath, MetricValue, Table, TableProfile, TestCaseResult, TestIdentity, Value,
};
use crate::dialect::{Dialect, ExpressionKind};
use crate::error::{ErrorContext, Result, TermError};
use crate::log_outcome;
use crate::logging::LogConfig;
use crate::profiler::{plan, Metric};
use definition::Bounds;
use tracing::{info, instrument};

/// Evaluates test cases for one table.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    log_config: LogConfig,
}

/// Outcome of a violation-count query.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Violations {
    total: i64,
    violating: i64,
}

impl Violations {
    fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.violating as f64 / self.total as f64
        }
    }

    fn within(&self, tolerance: f64) -> bool {
        self.violating == 0 || self.ratio() <= tolerance
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// Evaluates `tests` in order.
    ///
    /// # Errors
    ///
    /// Returns a session-fatal error (connection lost, cancellation) raised by
    /// a query. Every other problem becomes an `aborted` result.
    #[instrument(skip_all, fields(table = %table.name, tests = tests.len()))]
    pub async fn evaluate(
        &self,
        tests: &[&TestCase],
        table: &Table,
        profile: &TableProfile,
        adapter: &mut WarehouseAdapter,
    ) -> Result<Vec<TestCaseResult>> {
        let mut results = Vec::with_capacity(tests.len());
        for test in tests {
            let result = self.evaluate_one(test, table, profile, adapter).await?;
            log_outcome!(
                self.log_config,
                test = %result.name,
                outcome = ?result.outcome,
                path = ?result.path,
                "Evaluated test"
            );
            results.push(result);
        }
        info!(
            passed = results.iter().filter(|r| r.outcome.is_pass()).count(),
            failed = results.iter().filter(|r| r.outcome.is_fail()).count(),
            aborted = results.iter().filter(|r| r.outcome.is_aborted()).count(),
            "Evaluated tests"
        );
        Ok(results)
    }

    async fn evaluate_one(
        &self,
        test: &TestCase,
        table: &Table,
        profile: &TableProfile,
        adapter: &mut WarehouseAdapter,
    ) -> Result<TestCaseResult> {
        let id = TestIdentity {
            name: test.name.clone(),
            table: test.table.clone(),
            column: test.kind.column().map(str::to_string),
            kind: test.kind.name(),
        };

        let column = match self.check(test, table) {
            Ok(column) => column,
            Err(e) => return Ok(TestCaseResult::aborted(&id, EvaluationPath::Catalog, &e)),
        };

        let outcome = match (&test.kind, column) {
            (TestKind::RowCountBetween { min, max }, _) => {
                row_count_between(&id, Bounds::new(*min, *max), profile, adapter).await
            }
            (TestKind::ColumnCountBetween { min, max }, _) => {
                let bounds = Bounds::new(*min, *max);
                let count = table.columns.len() as i64;
                Ok(decide(
                    &id,
                    EvaluationPath::Catalog,
                    bounds.contains(count),
                    MetricValue::Integer(count),
                    || format!("column count {count} is outside {bounds}"),
                ))
            }
            (TestKind::NotNull { .. }, Some(column)) => not_null(&id, column, profile, adapter).await,
            (TestKind::Unique { .. }, Some(column)) => unique(&id, column, profile, adapter).await,
            (
                TestKind::ValueInRange {
                    min,
                    max,
                    tolerance,
                    ..
                },
                Some(column),
            ) => {
                value_in_range(&id, column, Bounds::new(*min, *max), *tolerance, profile, adapter)
                    .await
            }
            (TestKind::LengthBetween { min, max, .. }, Some(column)) => {
                length_between(&id, column, Bounds::new(*min, *max), profile, adapter).await
            }
            (
                TestKind::RegexMatch {
                    pattern, tolerance, ..
                },
                Some(column),
            ) => regex_match(&id, column, pattern, *tolerance, adapter).await,
            (
                TestKind::CustomExpression {
                    expression,
                    tolerance,
                },
                _,
            ) => custom_expression(&id, expression, *tolerance, adapter).await,
            (kind, None) => Err(TermError::Internal(format!(
                "test kind '{}' requires a column",
                kind.name()
            ))),
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => Ok(TestCaseResult::aborted(&id, EvaluationPath::Query, &e)),
        }
    }

    /// Validates parameters and resolves the target column.
    fn check<'t>(&self, test: &TestCase, table: &'t Table) -> Result<Option<&'t Column>> {
        if test.table != table.name {
            return Err(TermError::Configuration(format!(
                "test targets table '{}', not '{}'",
                test.table, table.name
            )));
        }
        test.kind.validate()?;
        let Some(name) = test.kind.column() else {
            return Ok(None);
        };
        let column = table.column(name).ok_or_else(|| {
            TermError::Configuration(format!(
                "column '{name}' does not exist in table '{}'",
                table.name
            ))
        })?;
        if !test.kind.accepts(column.category) {
            return Err(TermError::Configuration(format!(
                "test kind '{}' does not apply to {} column '{name}'",
                test.kind.name(),
                column.category
            )));
        }
        Ok(Some(column))
    }
}

fn decide(
    id: &TestIdentity,
    path: EvaluationPath,
    passed: bool,
    observed: MetricValue,
    message: impl FnOnce() -> String,
) -> TestCaseResult {
    if passed {
        TestCaseResult::pass(id, path, observed)
    } else {
        TestCaseResult::fail(id, path, observed, message())
    }
}

fn decide_violations(
    id: &TestIdentity,
    violations: Violations,
    tolerance: f64,
    what: &str,
) -> TestCaseResult {
    decide(
        id,
        EvaluationPath::Query,
        violations.within(tolerance),
        MetricValue::Integer(violations.violating),
        || {
            format!(
                "{} of {} rows ({:.2}%) {what}, tolerance {:.2}%",
                violations.violating,
                violations.total,
                violations.ratio() * 100.0,
                tolerance * 100.0
            )
        },
    )
}

fn quoted(adapter: &WarehouseAdapter, table: &str, column: Option<&Column>) -> Result<(String, Option<String>)> {
    let dialect = adapter.dialect();
    let table_sql = dialect.quote_table(table)?;
    let column_sql = column
        .map(|c| dialect.quote_identifier(&c.name))
        .transpose()?;
    Ok((table_sql, column_sql))
}

async fn row_count_between(
    id: &TestIdentity,
    bounds: Bounds<i64>,
    profile: &TableProfile,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let (count, path) = match profile.row_count() {
        Some(count) => (count, EvaluationPath::Profile),
        None => {
            let (table_sql, _) = quoted(adapter, &id.table, None)?;
            let query = plan::row_count_query(adapter.dialect(), &table_sql)?;
            let count = adapter.execute_scalar(&query).await?.as_i64().unwrap_or(0);
            (count, EvaluationPath::Query)
        }
    };
    Ok(decide(
        id,
        path,
        bounds.contains(count),
        MetricValue::Integer(count),
        || format!("row count {count} is outside {bounds}"),
    ))
}

async fn not_null(
    id: &TestIdentity,
    column: &Column,
    profile: &TableProfile,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let (nulls, path) = match profile
        .column_value(&column.name, Metric::NullCount)
        .and_then(MetricValue::as_i64)
    {
        Some(nulls) => (nulls, EvaluationPath::Profile),
        None => {
            let (table_sql, column_sql) = quoted(adapter, &id.table, Some(column))?;
            let column_sql = column_sql.unwrap_or_default();
            let nulls = adapter.dialect().expr(ExpressionKind::NullCount, &[column_sql.as_str()])?;
            let query = Query::new(format!("SELECT {nulls} FROM {table_sql}"));
            let nulls = adapter.execute_scalar(&query).await?.as_i64().unwrap_or(0);
            (nulls, EvaluationPath::Query)
        }
    };
    Ok(decide(
        id,
        path,
        nulls == 0,
        MetricValue::Integer(nulls),
        || format!("column '{}' has {nulls} null values", column.name),
    ))
}

async fn unique(
    id: &TestIdentity,
    column: &Column,
    profile: &TableProfile,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let from_profile = profile
        .column_value(&column.name, Metric::ValuesCount)
        .and_then(MetricValue::as_i64)
        .zip(
            profile
                .column_value(&column.name, Metric::DistinctCount)
                .and_then(MetricValue::as_i64),
        );
    let ((values, distinct), path) = match from_profile {
        Some(counts) => (counts, EvaluationPath::Profile),
        None => {
            let (table_sql, column_sql) = quoted(adapter, &id.table, Some(column))?;
            let column_sql = column_sql.unwrap_or_default();
            let dialect = adapter.dialect();
            let count = dialect.expr(ExpressionKind::Count, &[column_sql.as_str()])?;
            let distinct = dialect.expr(ExpressionKind::DistinctCount, &[column_sql.as_str()])?;
            let query = Query::new(format!("SELECT {count}, {distinct} FROM {table_sql}"));
            let (values, distinct) = plan::read_single(&adapter.execute(&query).await?)?;
            (
                (values.as_i64().unwrap_or(0), distinct.as_i64().unwrap_or(0)),
                EvaluationPath::Query,
            )
        }
    };
    let duplicates = values - distinct;
    Ok(decide(
        id,
        path,
        duplicates == 0,
        MetricValue::Integer(duplicates),
        || format!("column '{}' has {duplicates} duplicate values", column.name),
    ))
}

async fn value_in_range(
    id: &TestIdentity,
    column: &Column,
    bounds: Bounds<f64>,
    tolerance: f64,
    profile: &TableProfile,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let extremes = profile
        .column_value(&column.name, Metric::Min)
        .and_then(MetricValue::as_f64)
        .zip(
            profile
                .column_value(&column.name, Metric::Max)
                .and_then(MetricValue::as_f64),
        );
    if let Some((min, max)) = extremes {
        if bounds.contains(min) && bounds.contains(max) {
            return Ok(TestCaseResult::pass(
                id,
                EvaluationPath::Profile,
                MetricValue::Integer(0),
            ));
        }
        if tolerance == 0.0 {
            let outlier = if bounds.contains(min) { max } else { min };
            return Ok(TestCaseResult::fail(
                id,
                EvaluationPath::Profile,
                MetricValue::Float(outlier),
                format!("value {outlier} of column '{}' is outside {bounds}", column.name),
            ));
        }
    }

    let (table_sql, column_sql) = quoted(adapter, &id.table, Some(column))?;
    let column_sql = column_sql.unwrap_or_default();
    let dialect = adapter.dialect().clone();
    let mut builder = QueryBuilder::new(&dialect);
    let mut conditions = Vec::with_capacity(2);
    if let Some(min) = bounds.min {
        conditions.push(format!("{column_sql} >= {}", builder.bind_float(min)?));
    }
    if let Some(max) = bounds.max {
        conditions.push(format!("{column_sql} <= {}", builder.bind_float(max)?));
    }
    let predicate = conditions.join(" AND ");
    let violations = count_violations(adapter, builder, &table_sql, Some(&column_sql), &predicate).await?;
    Ok(decide_violations(
        id,
        violations,
        tolerance,
        &format!("fall outside {bounds}"),
    ))
}

async fn length_between(
    id: &TestIdentity,
    column: &Column,
    bounds: Bounds<i64>,
    profile: &TableProfile,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let extremes = profile
        .column_value(&column.name, Metric::MinLength)
        .and_then(MetricValue::as_i64)
        .zip(
            profile
                .column_value(&column.name, Metric::MaxLength)
                .and_then(MetricValue::as_i64),
        );
    if let Some((shortest, longest)) = extremes {
        let passed = bounds.contains(shortest) && bounds.contains(longest);
        let outlier = if bounds.contains(shortest) { longest } else { shortest };
        return Ok(decide(
            id,
            EvaluationPath::Profile,
            passed,
            MetricValue::Integer(outlier),
            || format!("length {outlier} of column '{}' is outside {bounds}", column.name),
        ));
    }

    let (table_sql, column_sql) = quoted(adapter, &id.table, Some(column))?;
    let column_sql = column_sql.unwrap_or_default();
    let dialect = adapter.dialect().clone();
    let length = dialect.expr(ExpressionKind::Length, &[column_sql.as_str()])?;
    let mut builder = QueryBuilder::new(&dialect);
    let mut conditions = Vec::with_capacity(2);
    if let Some(min) = bounds.min {
        conditions.push(format!("{length} >= {}", builder.bind(min)?));
    }
    if let Some(max) = bounds.max {
        conditions.push(format!("{length} <= {}", builder.bind(max)?));
    }
    let predicate = conditions.join(" AND ");
    let violations = count_violations(adapter, builder, &table_sql, Some(&column_sql), &predicate).await?;
    Ok(decide_violations(
        id,
        violations,
        0.0,
        &format!("have a length outside {bounds}"),
    ))
}

async fn regex_match(
    id: &TestIdentity,
    column: &Column,
    pattern: &str,
    tolerance: f64,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let (table_sql, column_sql) = quoted(adapter, &id.table, Some(column))?;
    let column_sql = column_sql.unwrap_or_default();
    let dialect = adapter.dialect().clone();
    let mut builder = QueryBuilder::new(&dialect);
    let slot = builder.bind(pattern)?;
    let predicate = dialect.expr(ExpressionKind::RegexMatch, &[column_sql.as_str(), slot.as_str()])?;
    let violations = count_violations(adapter, builder, &table_sql, Some(&column_sql), &predicate).await?;
    Ok(decide_violations(
        id,
        violations,
        tolerance,
        &format!("do not match '{pattern}'"),
    ))
}

async fn custom_expression(
    id: &TestIdentity,
    expression: &str,
    tolerance: f64,
    adapter: &mut WarehouseAdapter,
) -> Result<TestCaseResult> {
    let (table_sql, _) = quoted(adapter, &id.table, None)?;
    let dialect = adapter.dialect().clone();
    let builder = QueryBuilder::new(&dialect);
    let violations = count_violations(adapter, builder, &table_sql, None, expression).await?;
    Ok(decide_violations(
        id,
        violations,
        tolerance,
        &format!("violate '{expression}'"),
    ))
}

/// Builds the violation-count query for a row predicate.
///
/// NULLs in `column_sql` never count as violations.
fn violation_query(
    dialect: &Dialect,
    builder: QueryBuilder<'_>,
    table_sql: &str,
    column_sql: Option<&str>,
    predicate: &str,
) -> Result<Query> {
    let total = dialect.expr(ExpressionKind::RowCount, &[])?;
    let condition = match column_sql {
        Some(column) => format!(
            "{} AND NOT ({predicate})",
            dialect.expr(ExpressionKind::IsNotNull, &[column])?
        ),
        None => format!("NOT ({predicate})"),
    };
    Ok(builder.build(format!(
        "SELECT {total}, SUM(CASE WHEN {condition} THEN 1 ELSE 0 END) FROM {table_sql}"
    )))
}

async fn count_violations(
    adapter: &mut WarehouseAdapter,
    builder: QueryBuilder<'_>,
    table_sql: &str,
    column_sql: Option<&str>,
    predicate: &str,
) -> Result<Violations> {
    let dialect = adapter.dialect().clone();
    let query = violation_query(&dialect, builder, table_sql, column_sql, predicate)?;
    let (total, violating) =
        plan::read_single(&adapter.execute(&query).await?).context("reading violation counts")?;
    Ok(Violations {
        total: total.as_i64().unwrap_or(0),
        // SUM over zero rows is NULL
        violating: match violating {
            Value::Null => 0,
            other => other.as_i64().ok_or_else(|| {
                TermError::Internal(format!("violation count '{other}' is not an integer"))
            })?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DataFusionConnector, WarehouseConnector};
    use crate::core::TestOutcome;
    use crate::dialect::ExpressionRegistry;
    use crate::test_fixtures::{numbers_context, numbers_table};
    use std::sync::Arc;

    async fn adapter() -> WarehouseAdapter {
        let ctx = numbers_context().await.unwrap();
        let connection = DataFusionConnector::new(ctx).connect().await.unwrap();
        let dialect = Arc::new(ExpressionRegistry::with_builtins()).dialect("datafusion");
        WarehouseAdapter::new(connection, dialect)
    }

    fn case(name: &str, kind: TestKind) -> TestCase {
        TestCase::new(name, "numbers", kind)
    }

    async fn run(kind: TestKind, profile: &TableProfile) -> TestCaseResult {
        let mut adapter = adapter().await;
        let test = case("t", kind);
        let mut results = Validator::new()
            .evaluate(&[&test], &numbers_table(), profile, &mut adapter)
            .await
            .unwrap();
        results.remove(0)
    }

    #[tokio::test]
    async fn test_row_count_from_profile() {
        let mut profile = TableProfile::new("numbers");
        profile.insert_table_value(Metric::RowCount, MetricValue::Integer(4));

        let result = run(
            TestKind::RowCountBetween {
                min: Some(2),
                max: Some(10),
            },
            &profile,
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Pass);
        assert_eq!(result.path, EvaluationPath::Profile);

        let result = run(
            TestKind::RowCountBetween {
                min: Some(5),
                max: Some(10),
            },
            &profile,
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Fail);
        assert_eq!(result.observed, Some(MetricValue::Integer(4)));
        assert_eq!(
            result.message.as_deref(),
            Some("row count 4 is outside [5, 10]")
        );
    }

    #[tokio::test]
    async fn test_not_null_falls_back_to_query() {
        let result = run(
            TestKind::NotNull {
                column: "value".to_string(),
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Fail);
        assert_eq!(result.path, EvaluationPath::Query);
        assert_eq!(result.observed, Some(MetricValue::Integer(1)));
    }

    #[tokio::test]
    async fn test_unique_with_duplicates() {
        let result = run(
            TestKind::Unique {
                column: "label".to_string(),
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Fail);
        assert_eq!(result.observed, Some(MetricValue::Integer(1)));

        let result = run(
            TestKind::Unique {
                column: "value".to_string(),
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Pass);
    }

    #[tokio::test]
    async fn test_value_in_range_with_tolerance() {
        let strict = run(
            TestKind::ValueInRange {
                column: "value".to_string(),
                min: Some(1.0),
                max: Some(2.0),
                tolerance: 0.0,
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(strict.outcome, TestOutcome::Fail);
        assert_eq!(strict.observed, Some(MetricValue::Integer(1)));

        // One violating row out of four
        let tolerant = run(
            TestKind::ValueInRange {
                column: "value".to_string(),
                min: Some(1.0),
                max: Some(2.0),
                tolerance: 0.25,
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(tolerant.outcome, TestOutcome::Pass);
    }

    #[tokio::test]
    async fn test_value_in_range_decided_by_profile() {
        let mut profile = TableProfile::new("numbers");
        profile.insert_column_value("value", Metric::Min, MetricValue::Integer(1));
        profile.insert_column_value("value", Metric::Max, MetricValue::Integer(4));

        let result = run(
            TestKind::ValueInRange {
                column: "value".to_string(),
                min: Some(0.0),
                max: None,
                tolerance: 0.0,
            },
            &profile,
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Pass);
        assert_eq!(result.path, EvaluationPath::Profile);

        let result = run(
            TestKind::ValueInRange {
                column: "value".to_string(),
                min: None,
                max: Some(3.0),
                tolerance: 0.0,
            },
            &profile,
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Fail);
        assert_eq!(result.observed, Some(MetricValue::Float(4.0)));
    }

    #[tokio::test]
    async fn test_length_between_query() {
        let result = run(
            TestKind::LengthBetween {
                column: "label".to_string(),
                min: Some(5),
                max: Some(5),
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Fail);
        assert_eq!(result.observed, Some(MetricValue::Integer(1)));
    }

    #[tokio::test]
    async fn test_regex_match_on_wrong_category_aborts() {
        let result = run(
            TestKind::RegexMatch {
                column: "value".to_string(),
                pattern: "^1".to_string(),
                tolerance: 0.0,
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Aborted);
        assert_eq!(result.path, EvaluationPath::Catalog);
        assert!(result.message.unwrap().contains("does not apply to numeric"));
    }

    #[tokio::test]
    async fn test_unknown_column_aborts() {
        let result = run(
            TestKind::NotNull {
                column: "missing".to_string(),
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Aborted);
        assert!(result.message.unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_custom_expression() {
        let result = run(
            TestKind::CustomExpression {
                expression: "\"value\" < 4".to_string(),
                tolerance: 0.0,
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Fail);
        assert_eq!(result.observed, Some(MetricValue::Integer(1)));
    }

    #[tokio::test]
    async fn test_broken_custom_expression_aborts() {
        let result = run(
            TestKind::CustomExpression {
                expression: "no_such_column > 1".to_string(),
                tolerance: 0.0,
            },
            &TableProfile::new("numbers"),
        )
        .await;
        assert_eq!(result.outcome, TestOutcome::Aborted);
        assert_eq!(result.path, EvaluationPath::Query);
        assert!(result.observed.is_none());
    }

    #[tokio::test]
    async fn test_results_keep_declared_order() {
        let mut adapter = adapter().await;
        let tests = [
            case("c", TestKind::ColumnCountBetween { min: Some(3), max: Some(3) }),
            case("a", TestKind::NotNull { column: "missing".to_string() }),
            case("b", TestKind::RowCountBetween { min: Some(1), max: None }),
        ];
        let refs: Vec<&TestCase> = tests.iter().collect();
        let results = Validator::new()
            .evaluate(&refs, &numbers_table(), &TableProfile::new("numbers"), &mut adapter)
            .await
            .unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(results[0].path, EvaluationPath::Catalog);
        assert!(results[0].outcome.is_pass());
        assert!(results[2].outcome.is_pass());
    }

    #[test]
    fn test_violation_ratio() {
        let v = Violations {
            total: 100,
            violating: 1,
        };
        assert!(!v.within(0.0));
        assert!(v.within(0.05));
        assert!(Violations { total: 0, violating: 0 }.within(0.0));
    }

    #[test]
    fn test_violation_query_shape() {
        let dialect = Arc::new(ExpressionRegistry::with_builtins()).dialect("postgres");
        let mut builder = QueryBuilder::new(&dialect);
        let slot = builder.bind("^a").unwrap();
        let predicate = dialect
            .expr(ExpressionKind::RegexMatch, &["\"c\"", slot.as_str()])
            .unwrap();
        let query = violation_query(&dialect, builder, "\"t\"", Some("\"c\""), &predicate).unwrap();
        assert_eq!(
            query.sql,
            "SELECT COUNT(*), SUM(CASE WHEN \"c\" IS NOT NULL AND NOT (\"c\" ~ $1) THEN 1 ELSE 0 END) FROM \"t\""
        );
        assert_eq!(query.params, vec![Value::from("^a")]);
    }
}
