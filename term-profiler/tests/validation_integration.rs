//! Integration tests for test evaluation against profiles and live queries.

use datafusion::prelude::SessionContext;
use std::sync::Arc;
use term_profiler::adapter::{DataFusionConnector, WarehouseAdapter, WarehouseConnector};
use term_profiler::core::{EvaluationPath, MetricValue, Table, TableProfile, TestOutcome};
use term_profiler::dialect::{DialectDefinition, ExpressionRegistry};
use term_profiler::profiler::{MetricSelection, Profiler};
use term_profiler::test_fixtures::{emails_table, numbers_context, numbers_table, register_emails};
use term_profiler::validation::{TestCase, TestKind, Validator};

const EMAIL_PATTERN: &str = r"^[^@]+@[^@]+\.[a-z]+$";

async fn emails_adapter(registry: ExpressionRegistry, dialect: &str) -> WarehouseAdapter {
    let ctx = SessionContext::new();
    register_emails(&ctx, 100, 1).unwrap();
    let connection = DataFusionConnector::new(ctx).connect().await.unwrap();
    WarehouseAdapter::new(connection, Arc::new(registry).dialect(dialect))
}

fn email_test(tolerance: f64) -> TestCase {
    TestCase::new(
        format!("email_format_{tolerance}"),
        "emails",
        TestKind::RegexMatch {
            column: "email".to_string(),
            pattern: EMAIL_PATTERN.to_string(),
            tolerance,
        },
    )
}

async fn evaluate(
    adapter: &mut WarehouseAdapter,
    table: &Table,
    profile: &TableProfile,
    tests: &[TestCase],
) -> Vec<term_profiler::core::TestCaseResult> {
    let tests: Vec<&TestCase> = tests.iter().collect();
    Validator::new()
        .evaluate(&tests, table, profile, adapter)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_regex_tolerance() {
    let mut adapter = emails_adapter(ExpressionRegistry::with_builtins(), "datafusion").await;
    let profile = TableProfile::new("emails");
    let results = evaluate(
        &mut adapter,
        &emails_table(),
        &profile,
        &[email_test(0.0), email_test(0.05)],
    )
    .await;

    assert_eq!(results[0].outcome, TestOutcome::Fail);
    assert_eq!(results[0].observed, Some(MetricValue::Integer(1)));
    assert_eq!(results[0].path, EvaluationPath::Query);
    assert!(results[0]
        .message
        .as_deref()
        .is_some_and(|m| m.starts_with("1 of 100 rows")));

    assert_eq!(results[1].outcome, TestOutcome::Pass);
    assert_eq!(results[1].observed, Some(MetricValue::Integer(1)));
}

#[tokio::test]
async fn test_regex_with_inline_literals() {
    let mut registry = ExpressionRegistry::with_builtins();
    let base = registry.definition("datafusion").unwrap().clone();
    registry.register(DialectDefinition::derived_from("inline", &base).with_parameter_binding(false));
    let mut adapter = emails_adapter(registry, "inline").await;

    let results = evaluate(
        &mut adapter,
        &emails_table(),
        &TableProfile::new("emails"),
        &[email_test(0.0)],
    )
    .await;
    assert_eq!(results[0].outcome, TestOutcome::Fail);
    assert_eq!(results[0].observed, Some(MetricValue::Integer(1)));
}

#[tokio::test]
async fn test_row_count_from_profile() {
    let ctx = numbers_context().await.unwrap();
    let connection = DataFusionConnector::new(ctx).connect().await.unwrap();
    let mut adapter = WarehouseAdapter::new(
        connection,
        Arc::new(ExpressionRegistry::with_builtins()).dialect("datafusion"),
    );
    let table = numbers_table();
    let profile = Profiler::default()
        .profile(&mut adapter, &table, &MetricSelection::standard())
        .await
        .unwrap();

    let tests = [
        TestCase::new(
            "small",
            "numbers",
            TestKind::RowCountBetween { min: Some(2), max: Some(10) },
        ),
        TestCase::new(
            "large",
            "numbers",
            TestKind::RowCountBetween { min: Some(5), max: Some(10) },
        ),
        TestCase::new(
            "value_unique",
            "numbers",
            TestKind::Unique { column: "value".to_string() },
        ),
        TestCase::new(
            "label_unique",
            "numbers",
            TestKind::Unique { column: "label".to_string() },
        ),
    ];
    let results = evaluate(&mut adapter, &table, &profile, &tests).await;
    let queries_after = adapter.queries_run();

    assert_eq!(results[0].outcome, TestOutcome::Pass);
    assert_eq!(results[0].path, EvaluationPath::Profile);
    assert_eq!(results[1].outcome, TestOutcome::Fail);
    assert_eq!(results[1].observed, Some(MetricValue::Integer(4)));
    assert_eq!(results[1].message.as_deref(), Some("row count 4 is outside [5, 10]"));

    assert_eq!(results[2].outcome, TestOutcome::Pass);
    assert_eq!(results[3].outcome, TestOutcome::Fail);
    assert_eq!(results[3].observed, Some(MetricValue::Integer(1)));

    // Everything above was answered by the profile
    let again = evaluate(&mut adapter, &table, &profile, &tests).await;
    assert_eq!(again, results);
    assert_eq!(adapter.queries_run(), queries_after);
}

#[tokio::test]
async fn test_failed_query_aborts_only_its_test() {
    let mut adapter = emails_adapter(ExpressionRegistry::with_builtins(), "datafusion").await;
    let tests = [
        TestCase::new(
            "broken",
            "emails",
            TestKind::CustomExpression {
                expression: "no_such_column > 0".to_string(),
                tolerance: 0.0,
            },
        ),
        TestCase::new(
            "ids_positive",
            "emails",
            TestKind::CustomExpression {
                expression: "id > 0".to_string(),
                tolerance: 0.0,
            },
        ),
    ];
    let results = evaluate(&mut adapter, &emails_table(), &TableProfile::new("emails"), &tests).await;

    assert_eq!(results[0].outcome, TestOutcome::Aborted);
    assert_eq!(results[0].path, EvaluationPath::Query);
    assert_eq!(results[1].outcome, TestOutcome::Pass);
    assert_eq!(results[1].observed, Some(MetricValue::Integer(0)));
}
