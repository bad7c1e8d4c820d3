//! Integration tests for table profiling over in-memory DataFusion tables.

use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field};
use datafusion::prelude::SessionContext;
use proptest::prelude::*;
use std::sync::Arc;
use term_profiler::adapter::{DataFusionConnector, WarehouseAdapter, WarehouseConnector};
use term_profiler::core::{Column, MetricValue, Table, TableProfile};
use term_profiler::dialect::{DialectDefinition, ExpressionKind, ExpressionRegistry};
use term_profiler::error::ErrorKind;
use term_profiler::profiler::{Metric, MetricSelection, Profiler};
use term_profiler::test_fixtures::{
    empty_table, numbers_context, numbers_table, register_batch, register_empty,
};

async fn adapter_for(ctx: SessionContext, registry: ExpressionRegistry, dialect: &str) -> WarehouseAdapter {
    let connection = DataFusionConnector::new(ctx).connect().await.unwrap();
    WarehouseAdapter::new(connection, Arc::new(registry).dialect(dialect))
}

async fn profile_numbers(selection: &MetricSelection) -> TableProfile {
    let ctx = numbers_context().await.unwrap();
    let mut adapter = adapter_for(ctx, ExpressionRegistry::with_builtins(), "datafusion").await;
    Profiler::default()
        .profile(&mut adapter, &numbers_table(), selection)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_standard_profile_of_numbers() {
    let profile = profile_numbers(&MetricSelection::standard()).await;
    assert!(profile.failures.is_empty(), "{:?}", profile.failures);

    assert_eq!(profile.row_count(), Some(4));
    assert_eq!(
        profile.table_value(Metric::ColumnCount),
        Some(&MetricValue::Integer(3))
    );

    let value = |m| profile.column_value("value", m).cloned();
    assert_eq!(value(Metric::NullCount), Some(MetricValue::Integer(1)));
    assert_eq!(value(Metric::ValuesCount), Some(MetricValue::Integer(3)));
    assert_eq!(value(Metric::Min), Some(MetricValue::Integer(1)));
    assert_eq!(value(Metric::Max), Some(MetricValue::Integer(4)));
    assert_eq!(value(Metric::Sum), Some(MetricValue::Integer(7)));
    assert_eq!(value(Metric::DistinctProportion), Some(MetricValue::Float(1.0)));
    let mean = value(Metric::Mean).and_then(|v| v.as_f64()).unwrap();
    assert!((mean - 7.0 / 3.0).abs() < 1e-9);

    // String columns get length metrics instead of numeric ones
    assert!(profile.column_value("label", Metric::Mean).is_none());
    assert_eq!(
        profile.column_value("label", Metric::MinLength),
        Some(&MetricValue::Integer(5))
    );
    assert_eq!(
        profile.column_value("label", Metric::Min),
        Some(&MetricValue::Text("apple".to_string()))
    );
}

#[tokio::test]
async fn test_all_null_column() {
    let profile = profile_numbers(&MetricSelection::standard()).await;
    assert_eq!(
        profile
            .column_value("empty", Metric::NullCount)
            .and_then(MetricValue::as_i64),
        profile.row_count()
    );
    assert_eq!(
        profile.column_value("empty", Metric::NullProportion),
        Some(&MetricValue::Float(1.0))
    );
    for metric in [Metric::Min, Metric::Max, Metric::Mean, Metric::Sum, Metric::StdDev] {
        assert!(
            profile.column_value("empty", metric).is_none(),
            "{metric} should be absent"
        );
    }
    // Zero non-null values leave the distinct proportion undefined
    assert!(profile
        .column_value("empty", Metric::DistinctProportion)
        .is_none());
}

#[tokio::test]
async fn test_empty_table() {
    let ctx = SessionContext::new();
    register_empty(&ctx).unwrap();
    let mut adapter = adapter_for(ctx, ExpressionRegistry::with_builtins(), "datafusion").await;
    let profile = Profiler::default()
        .profile(&mut adapter, &empty_table(), &MetricSelection::all())
        .await
        .unwrap();

    assert!(profile.failures.is_empty(), "{:?}", profile.failures);
    assert_eq!(profile.row_count(), Some(0));
    assert!(profile.column_value("name", Metric::NullProportion).is_none());
    assert_eq!(
        profile.column_value("name", Metric::Histogram),
        Some(&MetricValue::Histogram(vec![]))
    );
}

#[tokio::test]
async fn test_reprofiling_is_byte_identical() {
    let first = profile_numbers(&MetricSelection::all()).await;
    let second = profile_numbers(&MetricSelection::all()).await;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_broken_override_fails_only_its_metric() {
    let mut registry = ExpressionRegistry::with_builtins();
    let base = registry.definition("datafusion").unwrap().clone();
    registry.register(
        DialectDefinition::derived_from("broken", &base)
            .with_override(ExpressionKind::StdDev, "NO_SUCH_FUNCTION({0})"),
    );
    let ctx = numbers_context().await.unwrap();
    let mut adapter = adapter_for(ctx, registry, "broken").await;

    let selection = MetricSelection::new().with_column(
        "value",
        [Metric::StdDev, Metric::Max, Metric::NullProportion],
    );
    let profile = Profiler::default()
        .profile(&mut adapter, &numbers_table(), &selection)
        .await
        .unwrap();

    let failure = profile.failure(Some("value"), Metric::StdDev).unwrap();
    assert_eq!(failure.kind, ErrorKind::Query);
    assert_eq!(profile.failures.len(), 1);
    assert_eq!(
        profile.column_value("value", Metric::Max),
        Some(&MetricValue::Integer(4))
    );
    assert_eq!(
        profile.column_value("value", Metric::NullProportion),
        Some(&MetricValue::Float(0.25))
    );
}

#[tokio::test]
async fn test_unsupported_expression_is_a_configuration_failure() {
    // Unknown dialects use the defaults, which have no standard deviation
    let ctx = numbers_context().await.unwrap();
    let mut adapter = adapter_for(ctx, ExpressionRegistry::with_builtins(), "ansi").await;
    let selection = MetricSelection::new().with_column("value", [Metric::StdDev, Metric::Min]);
    let profile = Profiler::default()
        .profile(&mut adapter, &numbers_table(), &selection)
        .await
        .unwrap();

    let failure = profile.failure(Some("value"), Metric::StdDev).unwrap();
    assert_eq!(failure.kind, ErrorKind::Configuration);
    assert!(failure.message.contains("not supported by dialect 'ansi'"));
    assert_eq!(
        profile.column_value("value", Metric::Min),
        Some(&MetricValue::Integer(1))
    );
}

#[tokio::test]
async fn test_histogram_orders_by_frequency() {
    let selection = MetricSelection::new().with_column("label", [Metric::Histogram]);
    let profile = profile_numbers(&selection).await;
    match profile.column_value("label", Metric::Histogram) {
        Some(MetricValue::Histogram(buckets)) => {
            let rendered: Vec<(&str, u64)> =
                buckets.iter().map(|b| (b.value.as_str(), b.count)).collect();
            assert_eq!(rendered, vec![("apple", 2), ("banana", 1)]);
        }
        other => panic!("unexpected histogram {other:?}"),
    }
}

fn profile_values(values: &[Option<i64>]) -> TableProfile {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let ctx = SessionContext::new();
        register_batch(
            &ctx,
            "samples",
            vec![Field::new("v", DataType::Int64, true)],
            vec![Arc::new(Int64Array::from(values.to_vec()))],
        )
        .unwrap();
        let mut adapter = adapter_for(ctx, ExpressionRegistry::with_builtins(), "datafusion").await;
        let table = Table::new("samples", vec![Column::new("v", "bigint")]);
        Profiler::default()
            .profile(&mut adapter, &table, &MetricSelection::all())
            .await
            .unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_profile_counts_are_consistent(
        values in prop::collection::vec(prop::option::of(-1_000i64..1_000), 0..40),
    ) {
        let profile = profile_values(&values);
        let count = |m| profile.column_value("v", m).and_then(MetricValue::as_i64);

        let nulls = values.iter().filter(|v| v.is_none()).count() as i64;
        prop_assert_eq!(profile.row_count(), Some(values.len() as i64));
        prop_assert_eq!(count(Metric::NullCount), Some(nulls));
        prop_assert_eq!(count(Metric::ValuesCount), Some(values.len() as i64 - nulls));
        prop_assert_eq!(count(Metric::Max), values.iter().flatten().max().copied());

        let again = profile_values(&values);
        prop_assert_eq!(
            serde_json::to_string(&profile).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }
}
