//! Test fixtures: in-memory tables and a fault-injecting connector.
//!
//! Available to unit tests and, with the `test-utils` feature, to integration
//! tests and downstream crates.

use crate::adapter::{QueryResult, WarehouseConnection, WarehouseConnector};
use crate::core::{Column, Table, Value};
use crate::error::{QueryErrorKind, Result, TermError};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Registers a single-batch in-memory table.
pub fn register_batch(
    ctx: &SessionContext,
    name: &str,
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
) -> Result<()> {
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let table = MemTable::try_new(schema, vec![vec![batch]])?;
    ctx.register_table(name, Arc::new(table))?;
    Ok(())
}

/// Registers the `numbers` table:
///
/// | value | label | empty |
/// |---|---|---|
/// | 1 | apple | NULL |
/// | 2 | banana | NULL |
/// | NULL | NULL | NULL |
/// | 4 | apple | NULL |
pub fn register_numbers(ctx: &SessionContext) -> Result<()> {
    register_batch(
        ctx,
        "numbers",
        vec![
            Field::new("value", DataType::Int64, true),
            Field::new("label", DataType::Utf8, true),
            Field::new("empty", DataType::Float64, true),
        ],
        vec![
            Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(4)])),
            Arc::new(StringArray::from(vec![
                Some("apple"),
                Some("banana"),
                None,
                Some("apple"),
            ])),
            Arc::new(Float64Array::from(vec![None::<f64>; 4])),
        ],
    )
}

/// Catalog descriptor of the `numbers` table.
pub fn numbers_table() -> Table {
    Table::new(
        "numbers",
        vec![
            Column::new("value", "bigint"),
            Column::new("label", "varchar"),
            Column::new("empty", "double precision"),
        ],
    )
}

/// A context holding the `numbers` table.
pub async fn numbers_context() -> Result<SessionContext> {
    let ctx = SessionContext::new();
    register_numbers(&ctx)?;
    Ok(ctx)
}

/// Registers the `emails` table with `total` rows of which the first `invalid`
/// hold a value that is not an email address.
pub fn register_emails(ctx: &SessionContext, total: usize, invalid: usize) -> Result<()> {
    let ids: Vec<i64> = (1..=total as i64).collect();
    let emails: Vec<String> = (0..total)
        .map(|i| {
            if i < invalid {
                format!("not-an-email-{i}")
            } else {
                format!("user{i}@example.com")
            }
        })
        .collect();
    register_batch(
        ctx,
        "emails",
        vec![
            Field::new("id", DataType::Int64, false),
            Field::new("email", DataType::Utf8, true),
        ],
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(emails)),
        ],
    )
}

/// Catalog descriptor of the `emails` table.
pub fn emails_table() -> Table {
    Table::new(
        "emails",
        vec![Column::new("id", "bigint"), Column::new("email", "text")],
    )
}

/// Registers `empty_table`, which has no rows.
pub fn register_empty(ctx: &SessionContext) -> Result<()> {
    register_batch(
        ctx,
        "empty_table",
        vec![Field::new("name", DataType::Utf8, true)],
        vec![Arc::new(StringArray::from(Vec::<Option<&str>>::new()))],
    )
}

/// Catalog descriptor of the `empty_table` table.
pub fn empty_table() -> Table {
    Table::new("empty_table", vec![Column::new("name", "varchar(20)")])
}

#[derive(Debug, Default)]
struct Faults {
    connect_failures: AtomicU32,
    connect_attempts: AtomicU32,
    failing_queries: Vec<(String, QueryErrorKind)>,
    slow_queries: Vec<(String, Duration)>,
    no_cancellation: bool,
}

/// Wraps a connector and injects failures by SQL substring.
///
/// ```rust,ignore
/// let connector = FaultInjectingConnector::new(DataFusionConnector::new(ctx))
///     .fail_queries_matching("\"orders\"", QueryErrorKind::ConnectionLost)
///     .delay_queries_matching("\"events\"", Duration::from_secs(5));
/// ```
pub struct FaultInjectingConnector {
    inner: Arc<dyn WarehouseConnector>,
    faults: Faults,
}

impl FaultInjectingConnector {
    pub fn new(inner: impl WarehouseConnector + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            faults: Faults::default(),
        }
    }

    /// Fails the next `count` connection attempts with a connection error.
    pub fn fail_connects(self, count: u32) -> Self {
        self.faults.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fails every query whose SQL contains `pattern`.
    pub fn fail_queries_matching(mut self, pattern: &str, kind: QueryErrorKind) -> Self {
        self.faults
            .failing_queries
            .push((pattern.to_string(), kind));
        self
    }

    /// Sleeps before running every query whose SQL contains `pattern`.
    pub fn delay_queries_matching(mut self, pattern: &str, delay: Duration) -> Self {
        self.faults.slow_queries.push((pattern.to_string(), delay));
        self
    }

    /// Makes connections report that they cannot cancel statements.
    pub fn without_cancellation(mut self) -> Self {
        self.faults.no_cancellation = true;
        self
    }

    /// Connection attempts seen so far, failed ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.faults.connect_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarehouseConnector for FaultInjectingConnector {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dialect_name(&self) -> &str {
        self.inner.dialect_name()
    }

    async fn connect(&self) -> Result<Box<dyn WarehouseConnection>> {
        self.faults.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.faults.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.faults
                .connect_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(TermError::connection(
                self.inner.name(),
                "injected connection failure",
            ));
        }
        let inner = self.inner.connect().await?;
        Ok(Box::new(FaultInjectingConnection {
            inner,
            failing: self.faults.failing_queries.clone(),
            slow: self.faults.slow_queries.clone(),
            cancellable: !self.faults.no_cancellation,
        }))
    }
}

struct FaultInjectingConnection {
    inner: Box<dyn WarehouseConnection>,
    failing: Vec<(String, QueryErrorKind)>,
    slow: Vec<(String, Duration)>,
    cancellable: bool,
}

#[async_trait]
impl WarehouseConnection for FaultInjectingConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if let Some((_, delay)) = self.slow.iter().find(|(p, _)| sql.contains(p.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        if let Some((pattern, kind)) = self.failing.iter().find(|(p, _)| sql.contains(p.as_str())) {
            return Err(TermError::query(
                *kind,
                format!("injected failure for query matching '{pattern}'"),
            ));
        }
        self.inner.query(sql, params).await
    }

    fn supports_cancellation(&self) -> bool {
        self.cancellable && self.inner.supports_cancellation()
    }

    async fn cancel(&mut self) -> Result<()> {
        self.inner.cancel().await
    }

    fn dialect_name(&self) -> &str {
        self.inner.dialect_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DataFusionConnector;

    #[tokio::test]
    async fn test_injected_query_failure() {
        let ctx = numbers_context().await.unwrap();
        let connector = FaultInjectingConnector::new(DataFusionConnector::new(ctx))
            .fail_queries_matching("numbers", QueryErrorKind::PermissionDenied);
        let mut conn = connector.connect().await.unwrap();

        let err = conn.query("SELECT * FROM numbers", &[]).await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(conn.query("SELECT 1", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_connect_failures_are_counted() {
        let ctx = SessionContext::new();
        let connector = FaultInjectingConnector::new(DataFusionConnector::new(ctx)).fail_connects(1);
        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_ok());
        assert_eq!(connector.connect_attempts(), 2);
    }
}
