//! A connection bound to a dialect, with per-query timeouts.

use super::{PooledConnection, Query, QueryResult, WarehouseConnection};
use crate::core::Value;
use crate::dialect::Dialect;
use crate::error::{QueryErrorKind, Result, TermError};
use crate::log_query;
use crate::logging::LogConfig;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

enum Slot {
    Owned {
        connection: Box<dyn WarehouseConnection>,
        poisoned: bool,
    },
    Pooled(PooledConnection),
}

impl Slot {
    fn connection(&mut self) -> Result<&mut dyn WarehouseConnection> {
        match self {
            Slot::Owned { connection, .. } => Ok(connection.as_mut()),
            Slot::Pooled(pooled) => pooled.connection(),
        }
    }

    fn poison(&mut self) {
        match self {
            Slot::Owned { poisoned, .. } => *poisoned = true,
            Slot::Pooled(pooled) => pooled.poison(),
        }
    }

    fn is_poisoned(&self) -> bool {
        match self {
            Slot::Owned { poisoned, .. } => *poisoned,
            Slot::Pooled(pooled) => pooled.is_poisoned(),
        }
    }
}

/// Executes queries for one table session.
///
/// Every query runs under the configured timeout. On timeout the adapter asks
/// the connection to cancel the statement; connections that cannot cancel, and
/// connections that were lost, are poisoned and never go back to the pool.
pub struct WarehouseAdapter {
    slot: Slot,
    dialect: Dialect,
    query_timeout: Duration,
    log_config: LogConfig,
    queries_run: u64,
}

impl WarehouseAdapter {
    /// Wraps a dedicated connection.
    pub fn new(connection: Box<dyn WarehouseConnection>, dialect: Dialect) -> Self {
        Self::with_slot(
            Slot::Owned {
                connection,
                poisoned: false,
            },
            dialect,
        )
    }

    /// Wraps a connection checked out of a pool.
    pub fn pooled(connection: PooledConnection, dialect: Dialect) -> Self {
        Self::with_slot(Slot::Pooled(connection), dialect)
    }

    fn with_slot(slot: Slot, dialect: Dialect) -> Self {
        Self {
            slot,
            dialect,
            query_timeout: Duration::from_secs(300),
            log_config: LogConfig::default(),
            queries_run: 0,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }

    /// Number of queries issued through this adapter.
    pub fn queries_run(&self) -> u64 {
        self.queries_run
    }

    pub fn is_poisoned(&self) -> bool {
        self.slot.is_poisoned()
    }

    /// Runs a query and returns all rows.
    #[instrument(skip(self, query), fields(dialect = %self.dialect.name(), params = query.params.len()))]
    pub async fn execute(&mut self, query: &Query) -> Result<QueryResult> {
        // An abandoned statement may still be running on a poisoned connection
        if self.slot.is_poisoned() {
            return Err(TermError::query(
                QueryErrorKind::ConnectionLost,
                "connection abandoned after an earlier failure",
            ));
        }
        log_query!(self.log_config, &query.sql, "Executing query");
        self.queries_run += 1;
        let started = Instant::now();
        let timeout = self.query_timeout;

        let connection = self.slot.connection()?;
        let outcome = tokio::time::timeout(timeout, connection.query(&query.sql, &query.params)).await;

        match outcome {
            Ok(Ok(result)) => {
                debug!(
                    rows = result.rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Query completed"
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                if e.is_session_fatal() {
                    self.slot.poison();
                }
                Err(e)
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Query timed out");
                if connection.supports_cancellation() {
                    if let Err(e) = connection.cancel().await {
                        warn!("Cancelling timed out query failed: {e}");
                        self.slot.poison();
                    }
                } else {
                    self.slot.poison();
                }
                Err(TermError::query(
                    QueryErrorKind::Timeout,
                    format!("query exceeded {timeout:?}"),
                ))
            }
        }
    }

    /// Runs a query and returns the first value of the first row.
    pub async fn execute_scalar(&mut self, query: &Query) -> Result<Value> {
        Ok(self.execute(query).await?.scalar())
    }

    /// Ends the session, returning a pooled connection for reuse unless it was
    /// poisoned.
    pub fn release(self) {
        if let Slot::Pooled(pooled) = self.slot {
            pooled.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ConnectionPool, RetryPolicy, WarehouseConnector};
    use crate::dialect::ExpressionRegistry;
    use crate::test_fixtures::{numbers_context, FaultInjectingConnector};
    use crate::adapter::DataFusionConnector;
    use std::sync::Arc;

    fn dialect() -> Dialect {
        Arc::new(ExpressionRegistry::with_builtins()).dialect("datafusion")
    }

    #[tokio::test]
    async fn test_execute_scalar() {
        let ctx = numbers_context().await.unwrap();
        let connection = DataFusionConnector::new(ctx).connect().await.unwrap();
        let mut adapter = WarehouseAdapter::new(connection, dialect());
        let value = adapter
            .execute_scalar(&Query::new("SELECT COUNT(*) FROM \"numbers\""))
            .await
            .unwrap();
        assert_eq!(value, Value::Integer(4));
        assert_eq!(adapter.queries_run(), 1);
    }

    #[tokio::test]
    async fn test_timeout_without_cancellation_poisons_connection() {
        let ctx = numbers_context().await.unwrap();
        let connector = FaultInjectingConnector::new(DataFusionConnector::new(ctx))
            .delay_queries_matching("numbers", Duration::from_millis(500))
            .without_cancellation();
        let pool = ConnectionPool::new(
            Arc::new(connector),
            1,
            Duration::from_secs(1),
            RetryPolicy::no_retry(),
        );

        let conn = pool.acquire().await.unwrap();
        let mut adapter =
            WarehouseAdapter::pooled(conn, dialect()).with_query_timeout(Duration::from_millis(20));
        let err = adapter
            .execute(&Query::new("SELECT COUNT(*) FROM \"numbers\""))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TermError::Query {
                kind: QueryErrorKind::Timeout,
                ..
            }
        ));
        assert!(!err.is_session_fatal());
        assert!(adapter.is_poisoned());
        adapter.release();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_poisoned_connection_refuses_further_statements() {
        let ctx = numbers_context().await.unwrap();
        let connector = FaultInjectingConnector::new(DataFusionConnector::new(ctx))
            .delay_queries_matching("numbers", Duration::from_millis(500))
            .without_cancellation();
        let pool = ConnectionPool::new(
            Arc::new(connector),
            1,
            Duration::from_secs(1),
            RetryPolicy::no_retry(),
        );

        let conn = pool.acquire().await.unwrap();
        let mut adapter =
            WarehouseAdapter::pooled(conn, dialect()).with_query_timeout(Duration::from_millis(20));
        assert!(adapter
            .execute(&Query::new("SELECT COUNT(*) FROM \"numbers\""))
            .await
            .is_err());

        let err = adapter.execute(&Query::new("SELECT 1")).await.unwrap_err();
        assert!(matches!(
            err,
            TermError::Query {
                kind: QueryErrorKind::ConnectionLost,
                ..
            }
        ));
        assert!(err.is_session_fatal());
        assert_eq!(adapter.queries_run(), 1);
    }

    #[tokio::test]
    async fn test_timeout_with_cancellation_keeps_connection() {
        let ctx = numbers_context().await.unwrap();
        let connector = FaultInjectingConnector::new(DataFusionConnector::new(ctx))
            .delay_queries_matching("numbers", Duration::from_millis(500));
        let pool = ConnectionPool::new(
            Arc::new(connector),
            1,
            Duration::from_secs(1),
            RetryPolicy::no_retry(),
        );

        let conn = pool.acquire().await.unwrap();
        let mut adapter =
            WarehouseAdapter::pooled(conn, dialect()).with_query_timeout(Duration::from_millis(20));
        assert!(adapter
            .execute(&Query::new("SELECT COUNT(*) FROM \"numbers\""))
            .await
            .is_err());
        assert!(!adapter.is_poisoned());
        adapter.release();
        assert_eq!(pool.idle_count(), 1);
    }
}
