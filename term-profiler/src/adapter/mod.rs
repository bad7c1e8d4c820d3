//! Warehouse adapter.
//!
//! A [`WarehouseConnector`] opens [`WarehouseConnection`]s; a [`ConnectionPool`]
//! bounds and reuses them; a [`WarehouseAdapter`] binds one pooled connection to a
//! [`Dialect`] and runs queries with a timeout. Queries are built with a
//! [`QueryBuilder`], which hands out placeholders for bound parameters or, for
//! dialects without parameter binding, escaped literals.
//!
//! Backends:
//!
//! - [`DataFusionConnector`]: SQL over a DataFusion `SessionContext`, always available
//! - `PostgresConnector`: PostgreSQL and Redshift over `tokio-postgres`, feature `postgres`

mod datafusion_backend;
mod pool;
#[cfg(feature = "postgres")]
mod postgres;
mod session;

pub use datafusion_backend::DataFusionConnector;
pub use pool::{ConnectionPool, PoolStats, PooledConnection, RetryPolicy};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresConnector};
pub use session::WarehouseAdapter;

use crate::core::Value;
use crate::dialect::{Dialect, ExpressionKind};
use crate::error::Result;
use async_trait::async_trait;

/// One live connection to a warehouse.
///
/// Implementations run one statement at a time; `query` takes `&mut self`.
#[async_trait]
pub trait WarehouseConnection: Send {
    /// Runs a statement with positional parameters and returns all rows.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Whether [`cancel`](Self::cancel) stops a running statement server-side.
    fn supports_cancellation(&self) -> bool {
        false
    }

    /// Cancels the statement that was running when its future was dropped.
    async fn cancel(&mut self) -> Result<()> {
        Ok(())
    }

    /// Name of the dialect this connection speaks.
    fn dialect_name(&self) -> &str;
}

/// Opens connections to one warehouse.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    /// Name used in logs and connection errors.
    fn name(&self) -> &str;

    /// Name of the dialect the warehouse speaks.
    fn dialect_name(&self) -> &str;

    async fn connect(&self) -> Result<Box<dyn WarehouseConnection>>;
}

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Output column names
    pub columns: Vec<String>,
    /// Rows in result order
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_row(&self) -> Option<&[Value]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// First value of the first row; `Value::Null` when there are no rows.
    pub fn scalar(&self) -> Value {
        self.rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    /// A query without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Accumulates bound parameters while a query is assembled.
#[derive(Debug)]
pub struct QueryBuilder<'a> {
    dialect: &'a Dialect,
    params: Vec<Value>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(dialect: &'a Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> &Dialect {
        self.dialect
    }

    /// Returns the SQL that stands for `value`: the next placeholder, or an
    /// escaped literal when the dialect binds no parameters.
    pub fn bind(&mut self, value: impl Into<Value>) -> Result<String> {
        let value = value.into();
        if !self.dialect.binds_parameters() {
            return self.inline(&value);
        }
        self.params.push(value);
        Ok(self.dialect.placeholder(self.params.len()))
    }

    /// Binds a number and casts it to a float, so that the parameter type does
    /// not depend on the column type it is compared with.
    pub fn bind_float(&mut self, value: f64) -> Result<String> {
        let slot = self.bind(value)?;
        self.dialect.expr(ExpressionKind::CastFloat, &[slot.as_str()])
    }

    fn inline(&self, value: &Value) -> Result<String> {
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => format!("{v:?}"),
            Value::String(v) => self.dialect.literal(v)?,
            Value::Timestamp(_) => self.dialect.literal(&value.to_string())?,
        })
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Finishes the query with the assembled SQL text.
    pub fn build(self, sql: impl Into<String>) -> Query {
        Query {
            sql: sql.into(),
            params: self.params,
        }
    }
}
