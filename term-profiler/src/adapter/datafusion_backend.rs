//! DataFusion backend: SQL over an in-process `SessionContext`.

use super::{QueryResult, WarehouseConnection, WarehouseConnector};
use crate::core::Value;
use crate::error::{QueryErrorKind, Result, TermError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use datafusion::error::DataFusionError;
use datafusion::prelude::SessionContext;
use datafusion::scalar::ScalarValue;

/// Connects to tables registered in a DataFusion [`SessionContext`].
///
/// Every connection shares the context's catalog. Dropping a running query's
/// future stops its execution, so connections report cancellation support.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use datafusion::prelude::*;
/// use term_profiler::adapter::DataFusionConnector;
///
/// # async fn example() -> datafusion::error::Result<()> {
/// let ctx = SessionContext::new();
/// ctx.register_csv("orders", "data/orders.csv", CsvReadOptions::new()).await?;
/// let connector = Arc::new(DataFusionConnector::new(ctx));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataFusionConnector {
    ctx: SessionContext,
    name: String,
}

impl DataFusionConnector {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            name: "datafusion".to_string(),
        }
    }

    /// Sets the name used in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }
}

#[async_trait]
impl WarehouseConnector for DataFusionConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn dialect_name(&self) -> &str {
        "datafusion"
    }

    async fn connect(&self) -> Result<Box<dyn WarehouseConnection>> {
        Ok(Box::new(DataFusionConnection {
            ctx: self.ctx.clone(),
        }))
    }
}

struct DataFusionConnection {
    ctx: SessionContext,
}

#[async_trait]
impl WarehouseConnection for DataFusionConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut df = self.ctx.sql(sql).await.map_err(classify)?;
        if !params.is_empty() {
            let values: Vec<ScalarValue> = params.iter().map(to_scalar).collect();
            df = df.with_param_values(values).map_err(classify)?;
        }

        let columns: Vec<String> = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let batches = df.collect().await.map_err(classify)?;

        let mut rows = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let mut values = Vec::with_capacity(batch.num_columns());
                for column in batch.columns() {
                    let scalar = ScalarValue::try_from_array(column, row).map_err(classify)?;
                    values.push(from_scalar(scalar));
                }
                rows.push(values);
            }
        }

        Ok(QueryResult { columns, rows })
    }

    fn supports_cancellation(&self) -> bool {
        true
    }

    fn dialect_name(&self) -> &str {
        "datafusion"
    }
}

/// Maps DataFusion errors onto the query error taxonomy.
fn classify(error: DataFusionError) -> TermError {
    let kind = match error.find_root() {
        DataFusionError::SQL(..)
        | DataFusionError::Plan(_)
        | DataFusionError::SchemaError(..)
        | DataFusionError::NotImplemented(_) => QueryErrorKind::Syntax,
        DataFusionError::IoError(_) => QueryErrorKind::ConnectionLost,
        _ => QueryErrorKind::Execution,
    };
    TermError::query(kind, error.to_string())
}

fn to_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Boolean(v) => ScalarValue::Boolean(Some(*v)),
        Value::Integer(v) => ScalarValue::Int64(Some(*v)),
        Value::Float(v) => ScalarValue::Float64(Some(*v)),
        Value::String(v) => ScalarValue::Utf8(Some(v.clone())),
        Value::Timestamp(v) => {
            ScalarValue::TimestampMicrosecond(Some(v.timestamp_micros()), Some("UTC".into()))
        }
    }
}

fn from_scalar(scalar: ScalarValue) -> Value {
    if scalar.is_null() {
        return Value::Null;
    }
    match scalar {
        ScalarValue::Boolean(Some(v)) => Value::Boolean(v),
        ScalarValue::Int8(Some(v)) => Value::Integer(v.into()),
        ScalarValue::Int16(Some(v)) => Value::Integer(v.into()),
        ScalarValue::Int32(Some(v)) => Value::Integer(v.into()),
        ScalarValue::Int64(Some(v)) => Value::Integer(v),
        ScalarValue::UInt8(Some(v)) => Value::Integer(v.into()),
        ScalarValue::UInt16(Some(v)) => Value::Integer(v.into()),
        ScalarValue::UInt32(Some(v)) => Value::Integer(v.into()),
        ScalarValue::UInt64(Some(v)) => match i64::try_from(v) {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::Float(v as f64),
        },
        ScalarValue::Float32(Some(v)) => Value::Float(v.into()),
        ScalarValue::Float64(Some(v)) => Value::Float(v),
        ScalarValue::Decimal128(Some(v), _, scale) => {
            Value::Float(v as f64 / 10f64.powi(i32::from(scale)))
        }
        ScalarValue::Utf8(Some(v))
        | ScalarValue::LargeUtf8(Some(v))
        | ScalarValue::Utf8View(Some(v)) => Value::String(v),
        ScalarValue::Date32(Some(days)) => date_from_days(i64::from(days)),
        ScalarValue::Date64(Some(ms)) => timestamp(DateTime::from_timestamp_millis(ms)),
        ScalarValue::TimestampSecond(Some(v), _) => timestamp(DateTime::from_timestamp(v, 0)),
        ScalarValue::TimestampMillisecond(Some(v), _) => {
            timestamp(DateTime::from_timestamp_millis(v))
        }
        ScalarValue::TimestampMicrosecond(Some(v), _) => {
            timestamp(DateTime::from_timestamp_micros(v))
        }
        ScalarValue::TimestampNanosecond(Some(v), _) => {
            timestamp(Some(DateTime::from_timestamp_nanos(v)))
        }
        other => Value::String(other.to_string()),
    }
}

fn date_from_days(days: i64) -> Value {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days)))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| Value::Timestamp(dt.and_utc()))
        .unwrap_or(Value::Null)
}

fn timestamp(value: Option<DateTime<Utc>>) -> Value {
    value.map(Value::Timestamp).unwrap_or(Value::Null)
}
