//! PostgreSQL and Redshift backend over `tokio-postgres`.

use super::{QueryResult, WarehouseConnection, WarehouseConnector};
use crate::core::Value;
use crate::error::{QueryErrorKind, Result, TermError};
use crate::security::SecureString;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{CancelToken, Client, NoTls, Row};
use tracing::{error, instrument};

/// Connection settings for a PostgreSQL-compatible warehouse.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: SecureString,
    /// Dialect spoken by the server, `postgres` or `redshift`
    pub dialect: String,
    pub application_name: Option<String>,
}

impl PostgresConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<SecureString>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            dialect: "postgres".to_string(),
            application_name: Some("term-profiler".to_string()),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Targets Amazon Redshift.
    pub fn redshift(mut self) -> Self {
        self.dialect = "redshift".to_string();
        if self.port == 5432 {
            self.port = 5439;
        }
        self
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(self.password.expose());
        if let Some(name) = &self.application_name {
            config.application_name(name);
        }
        config
    }
}

/// Opens `tokio-postgres` connections.
pub struct PostgresConnector {
    config: PostgresConfig,
    name: String,
}

impl PostgresConnector {
    pub fn new(config: PostgresConfig) -> Self {
        let name = format!("{}@{}:{}", config.dialect, config.host, config.port);
        Self { config, name }
    }
}

#[async_trait]
impl WarehouseConnector for PostgresConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn dialect_name(&self) -> &str {
        &self.config.dialect
    }

    #[instrument(skip(self), fields(warehouse = %self.name))]
    async fn connect(&self) -> Result<Box<dyn WarehouseConnection>> {
        let (client, connection) = self
            .config
            .pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| {
                TermError::connection_with_source(
                    self.name.clone(),
                    format!("failed to connect to database '{}'", self.config.database),
                    Box::new(e),
                )
            })?;

        let name = self.name.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(warehouse = %name, "PostgreSQL connection error: {e}");
            }
        });

        let cancel_token = client.cancel_token();
        Ok(Box::new(PostgresConnection {
            client,
            cancel_token,
            dialect: self.config.dialect.clone(),
        }))
    }
}

struct PostgresConnection {
    client: Client,
    cancel_token: CancelToken,
    dialect: String,
}

#[async_trait]
impl WarehouseConnection for PostgresConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if self.client.is_closed() {
            return Err(TermError::query(
                QueryErrorKind::ConnectionLost,
                "connection is closed",
            ));
        }

        let bound: Vec<Box<dyn ToSql + Sync + Send>> = params.iter().map(to_sql).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let statement = self.client.prepare(sql).await.map_err(classify)?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = self.client.query(&statement, &refs).await.map_err(classify)?;

        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult { columns, rows })
    }

    fn supports_cancellation(&self) -> bool {
        true
    }

    async fn cancel(&mut self) -> Result<()> {
        self.cancel_token
            .cancel_query(NoTls)
            .await
            .map_err(|e| TermError::query(QueryErrorKind::ConnectionLost, e.to_string()))
    }

    fn dialect_name(&self) -> &str {
        &self.dialect
    }
}

fn to_sql(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Boolean(v) => Box::new(*v),
        Value::Integer(v) => Box::new(*v),
        Value::Float(v) => Box::new(*v),
        Value::String(v) => Box::new(v.clone()),
        Value::Timestamp(v) => Box::new(*v),
    }
}

fn decode_row(row: &Row) -> Result<Vec<Value>> {
    (0..row.len()).map(|i| decode(row, i)).collect()
}

fn decode(row: &Row, index: usize) -> Result<Value> {
    let ty = row.columns()[index].type_();
    let value = if *ty == Type::BOOL {
        get::<bool>(row, index)?.map(Value::Boolean)
    } else if *ty == Type::INT2 {
        get::<i16>(row, index)?.map(|v| Value::Integer(v.into()))
    } else if *ty == Type::INT4 {
        get::<i32>(row, index)?.map(|v| Value::Integer(v.into()))
    } else if *ty == Type::INT8 {
        get::<i64>(row, index)?.map(Value::Integer)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, index)?.map(|v| Value::Float(v.into()))
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, index)?.map(Value::Float)
    } else if *ty == Type::NUMERIC {
        get::<Decimal>(row, index)?.map(numeric_value).transpose()?
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        get::<String>(row, index)?.map(Value::String)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, index)?.map(Value::Timestamp)
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, index)?.map(|v| Value::Timestamp(v.and_utc()))
    } else if *ty == Type::DATE {
        get::<NaiveDate>(row, index)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|v| Value::Timestamp(v.and_utc()))
    } else {
        return Err(TermError::query(
            QueryErrorKind::Execution,
            format!(
                "unsupported result type '{ty}' for column '{}'; cast it in the expression template",
                row.columns()[index].name()
            ),
        ));
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Integral numerics stay exact; anything with a fraction becomes a float.
fn numeric_value(decimal: Decimal) -> Result<Value> {
    let converted = if decimal.fract().is_zero() {
        decimal.to_i64().map(Value::Integer)
    } else {
        None
    };
    converted
        .or_else(|| decimal.to_f64().map(Value::Float))
        .ok_or_else(|| {
            TermError::query(
                QueryErrorKind::Execution,
                format!("numeric value {decimal} does not fit a float"),
            )
        })
}

fn get<'a, T>(row: &'a Row, index: usize) -> Result<Option<T>>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(index)
        .map_err(|e| TermError::query(QueryErrorKind::Execution, e.to_string()))
}

fn classify(error: tokio_postgres::Error) -> TermError {
    if error.is_closed() {
        return TermError::query(QueryErrorKind::ConnectionLost, error.to_string());
    }
    let kind = match error.code() {
        Some(code) if *code == SqlState::INSUFFICIENT_PRIVILEGE => QueryErrorKind::PermissionDenied,
        Some(code) if *code == SqlState::QUERY_CANCELED => QueryErrorKind::Timeout,
        Some(code) if code.code().starts_with("42") => QueryErrorKind::Syntax,
        Some(code) if code.code().starts_with("08") => QueryErrorKind::ConnectionLost,
        _ => QueryErrorKind::Execution,
    };
    let message = match error.as_db_error() {
        Some(db) => db.message().to_string(),
        None => error.to_string(),
    };
    TermError::query(kind, message)
}
