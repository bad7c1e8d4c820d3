//! Error types for the Term profiling engine.
//!
//! Every failure the engine can observe is a [`TermError`]. The variants follow the
//! engine's error taxonomy: configuration problems, connection problems, query
//! problems, cancellation and resource exhaustion. [`TermError::kind`] collapses a
//! concrete error into its [`ErrorKind`] so that it can be recorded inside profiles,
//! test results and per-table error records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of an error, recorded in results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown metric or test kind, unsupported dialect expression, bad parameters.
    Configuration,
    /// Warehouse unreachable, authentication failure or connection lost.
    Connection,
    /// Syntax, permission or timeout failure of a single query.
    Query,
    /// The run was stopped before or while this work was running.
    Cancellation,
    /// No connection could be acquired at all.
    ResourceExhausted,
    /// Anything else.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::Query => "query",
            ErrorKind::Cancellation => "cancellation",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Why a single query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    /// The statement could not be parsed or planned.
    Syntax,
    /// The connection's role may not read the object.
    PermissionDenied,
    /// The query exceeded the configured timeout.
    Timeout,
    /// The connection dropped while the query was running.
    ConnectionLost,
    /// The warehouse failed while executing a valid statement.
    Execution,
}

impl std::fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryErrorKind::Syntax => "syntax error",
            QueryErrorKind::PermissionDenied => "permission denied",
            QueryErrorKind::Timeout => "query timeout",
            QueryErrorKind::ConnectionLost => "connection lost",
            QueryErrorKind::Execution => "execution error",
        };
        f.write_str(name)
    }
}

/// The main error type for the Term profiling engine.
#[derive(Error, Debug)]
pub enum TermError {
    /// The dialect has no template for the requested expression and no default exists.
    #[error("Expression '{kind}' is not supported by dialect '{dialect}'")]
    UnsupportedExpression {
        /// Name of the expression kind
        kind: String,
        /// Name of the dialect the lookup ran against
        dialect: String,
    },

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The warehouse could not be reached or refused the connection.
    #[error("Connection error ({warehouse}): {message}")]
    Connection {
        /// Name of the connector that failed
        warehouse: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single query failed.
    #[error("Query failed ({kind}): {message}")]
    Query {
        /// Classification of the failure
        kind: QueryErrorKind,
        /// Detailed error message
        message: String,
    },

    /// The run was cancelled.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// No connection could be acquired for the run.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates an unsupported expression error.
    pub fn unsupported_expression(kind: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self::UnsupportedExpression {
            kind: kind.into(),
            dialect: dialect.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(warehouse: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            warehouse: warehouse.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection error with a source error.
    pub fn connection_with_source(
        warehouse: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Connection {
            warehouse: warehouse.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a query error.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self::Query {
            kind,
            message: message.into(),
        }
    }

    /// Classifies this error into the engine taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TermError::UnsupportedExpression { .. }
            | TermError::Configuration(_)
            | TermError::SecurityError(_) => ErrorKind::Configuration,
            TermError::Connection { .. } => ErrorKind::Connection,
            TermError::Query {
                kind: QueryErrorKind::ConnectionLost,
                ..
            } => ErrorKind::Connection,
            TermError::Query { .. } | TermError::DataFusion(_) | TermError::Arrow(_) => {
                ErrorKind::Query
            }
            TermError::Cancelled(_) => ErrorKind::Cancellation,
            TermError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            TermError::Serialization(_) | TermError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true when the error ends the whole table session instead of a
    /// single metric or test.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Cancellation | ErrorKind::ResourceExhausted
        )
    }

    /// Returns true when retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TermError::Connection { .. })
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            TermError::Configuration(inner) => TermError::Configuration(format!("{}: {inner}", f())),
            TermError::Query { kind, message } => TermError::Query {
                kind,
                message: format!("{}: {message}", f()),
            },
            TermError::Internal(inner) => TermError::Internal(format!("{}: {inner}", f())),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_unsupported_expression_names_kind_and_dialect() {
        let err = TermError::unsupported_expression("regex_match", "ansi");
        assert_eq!(
            err.to_string(),
            "Expression 'regex_match' is not supported by dialect 'ansi'"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_connection_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TermError::connection_with_source("postgres", "cannot connect", Box::new(source));
        assert!(err.source().is_some());
        assert!(err.is_retryable());
        assert!(err.is_session_fatal());
    }

    #[test]
    fn test_query_error_classification() {
        let timeout = TermError::query(QueryErrorKind::Timeout, "exceeded 30s");
        assert_eq!(timeout.kind(), ErrorKind::Query);
        assert!(!timeout.is_session_fatal());
        assert_eq!(timeout.to_string(), "Query failed (query timeout): exceeded 30s");

        let lost = TermError::query(QueryErrorKind::ConnectionLost, "socket closed");
        assert_eq!(lost.kind(), ErrorKind::Connection);
        assert!(lost.is_session_fatal());
    }

    #[test]
    fn test_cancellation_is_session_fatal() {
        let err = TermError::Cancelled("stop requested".to_string());
        assert_eq!(err.kind(), ErrorKind::Cancellation);
        assert!(err.is_session_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_context_keeps_query_kind() {
        let result: Result<()> = Err(TermError::query(QueryErrorKind::Syntax, "bad token"));
        let err = result.context("profiling column 'age'").unwrap_err();
        match err {
            TermError::Query { kind, message } => {
                assert_eq!(kind, QueryErrorKind::Syntax);
                assert_eq!(message, "profiling column 'age': bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ResourceExhausted).unwrap();
        assert_eq!(json, "\"resource_exhausted\"");
    }
}
