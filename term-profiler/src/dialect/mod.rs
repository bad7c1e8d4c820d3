//! Dialect expression registry.
//!
//! Every SQL fragment the profiler and validator emit is requested by
//! [`ExpressionKind`] and rendered from a [`Template`]. A dialect may override
//! any subset of the default templates; lookup falls back to the default, and a
//! kind with neither fails with [`TermError::UnsupportedExpression`]. Unknown
//! dialect names resolve to the defaults alone.
//!
//! | Dialect | Regex match | Case | Placeholders |
//! |---|---|---|---|
//! | `datafusion` | `{0} ~ {1}` | sensitive | `$n` |
//! | `postgres` | `{0} ~ {1}` | sensitive | `$n` |
//! | `redshift` | `{0} ~* {1}` | insensitive | `$n` |
//! | `mysql` | `{0} REGEXP {1}` | insensitive | `?` |
//! | `snowflake` | `REGEXP_LIKE({0}, {1})` | sensitive, full match | `?` |
//! | `bigquery` | `REGEXP_CONTAINS({0}, {1})` | sensitive | `?` |
//!
//! [`TermError::UnsupportedExpression`]: crate::error::TermError::UnsupportedExpression

mod builtin;
mod registry;

pub use registry::{
    CaseSensitivity, Dialect, DialectDefinition, ExpressionKind, ExpressionRegistry,
    PlaceholderStyle, Template,
};
