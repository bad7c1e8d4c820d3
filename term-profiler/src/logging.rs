//! Logging utilities and configuration for the profiling engine.
//!
//! The engine logs through `tracing`. Sessions, profiles and queries open spans via
//! `#[instrument]`; [`LogConfig`] decides how chatty the per-query events are and how
//! much SQL text ends up in a log line.

use tracing::Level;

/// Logging configuration for the engine.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for engine components
    pub base_level: Level,
    /// Whether to log the SQL text of every query
    pub log_query_text: bool,
    /// Whether to log per-metric and per-test outcomes
    pub log_outcomes: bool,
    /// Maximum length for logged field values (SQL text, messages)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_query_text: false,
            log_outcomes: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_query_text: true,
            log_outcomes: true,
            max_field_length: 2048,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_query_text: false,
            log_outcomes: false,
            max_field_length: 128,
        }
    }

    /// Creates a balanced configuration suitable for most use cases.
    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Logs the SQL text of a query at debug level when query logging is enabled.
#[macro_export]
macro_rules! log_query {
    ($config:expr, $sql:expr, $($arg:tt)*) => {
        if $config.log_query_text {
            tracing::debug!(
                sql = %$crate::logging::truncate_field($sql, $config.max_field_length),
                $($arg)*
            );
        }
    };
}

/// Macro for conditional outcome logging.
#[macro_export]
macro_rules! log_outcome {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_outcomes {
            tracing::debug!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
///
/// Truncation never splits a UTF-8 character.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Process-wide subscriber installation for binaries and tests that embed the
/// engine. The library itself never installs a subscriber.
pub mod setup {
    use super::LogConfig;
    use crate::error::{Result, TermError};
    use tracing::Level;

    /// Output format of the installed subscriber.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub enum LogFormat {
        #[default]
        Text,
        Json,
    }

    /// Filter directive derived from an engine [`LogConfig`].
    ///
    /// Dependencies stay at `warn`. Query text is logged at `debug` by the
    /// adapter, so enabling it lowers the adapter's level to `debug` even when
    /// the engine runs at a quieter base level.
    pub fn filter_directive(config: &LogConfig) -> String {
        let mut directive = format!(
            "warn,term_profiler={}",
            config.base_level.as_str().to_lowercase()
        );
        if config.log_query_text && config.base_level < Level::DEBUG {
            directive.push_str(",term_profiler::adapter=debug");
        }
        directive
    }

    /// Installs a `tracing-subscriber` registry for `config`.
    ///
    /// `RUST_LOG` wins over the derived directive when it is set. Session and
    /// profile spans report their duration when they close.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_profiler::logging::setup::{init_logging, LogFormat};
    /// use term_profiler::logging::LogConfig;
    ///
    /// init_logging(&LogConfig::verbose(), LogFormat::Json).unwrap();
    /// ```
    pub fn init_logging(config: &LogConfig, format: LogFormat) -> Result<()> {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

        let fmt_layer = match format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TermError::Configuration(format!("cannot install logging: {e}")))
    }
}
