//! Engine settings shared by every session of a run.

use crate::adapter::RetryPolicy;
use crate::error::{Result, TermError};
use crate::logging::LogConfig;
use std::time::Duration;

/// Settings for [`ProfilerWorkflow`](super::ProfilerWorkflow).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of tables processed at once, each on its own connection
    pub max_concurrent_sessions: usize,
    /// Timeout applied to every query
    pub query_timeout: Duration,
    /// How long a session waits for a free connection
    pub acquire_timeout: Duration,
    /// Backoff for failed connection attempts
    pub retry: RetryPolicy,
    /// Maximum number of histogram buckets
    pub histogram_max_buckets: usize,
    /// Logging behaviour of sessions
    pub log_config: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: num_cpus::get(),
            query_timeout: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            histogram_max_buckets: 10,
            log_config: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Rejects settings under which no work could complete.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_sessions == 0 {
            return Err(TermError::Configuration(
                "max_concurrent_sessions must be at least 1".to_string(),
            ));
        }
        if self.query_timeout.is_zero() {
            return Err(TermError::Configuration(
                "query_timeout must be greater than zero".to_string(),
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(TermError::Configuration(
                "acquire_timeout must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(TermError::Configuration(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(TermError::Configuration(format!(
                "retry base delay {:?} exceeds max delay {:?}",
                self.retry.base_delay, self.retry.max_delay
            )));
        }
        if self.histogram_max_buckets == 0 {
            return Err(TermError::Configuration(
                "histogram_max_buckets must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the maximum number of concurrent table sessions
    pub fn max_concurrent_sessions(mut self, sessions: usize) -> Self {
        self.config.max_concurrent_sessions = sessions;
        self
    }

    /// Set the per-query timeout
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    /// Set how long to wait for a pooled connection
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Set the connection retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the histogram bucket limit
    pub fn histogram_max_buckets(mut self, buckets: usize) -> Self {
        self.config.histogram_max_buckets = buckets;
        self
    }

    /// Set the logging configuration
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.config.log_config = config;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_sessions, num_cpus::get());
    }

    #[test]
    fn test_builder_rejects_zero_values() {
        assert!(EngineConfig::builder()
            .max_concurrent_sessions(0)
            .build()
            .is_err());
        assert!(EngineConfig::builder()
            .query_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(EngineConfig::builder()
            .retry(RetryPolicy {
                max_attempts: 0,
                ..Default::default()
            })
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = EngineConfig::builder()
            .max_concurrent_sessions(2)
            .query_timeout(Duration::from_secs(5))
            .retry(RetryPolicy::no_retry())
            .histogram_max_buckets(3)
            .build()
            .unwrap();
        assert_eq!(config.max_concurrent_sessions, 2);
        assert_eq!(config.query_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.histogram_max_buckets, 3);
    }
}
