//! Bounded connection pool with connect retries.

use super::{WarehouseConnection, WarehouseConnector};
use crate::error::{Result, TermError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

/// Bounded exponential backoff for connection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total connection attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay, before jitter
    pub max_delay: Duration,
    /// Add up to half of `base_delay` of random jitter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// `base_delay * 2^retry`, with the exponent capped at 10, then capped at
    /// `max_delay`, plus jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(10);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if !self.jitter {
            return delay;
        }
        let jitter_cap = (self.base_delay.as_millis() as u64 / 2).max(1);
        let jitter_ms = rand::rng().random_range(0..jitter_cap);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Counters kept by a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections opened
    pub opened: u64,
    /// Acquisitions served from the idle set
    pub reused: u64,
    /// Connections thrown away instead of being reused
    pub discarded: u64,
    /// Failed connection attempts that were retried
    pub connect_retries: u64,
}

#[derive(Default)]
struct Counters {
    opened: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
    connect_retries: AtomicU64,
}

struct PoolShared {
    idle: Mutex<Vec<Box<dyn WarehouseConnection>>>,
    counters: Counters,
}

impl PoolShared {
    fn take_idle(&self) -> Option<Box<dyn WarehouseConnection>> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }

    fn put_idle(&self, connection: Box<dyn WarehouseConnection>) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push(connection),
            Err(_) => self.discard(),
        }
    }

    fn discard(&self) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// A pool of warehouse connections.
///
/// At most `max_size` connections are checked out at once. Returned connections
/// are reused; poisoned connections and connections whose holder was dropped
/// without returning them are discarded.
#[derive(Clone)]
pub struct ConnectionPool {
    connector: Arc<dyn WarehouseConnector>,
    semaphore: Arc<Semaphore>,
    shared: Arc<PoolShared>,
    max_size: usize,
    acquire_timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connector", &self.connector.name())
            .field("max_size", &self.max_size)
            .field("available", &self.semaphore.available_permits())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionPool {
    pub fn new(
        connector: Arc<dyn WarehouseConnector>,
        max_size: usize,
        acquire_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let max_size = max_size.max(1);
        Self {
            connector,
            semaphore: Arc::new(Semaphore::new(max_size)),
            shared: Arc::new(PoolShared {
                idle: Mutex::new(Vec::new()),
                counters: Counters::default(),
            }),
            max_size,
            acquire_timeout,
            retry,
        }
    }

    pub fn connector(&self) -> &Arc<dyn WarehouseConnector> {
        &self.connector
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of idle connections ready for reuse.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            opened: c.opened.load(Ordering::Relaxed),
            reused: c.reused.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            connect_retries: c.connect_retries.load(Ordering::Relaxed),
        }
    }

    /// Checks out a connection.
    ///
    /// Fails with [`TermError::ResourceExhausted`] when no slot frees up within
    /// the acquire timeout, and with a connection error when the warehouse
    /// cannot be reached after every retry.
    #[instrument(skip(self), fields(warehouse = %self.connector.name()))]
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let permit = tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        .map_err(|_| {
            TermError::ResourceExhausted(format!(
                "no connection to '{}' available within {:?}",
                self.connector.name(),
                self.acquire_timeout
            ))
        })?
        .map_err(|_| TermError::ResourceExhausted("connection pool is closed".to_string()))?;

        let connection = match self.shared.take_idle() {
            Some(connection) => {
                self.shared.counters.reused.fetch_add(1, Ordering::Relaxed);
                debug!("Reusing idle connection");
                connection
            }
            None => self.connect_with_retry().await?,
        };

        Ok(PooledConnection {
            connection: Some(connection),
            shared: Arc::clone(&self.shared),
            poisoned: false,
            _permit: permit,
        })
    }

    async fn connect_with_retry(&self) -> Result<Box<dyn WarehouseConnection>> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.connector.connect().await {
                Ok(connection) => {
                    self.shared.counters.opened.fetch_add(1, Ordering::Relaxed);
                    return Ok(connection);
                }
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Connection attempt {} to '{}' failed, retrying in {:?}: {}",
                        attempt + 1,
                        self.connector.name(),
                        delay,
                        e
                    );
                    self.shared
                        .counters
                        .connect_retries
                        .fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Call [`release`](Self::release) to hand the connection back. Dropping it
/// without releasing, or after [`poison`](Self::poison), discards it.
pub struct PooledConnection {
    connection: Option<Box<dyn WarehouseConnection>>,
    shared: Arc<PoolShared>,
    poisoned: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Marks the connection as unfit for reuse.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The underlying connection.
    ///
    /// # Errors
    ///
    /// Fails only after the connection was released, which `release` prevents
    /// by taking `self`.
    pub fn connection(&mut self) -> Result<&mut dyn WarehouseConnection> {
        match self.connection.as_mut() {
            Some(connection) => Ok(connection.as_mut()),
            None => Err(TermError::Internal(
                "pooled connection used after release".to_string(),
            )),
        }
    }

    /// Returns the connection to the pool, or discards it when poisoned.
    pub fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            if self.poisoned {
                self.shared.discard();
            } else {
                self.shared.put_idle(connection);
            }
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.connection.take().is_some() {
            self.shared.discard();
        }
    }
}
