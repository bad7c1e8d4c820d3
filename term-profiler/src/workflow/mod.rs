//! Run orchestration: one isolated session per table.
//!
//! A run processes the tables of a [`WorkflowConfig`] with bounded concurrency.
//! Each session acquires its own pooled connection, profiles the table,
//! evaluates the table's tests and returns the connection. A failure inside a
//! session becomes that table's [`TableError`]; other sessions are unaffected.
//! Only failing to acquire any connection at all ends the run with an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use datafusion::prelude::SessionContext;
//! use std::sync::Arc;
//! use term_profiler::adapter::DataFusionConnector;
//! use term_profiler::core::{Column, Table};
//! use term_profiler::dialect::ExpressionRegistry;
//! use term_profiler::profiler::{MetricSelection, ProfilerDef};
//! use term_profiler::workflow::{EngineConfig, ProfilerWorkflow, WorkflowConfig};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let connector = Arc::new(DataFusionConnector::new(SessionContext::new()));
//! let workflow = ProfilerWorkflow::new(
//!     connector,
//!     Arc::new(ExpressionRegistry::with_builtins()),
//!     EngineConfig::builder().max_concurrent_sessions(4).build().unwrap(),
//! );
//!
//! let orders = Table::new("orders", vec![Column::new("amount", "numeric(10,2)")]);
//! let config = WorkflowConfig::new(vec![orders])
//!     .with_profiler(ProfilerDef::new("nightly").with_default_selection(MetricSelection::standard()));
//! let result = workflow.run(&config).await.unwrap();
//! println!("{:?}", result.summary());
//! # })
//! ```

mod config;

pub use config::{EngineConfig, EngineConfigBuilder};

use crate::adapter::{ConnectionPool, WarehouseAdapter, WarehouseConnector};
use crate::core::{ProfileAndTests, Table, TableError, WorkflowResult};
use crate::dialect::{Dialect, ExpressionRegistry};
use crate::error::{Result, TermError};
use crate::profiler::{MetricSelection, Profiler, ProfilerDef};
use crate::validation::{TestCase, TestDef, Validator};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// What to run: the tables in scope and the definitions to apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Catalog descriptors, in the order results are reported
    pub tables: Vec<Table>,
    /// Metric selections per table
    #[serde(default)]
    pub profiler: ProfilerDef,
    /// Test cases, if any
    #[serde(default)]
    pub tests: Option<TestDef>,
}

impl WorkflowConfig {
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables,
            ..Default::default()
        }
    }

    pub fn with_profiler(mut self, profiler: ProfilerDef) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_tests(mut self, tests: TestDef) -> Self {
        self.tests = Some(tests);
        self
    }

    /// A table is in scope when the profiler selects it or a test targets it.
    pub fn in_scope(&self, table: &str) -> bool {
        self.profiler.selection_for(table).is_some()
            || self.tests.as_ref().is_some_and(|t| t.targets(table))
    }

    fn tests_for(&self, table: &str) -> Vec<&TestCase> {
        self.tests
            .as_ref()
            .map(|def| def.tests_for(table))
            .unwrap_or_default()
    }
}

type SessionOutcome = std::result::Result<ProfileAndTests, TableError>;

/// Runs profiling and validation across tables.
#[derive(Debug, Clone)]
pub struct ProfilerWorkflow {
    pool: ConnectionPool,
    dialect: Dialect,
    config: EngineConfig,
    profiler: Profiler,
    validator: Validator,
}

impl ProfilerWorkflow {
    /// Creates a workflow over `connector`, speaking the connector's dialect.
    pub fn new(
        connector: Arc<dyn WarehouseConnector>,
        registry: Arc<ExpressionRegistry>,
        config: EngineConfig,
    ) -> Self {
        let dialect = registry.dialect(connector.dialect_name());
        let pool = ConnectionPool::new(
            connector,
            config.max_concurrent_sessions,
            config.acquire_timeout,
            config.retry.clone(),
        );
        let profiler = Profiler::builder()
            .histogram_max_buckets(config.histogram_max_buckets)
            .log_config(config.log_config.clone())
            .build();
        let validator = Validator::new().with_log_config(config.log_config.clone());
        Self {
            pool,
            dialect,
            config,
            profiler,
            validator,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs every in-scope table to completion.
    pub async fn run(&self, workflow: &WorkflowConfig) -> Result<WorkflowResult> {
        let (_stop, shutdown) = watch::channel(false);
        self.run_with_shutdown(workflow, shutdown).await
    }

    /// Runs every in-scope table until `shutdown` turns `true`.
    ///
    /// Sessions in flight when the stop arrives abandon their queries; tables
    /// not yet started are recorded as cancelled. Results and errors keep the
    /// order of `workflow.tables`.
    ///
    /// # Errors
    ///
    /// Fails with [`TermError::ResourceExhausted`] when a session cannot
    /// acquire any connection, and when the engine configuration is invalid.
    #[instrument(skip_all, fields(tables = workflow.tables.len(), dialect = %self.dialect.name()))]
    pub async fn run_with_shutdown(
        &self,
        workflow: &WorkflowConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<WorkflowResult> {
        self.config.validate()?;
        let started = Instant::now();

        let tables: Vec<&Table> = workflow
            .tables
            .iter()
            .filter(|t| workflow.in_scope(&t.name))
            .collect();
        info!(in_scope = tables.len(), "Starting workflow run");

        let outcomes: Vec<SessionOutcome> = stream::iter(tables.into_iter().map(|table| {
            let shutdown = shutdown.clone();
            self.session(workflow, table, shutdown)
        }))
        .buffered(self.config.max_concurrent_sessions.max(1))
        .try_collect()
        .await?;

        let mut result = WorkflowResult::default();
        for outcome in outcomes {
            match outcome {
                Ok(profiled) => result.results.push(profiled),
                Err(error) => result.errors.push(error),
            }
        }

        let summary = result.summary();
        info!(
            profiled = summary.tables_profiled,
            failed = summary.tables_failed,
            cancelled = summary.tables_cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Workflow run finished"
        );
        Ok(result)
    }

    /// One table's unit of work, raced against the stop signal.
    async fn session(
        &self,
        workflow: &WorkflowConfig,
        table: &Table,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SessionOutcome> {
        if *shutdown.borrow() {
            return Ok(Err(cancelled(table, "run stopped before the table started")));
        }

        let outcome = tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown) => {
                warn!(table = %table.name, "Session cancelled");
                Err(TermError::Cancelled("run stopped while the table was in progress".to_string()))
            }
            outcome = self.process(workflow, table) => outcome,
        };

        match outcome {
            Ok(result) => Ok(Ok(result)),
            Err(e @ TermError::ResourceExhausted(_)) => Err(e),
            Err(e) => {
                warn!(table = %table.name, "Table failed: {e}");
                Ok(Err(TableError::from_error(&table.name, &e)))
            }
        }
    }

    #[instrument(skip_all, fields(table = %table.name))]
    async fn process(&self, workflow: &WorkflowConfig, table: &Table) -> Result<ProfileAndTests> {
        let started = Instant::now();
        let profiled_at = Utc::now();

        let connection = self.pool.acquire().await?;
        let mut adapter = WarehouseAdapter::pooled(connection, self.dialect.clone())
            .with_query_timeout(self.config.query_timeout)
            .with_log_config(self.config.log_config.clone());

        let outcome = self.profile_and_validate(&mut adapter, workflow, table).await;
        adapter.release();
        let (profile, tests) = outcome?;

        Ok(ProfileAndTests {
            table: table.clone(),
            profile,
            tests,
            profiled_at,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn profile_and_validate(
        &self,
        adapter: &mut WarehouseAdapter,
        workflow: &WorkflowConfig,
        table: &Table,
    ) -> Result<(crate::core::TableProfile, Vec<crate::core::TestCaseResult>)> {
        let empty = MetricSelection::default();
        let selection = workflow.profiler.selection_for(&table.name).unwrap_or(&empty);
        let profile = self.profiler.profile(adapter, table, selection).await?;

        let tests = workflow.tests_for(&table.name);
        let results = self
            .validator
            .evaluate(&tests, table, &profile, adapter)
            .await?;
        Ok((profile, results))
    }
}

fn cancelled(table: &Table, reason: &str) -> TableError {
    TableError::from_error(&table.name, &TermError::Cancelled(reason.to_string()))
}

/// Resolves once the stop flag is set. Never resolves if the sender is gone
/// without having set it.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
