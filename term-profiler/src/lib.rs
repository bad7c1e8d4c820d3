//! # Term Profiler - Warehouse Profiling and Data-Quality Testing
//!
//! Term Profiler computes statistical profiles of warehouse tables and evaluates
//! declarative data-quality tests against them. Every SQL fragment goes through a
//! dialect expression registry, so the same profiler and test definitions run
//! against DataFusion, PostgreSQL, Redshift, MySQL, Snowflake or BigQuery.
//!
//! ## Quick Start
//!
//! ```rust
//! use datafusion::prelude::SessionContext;
//! use std::sync::Arc;
//! use term_profiler::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! // Any warehouse connector; here an in-memory DataFusion context
//! let ctx = SessionContext::new();
//! ctx.sql("CREATE TABLE numbers (value BIGINT) AS VALUES (1), (2), (NULL), (4)")
//!     .await?
//!     .collect()
//!     .await?;
//! let connector = Arc::new(DataFusionConnector::new(ctx));
//! let numbers = Table::new("numbers", vec![Column::new("value", "bigint")]);
//!
//! let workflow = ProfilerWorkflow::new(
//!     connector,
//!     Arc::new(ExpressionRegistry::with_builtins()),
//!     EngineConfig::builder().max_concurrent_sessions(4).build()?,
//! );
//!
//! let config = WorkflowConfig::new(vec![numbers])
//!     .with_profiler(ProfilerDef::new("nightly").with_default_selection(MetricSelection::standard()))
//!     .with_tests(TestDef::new("checks").with_test(TestCase::new(
//!         "has_rows",
//!         "numbers",
//!         TestKind::RowCountBetween { min: Some(1), max: None },
//!     )));
//!
//! let result = workflow.run(&config).await?;
//! println!("{}", HumanFormatter::new().format(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`dialect`**: Expression templates per warehouse dialect, with defaults and
//!   named overrides
//! - **`adapter`**: Connections, parameter binding, timeouts and the connection
//!   pool
//! - **`profiler`**: Metric catalogue and the batched profiling queries
//! - **`validation`**: Test definitions and their evaluation against profiles or
//!   live queries
//! - **`workflow`**: Per-table sessions with bounded concurrency and cancellation
//! - **`core`**: Descriptors, profiles and results
//! - **`formatters`**: JSON and console rendering of results
//!
//! ## Feature Flags
//!
//! - `postgres`: native PostgreSQL / Redshift connector over `tokio-postgres`
//! - `test-utils`: in-memory fixtures and a fault-injecting connector

pub mod adapter;
pub mod core;
pub mod dialect;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod profiler;
pub mod security;
pub mod validation;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
