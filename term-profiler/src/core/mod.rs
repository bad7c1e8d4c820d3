//! Core data model of the profiling engine.
//!
//! ```text
//! WorkflowResult
//!     ├── ProfileAndTests (one per table)
//!     │   ├── Table          (catalog snapshot)
//!     │   ├── TableProfile   (requested metrics only)
//!     │   └── TestCaseResult (test-definition order)
//!     └── TableError         (tables with no profile, including cancelled ones)
//! ```
//!
//! Table and column descriptors come from the catalog and are never mutated.
//! Profiles are built once per table per run and are immutable afterwards.

mod profile;
mod result;
mod table;
mod value;

pub use profile::{ColumnProfile, MetricFailure, TableProfile};
pub use result::{
    EvaluationPath, ProfileAndTests, TableError, TestCaseResult, TestIdentity, TestOutcome,
    WorkflowResult, WorkflowSummary,
};
pub use table::{Column, ColumnCategory, Table};
pub use value::{HistogramBucket, MetricValue, Value};
