//! Prelude for commonly used types and traits in term-profiler.

pub use crate::adapter::{
    ConnectionPool, DataFusionConnector, RetryPolicy, WarehouseAdapter, WarehouseConnection,
    WarehouseConnector,
};
pub use crate::core::{
    Column, ColumnCategory, MetricValue, ProfileAndTests, Table, TableError, TableProfile,
    TestCaseResult, TestOutcome, Value, WorkflowResult,
};
pub use crate::dialect::{Dialect, DialectDefinition, ExpressionKind, ExpressionRegistry};
pub use crate::error::{ErrorContext, ErrorKind, Result, TermError};
pub use crate::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ResultFormatter};
pub use crate::logging::LogConfig;
pub use crate::profiler::{Metric, MetricSelection, Profiler, ProfilerDef};
pub use crate::validation::{TestCase, TestDef, TestKind, Validator};
pub use crate::workflow::{EngineConfig, ProfilerWorkflow, WorkflowConfig};
