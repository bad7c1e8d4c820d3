//! Test outcomes and per-table / per-run results.

use crate::core::{MetricValue, Table, TableProfile};
use crate::error::{ErrorKind, TermError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of evaluating one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// The assertion holds
    Pass,
    /// The assertion does not hold
    Fail,
    /// The truth of the assertion could not be determined
    Aborted,
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, TestOutcome::Fail)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, TestOutcome::Aborted)
    }
}

/// Where the evidence for a test outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationPath {
    /// Values already present in the table profile
    Profile,
    /// The catalog's table descriptor
    Catalog,
    /// A dedicated query against the warehouse
    Query,
}

/// The result of evaluating one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Name of the test case in the originating test definition
    pub name: String,
    /// Table the test targets
    pub table: String,
    /// Column the test targets, if any
    pub column: Option<String>,
    /// Test kind name
    pub kind: String,
    /// Outcome of the evaluation
    pub outcome: TestOutcome,
    /// Observed value backing the outcome
    pub observed: Option<MetricValue>,
    /// Failure or abort message
    pub message: Option<String>,
    /// Where the evidence came from
    pub path: EvaluationPath,
}

/// Identity of a test case, carried into its result.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub name: String,
    pub table: String,
    pub column: Option<String>,
    pub kind: &'static str,
}

impl TestCaseResult {
    /// Creates a passing result.
    pub fn pass(id: &TestIdentity, path: EvaluationPath, observed: MetricValue) -> Self {
        Self::with_outcome(id, TestOutcome::Pass, path, Some(observed), None)
    }

    /// Creates a failing result.
    pub fn fail(
        id: &TestIdentity,
        path: EvaluationPath,
        observed: MetricValue,
        message: impl Into<String>,
    ) -> Self {
        Self::with_outcome(
            id,
            TestOutcome::Fail,
            path,
            Some(observed),
            Some(message.into()),
        )
    }

    /// Creates an aborted result from the error that prevented evaluation.
    pub fn aborted(id: &TestIdentity, path: EvaluationPath, error: &TermError) -> Self {
        Self::with_outcome(id, TestOutcome::Aborted, path, None, Some(error.to_string()))
    }

    fn with_outcome(
        id: &TestIdentity,
        outcome: TestOutcome,
        path: EvaluationPath,
        observed: Option<MetricValue>,
        message: Option<String>,
    ) -> Self {
        Self {
            name: id.name.clone(),
            table: id.table.clone(),
            column: id.column.clone(),
            kind: id.kind.to_string(),
            outcome,
            observed,
            message,
            path,
        }
    }
}

/// Profile and test results for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAndTests {
    /// Snapshot of the table descriptor the session worked from
    pub table: Table,
    /// The computed profile
    pub profile: TableProfile,
    /// Test results in test-definition order
    pub tests: Vec<TestCaseResult>,
    /// When the session started
    pub profiled_at: DateTime<Utc>,
    /// Wall time of the session in milliseconds
    pub duration_ms: u64,
}

/// A table that produced no profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableError {
    /// Table identifier
    pub table: String,
    /// Error classification; `cancellation` for tables stopped by a shutdown
    pub kind: ErrorKind,
    /// Human-readable cause
    pub message: String,
}

impl TableError {
    pub fn from_error(table: impl Into<String>, error: &TermError) -> Self {
        Self {
            table: table.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancellation
    }
}

/// Counters summarising a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub tables_profiled: usize,
    pub tables_failed: usize,
    pub tables_cancelled: usize,
    pub metric_failures: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_aborted: usize,
}

/// The result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Per-table results in input order
    pub results: Vec<ProfileAndTests>,
    /// Tables that could not be profiled, in input order
    pub errors: Vec<TableError>,
}

impl WorkflowResult {
    /// Looks up the result of a table.
    pub fn result_for(&self, table: &str) -> Option<&ProfileAndTests> {
        self.results.iter().find(|r| r.table.name == table)
    }

    /// Looks up the error record of a table.
    pub fn error_for(&self, table: &str) -> Option<&TableError> {
        self.errors.iter().find(|e| e.table == table)
    }

    /// Computes summary counters.
    pub fn summary(&self) -> WorkflowSummary {
        let mut summary = WorkflowSummary {
            tables_profiled: self.results.len(),
            ..Default::default()
        };
        for error in &self.errors {
            if error.is_cancelled() {
                summary.tables_cancelled += 1;
            } else {
                summary.tables_failed += 1;
            }
        }
        for result in &self.results {
            summary.metric_failures += result.profile.failures.len();
            for test in &result.tests {
                match test.outcome {
                    TestOutcome::Pass => summary.tests_passed += 1,
                    TestOutcome::Fail => summary.tests_failed += 1,
                    TestOutcome::Aborted => summary.tests_aborted += 1,
                }
            }
        }
        summary
    }

    /// Returns true when every table was profiled and no test failed or aborted.
    pub fn is_clean(&self) -> bool {
        let summary = self.summary();
        self.errors.is_empty()
            && summary.metric_failures == 0
            && summary.tests_failed == 0
            && summary.tests_aborted == 0
    }
}
