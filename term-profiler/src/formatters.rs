//! Rendering of workflow results for downstream consumers.
//!
//! # Examples
//!
//! ```rust
//! use term_profiler::core::WorkflowResult;
//! use term_profiler::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ResultFormatter};
//!
//! let result = WorkflowResult::default();
//! let json = JsonFormatter::new().with_pretty(false).format(&result).unwrap();
//! assert_eq!(json, r#"{"results":[],"errors":[]}"#);
//!
//! let text = HumanFormatter::with_config(FormatterConfig::minimal())
//!     .format(&result)
//!     .unwrap();
//! assert!(text.contains("Tables profiled: 0"));
//! ```

use crate::core::{ProfileAndTests, TestCaseResult, TestOutcome, WorkflowResult};
use crate::error::{Result, TermError};
use serde::Serialize;
use std::fmt::Write;

/// Options controlling how much of a result is rendered.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include computed profiles
    pub include_profiles: bool,
    /// Include tests that passed
    pub include_passing_tests: bool,
    /// Maximum number of test results shown per table, `None` for all
    pub max_tests: Option<usize>,
    /// Use ANSI colors (human formatter)
    pub use_colors: bool,
    /// Include session timestamps and durations
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_profiles: true,
            include_passing_tests: true,
            max_tests: None,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Summary and table errors only.
    pub fn minimal() -> Self {
        Self {
            include_profiles: false,
            include_passing_tests: false,
            max_tests: Some(0),
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Everything.
    pub fn detailed() -> Self {
        Self::default()
    }

    /// Failures only, bounded, without colors.
    pub fn ci() -> Self {
        Self {
            include_profiles: false,
            include_passing_tests: false,
            max_tests: Some(50),
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_profiles(mut self, include: bool) -> Self {
        self.include_profiles = include;
        self
    }

    pub fn with_passing_tests(mut self, include: bool) -> Self {
        self.include_passing_tests = include;
        self
    }

    pub fn with_max_tests(mut self, max: usize) -> Self {
        self.max_tests = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Test results of a table that pass the filters, and how many were cut.
    fn visible_tests<'a>(&self, tests: &'a [TestCaseResult]) -> (Vec<&'a TestCaseResult>, usize) {
        let shown: Vec<&TestCaseResult> = tests
            .iter()
            .filter(|t| self.include_passing_tests || !t.outcome.is_pass())
            .collect();
        match self.max_tests {
            Some(max) if shown.len() > max => {
                let hidden = shown.len() - max;
                (shown.into_iter().take(max).collect(), hidden)
            }
            _ => (shown, 0),
        }
    }
}

/// Converts a [`WorkflowResult`] into a textual representation.
pub trait ResultFormatter {
    /// Formats a workflow result.
    fn format(&self, result: &WorkflowResult) -> Result<String>;

    /// Formats a workflow result with explicit options.
    fn format_with_config(&self, result: &WorkflowResult, _config: &FormatterConfig) -> Result<String> {
        self.format(result)
    }
}

/// Renders results as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct FilteredTable<'a> {
    table: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a crate::core::TableProfile>,
    tests: Vec<&'a TestCaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profiled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
}

#[derive(Serialize)]
struct FilteredResult<'a> {
    summary: crate::core::WorkflowSummary,
    results: Vec<FilteredTable<'a>>,
    errors: &'a [crate::core::TableError],
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, result: &WorkflowResult) -> Result<String> {
        // Unfiltered output is the result itself, so it can be read back
        if self.config.include_profiles
            && self.config.include_passing_tests
            && self.config.max_tests.is_none()
            && self.config.include_timestamps
        {
            return to_json(result, self.pretty);
        }
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(&self, result: &WorkflowResult, config: &FormatterConfig) -> Result<String> {
        let filtered = FilteredResult {
            summary: result.summary(),
            results: result
                .results
                .iter()
                .map(|table| filter_table(table, config))
                .collect(),
            errors: &result.errors,
        };
        to_json(&filtered, self.pretty)
    }
}

fn filter_table<'a>(table: &'a ProfileAndTests, config: &FormatterConfig) -> FilteredTable<'a> {
    let (tests, _) = config.visible_tests(&table.tests);
    FilteredTable {
        table: &table.table.name,
        profile: config.include_profiles.then_some(&table.profile),
        tests,
        profiled_at: config
            .include_timestamps
            .then(|| table.profiled_at.to_rfc3339()),
        duration_ms: config.include_timestamps.then_some(table.duration_ms),
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.map_err(|e| TermError::Serialization(format!("Failed to serialize result to JSON: {e}")))
}

/// Renders results as console text.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, result: &WorkflowResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(&self, result: &WorkflowResult, config: &FormatterConfig) -> Result<String> {
        let mut output = String::new();
        render_human(&mut output, result, config)
            .map_err(|e| TermError::Internal(format!("Failed to render result: {e}")))?;
        Ok(output)
    }
}

fn paint(text: &str, color: &str, config: &FormatterConfig) -> String {
    if config.use_colors {
        format!("\x1b[{color}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn render_human(out: &mut String, result: &WorkflowResult, config: &FormatterConfig) -> std::fmt::Result {
    let summary = result.summary();

    writeln!(out)?;
    if result.is_clean() {
        writeln!(out, "✅ {}", paint("Run CLEAN", "32", config))?;
    } else {
        writeln!(out, "❌ {}", paint("Run has FINDINGS", "31", config))?;
    }
    writeln!(out)?;
    writeln!(out, "📊 Summary:")?;
    writeln!(out, "   Tables profiled: {}", summary.tables_profiled)?;
    writeln!(out, "   Tables failed: {}", summary.tables_failed)?;
    writeln!(out, "   Tables cancelled: {}", summary.tables_cancelled)?;
    writeln!(out, "   Metric failures: {}", summary.metric_failures)?;
    writeln!(
        out,
        "   Tests: {} passed, {} failed, {} aborted",
        summary.tests_passed, summary.tests_failed, summary.tests_aborted
    )?;

    for table in &result.results {
        writeln!(out)?;
        write!(out, "📋 {}", table.table.name)?;
        if config.include_timestamps {
            write!(out, " ({} at {}ms)", table.profiled_at.to_rfc3339(), table.duration_ms)?;
        }
        writeln!(out)?;

        if config.include_profiles {
            for (metric, value) in &table.profile.table_metrics {
                writeln!(out, "   {metric}: {}", serde_json::json!(value))?;
            }
            for (column, profile) in &table.profile.columns {
                for (metric, value) in &profile.values {
                    writeln!(out, "   {column}.{metric}: {}", serde_json::json!(value))?;
                }
            }
        }
        for failure in &table.profile.failures {
            let target = failure.column.as_deref().unwrap_or("<table>");
            writeln!(
                out,
                "   ⚠️  {target}.{} [{}]: {}",
                failure.metric, failure.kind, failure.message
            )?;
        }

        let (tests, hidden) = config.visible_tests(&table.tests);
        for test in tests {
            let symbol = match test.outcome {
                TestOutcome::Pass => paint("PASS", "32", config),
                TestOutcome::Fail => paint("FAIL", "31", config),
                TestOutcome::Aborted => paint("ABORTED", "33", config),
            };
            write!(out, "   {symbol} {} ({})", test.name, test.kind)?;
            if let Some(message) = &test.message {
                write!(out, ": {message}")?;
            }
            writeln!(out)?;
        }
        if hidden > 0 {
            writeln!(out, "   ... and {hidden} more tests")?;
        }
    }

    if !result.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "🚨 Table errors:")?;
        for error in &result.errors {
            writeln!(out, "   {} [{}]: {}", error.table, error.kind, error.message)?;
        }
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        EvaluationPath, MetricValue, Table, TableError, TableProfile, TestIdentity,
    };
    use crate::error::QueryErrorKind;
    use crate::profiler::Metric;
    use chrono::{TimeZone, Utc};

    fn sample() -> WorkflowResult {
        let mut profile = TableProfile::new("orders");
        profile.insert_table_value(Metric::RowCount, MetricValue::Integer(4));
        let id = |name: &str| TestIdentity {
            name: name.to_string(),
            table: "orders".to_string(),
            column: None,
            kind: "row_count_between",
        };
        WorkflowResult {
            results: vec![ProfileAndTests {
                table: Table::new("orders", vec![]),
                profile,
                tests: vec![
                    TestCaseResult::pass(&id("ok"), EvaluationPath::Profile, MetricValue::Integer(4)),
                    TestCaseResult::fail(
                        &id("too_small"),
                        EvaluationPath::Profile,
                        MetricValue::Integer(4),
                        "row count 4 is outside [5, 10]",
                    ),
                ],
                profiled_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                duration_ms: 12,
            }],
            errors: vec![TableError::from_error(
                "customers",
                &TermError::query(QueryErrorKind::ConnectionLost, "socket closed"),
            )],
        }
    }

    #[test]
    fn test_json_round_trips_unfiltered() {
        let result = sample();
        let json = JsonFormatter::new().format(&result).unwrap();
        let back: WorkflowResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_json_filters_passing_tests_and_profiles() {
        let json = JsonFormatter::with_config(FormatterConfig::ci())
            .with_pretty(false)
            .format(&sample())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let table = &value["results"][0];
        assert!(table.get("profile").is_none());
        assert_eq!(table["tests"].as_array().unwrap().len(), 1);
        assert_eq!(table["tests"][0]["name"], "too_small");
        assert_eq!(value["summary"]["tables_failed"], 1);
    }

    #[test]
    fn test_human_output() {
        let text = HumanFormatter::with_config(FormatterConfig::default().with_colors(false))
            .format(&sample())
            .unwrap();
        assert!(text.contains("❌ Run has FINDINGS"));
        assert!(text.contains("row_count: 4"));
        assert!(text.contains("FAIL too_small (row_count_between): row count 4 is outside [5, 10]"));
        assert!(text.contains("customers [connection]"));
    }

    #[test]
    fn test_human_output_truncates_tests() {
        let config = FormatterConfig::default().with_colors(false).with_max_tests(1);
        let text = HumanFormatter::with_config(config).format(&sample()).unwrap();
        assert!(text.contains("PASS ok"));
        assert!(!text.contains("too_small"));
        assert!(text.contains("... and 1 more tests"));
    }
}
