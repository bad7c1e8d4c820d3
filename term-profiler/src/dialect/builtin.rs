//! Default templates and the built-in dialect table.

use super::registry::{DialectDefinition, ExpressionKind, PlaceholderStyle, Template};
use std::collections::HashMap;

/// SQL-92 templates. `StdDev`, `Median` and `RegexMatch` have no portable
/// spelling and are left to the dialects.
pub(crate) fn default_templates() -> HashMap<ExpressionKind, Template> {
    let mut defaults = HashMap::new();
    defaults.insert(ExpressionKind::RowCount, Template::new("COUNT(*)"));
    defaults.insert(ExpressionKind::Count, Template::new("COUNT({0})"));
    defaults.insert(
        ExpressionKind::NullCount,
        Template::new("SUM(CASE WHEN {0} IS NULL THEN 1 ELSE 0 END)"),
    );
    defaults.insert(ExpressionKind::DistinctCount, Template::new("COUNT(DISTINCT {0})"));
    defaults.insert(ExpressionKind::Average, Template::new("AVG({0})"));
    defaults.insert(ExpressionKind::Sum, Template::new("SUM({0})"));
    defaults.insert(ExpressionKind::Min, Template::new("MIN({0})"));
    defaults.insert(ExpressionKind::Max, Template::new("MAX({0})"));
    defaults.insert(ExpressionKind::Length, Template::new("CHAR_LENGTH({0})"));
    defaults.insert(ExpressionKind::Like, Template::new("{0} LIKE {1}").case_sensitive());
    defaults.insert(ExpressionKind::IsNull, Template::new("{0} IS NULL"));
    defaults.insert(ExpressionKind::IsNotNull, Template::new("{0} IS NOT NULL"));
    defaults.insert(
        ExpressionKind::CastFloat,
        Template::new("CAST({0} AS DOUBLE PRECISION)"),
    );
    defaults
}

/// Every dialect shipped with the engine.
pub(crate) fn builtin_dialects() -> Vec<DialectDefinition> {
    vec![
        datafusion(),
        postgres(),
        redshift(),
        mysql(),
        snowflake(),
        bigquery(),
    ]
}

/// Apache DataFusion, the embedded engine.
fn datafusion() -> DialectDefinition {
    DialectDefinition::new("datafusion")
        .with_override(
            ExpressionKind::RegexMatch,
            Template::new("{0} ~ {1}").case_sensitive(),
        )
        .with_override(ExpressionKind::StdDev, "STDDEV({0})")
        .with_override(ExpressionKind::Median, "MEDIAN(CAST({0} AS DOUBLE))")
        .with_override(ExpressionKind::CastFloat, "CAST({0} AS DOUBLE)")
}

/// PostgreSQL. Aggregates that return `numeric` are cast to a float.
fn postgres() -> DialectDefinition {
    DialectDefinition::new("postgres")
        .with_override(
            ExpressionKind::RegexMatch,
            Template::new("{0} ~ {1}").case_sensitive(),
        )
        .with_override(
            ExpressionKind::StdDev,
            "CAST(STDDEV_SAMP({0}) AS DOUBLE PRECISION)",
        )
        .with_override(ExpressionKind::Average, "CAST(AVG({0}) AS DOUBLE PRECISION)")
        .with_override(ExpressionKind::Sum, "CAST(SUM({0}) AS DOUBLE PRECISION)")
        .with_override(
            ExpressionKind::Median,
            "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {0})",
        )
}

/// Redshift matches POSIX patterns case-insensitively with `~*`.
fn redshift() -> DialectDefinition {
    DialectDefinition::derived_from("redshift", &postgres())
        .with_override(
            ExpressionKind::RegexMatch,
            Template::new("{0} ~* {1}").case_insensitive(),
        )
        .with_override(
            ExpressionKind::Average,
            "AVG(CAST({0} AS DOUBLE PRECISION))",
        )
        .with_override(ExpressionKind::Sum, "SUM(CAST({0} AS DOUBLE PRECISION))")
        .with_override(ExpressionKind::Median, "MEDIAN(CAST({0} AS DOUBLE PRECISION))")
}

/// MySQL. `REGEXP` follows the column collation, case-insensitive by default.
fn mysql() -> DialectDefinition {
    DialectDefinition::new("mysql")
        .with_identifier_quote('`')
        .with_placeholder_style(PlaceholderStyle::QuestionMark)
        .with_backslash_escapes(true)
        .with_override(
            ExpressionKind::RegexMatch,
            Template::new("{0} REGEXP {1}").case_insensitive(),
        )
        .with_override(ExpressionKind::StdDev, "STDDEV_SAMP({0})")
        .with_override(ExpressionKind::CastFloat, "CAST({0} AS DOUBLE)")
}

/// Snowflake. `REGEXP_LIKE` matches the whole value.
fn snowflake() -> DialectDefinition {
    DialectDefinition::new("snowflake")
        .with_placeholder_style(PlaceholderStyle::QuestionMark)
        .with_override(
            ExpressionKind::RegexMatch,
            Template::new("REGEXP_LIKE({0}, {1})").case_sensitive(),
        )
        .with_override(ExpressionKind::StdDev, "STDDEV_SAMP({0})")
        .with_override(ExpressionKind::Median, "MEDIAN(CAST({0} AS DOUBLE))")
        .with_override(ExpressionKind::Length, "LENGTH({0})")
        .with_override(ExpressionKind::CastFloat, "CAST({0} AS DOUBLE)")
}

fn bigquery() -> DialectDefinition {
    DialectDefinition::new("bigquery")
        .with_identifier_quote('`')
        .with_placeholder_style(PlaceholderStyle::QuestionMark)
        .with_backslash_escapes(true)
        .with_override(
            ExpressionKind::RegexMatch,
            Template::new("REGEXP_CONTAINS({0}, {1})").case_sensitive(),
        )
        .with_override(ExpressionKind::StdDev, "STDDEV_SAMP({0})")
        .with_override(
            ExpressionKind::Median,
            "APPROX_QUANTILES({0}, 2)[OFFSET(1)]",
        )
        .with_override(ExpressionKind::Length, "LENGTH({0})")
        .with_override(ExpressionKind::CastFloat, "CAST({0} AS FLOAT64)")
}
