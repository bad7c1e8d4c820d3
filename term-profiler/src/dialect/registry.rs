//! Expression templates and the registry that resolves them per dialect.

use crate::error::{Result, TermError};
use crate::security::SqlSecurity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A canonical SQL expression the engine knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    /// `COUNT(*)`, no operand
    RowCount,
    /// Non-null values of `{0}`
    Count,
    /// Null values of `{0}`
    NullCount,
    /// Distinct non-null values of `{0}`
    DistinctCount,
    /// Mean of `{0}`
    Average,
    /// Sum of `{0}`
    Sum,
    /// Minimum of `{0}`
    Min,
    /// Maximum of `{0}`
    Max,
    /// Sample standard deviation of `{0}`
    StdDev,
    /// Character length of `{0}`
    Length,
    /// 50th percentile of `{0}`
    Median,
    /// Boolean: `{0}` matches regular expression `{1}`
    RegexMatch,
    /// Boolean: `{0}` matches LIKE pattern `{1}`
    Like,
    /// Boolean: `{0}` is NULL
    IsNull,
    /// Boolean: `{0}` is not NULL
    IsNotNull,
    /// `{0}` as a double precision float
    CastFloat,
}

impl ExpressionKind {
    /// All kinds, in declaration order.
    pub const ALL: [ExpressionKind; 16] = [
        ExpressionKind::RowCount,
        ExpressionKind::Count,
        ExpressionKind::NullCount,
        ExpressionKind::DistinctCount,
        ExpressionKind::Average,
        ExpressionKind::Sum,
        ExpressionKind::Min,
        ExpressionKind::Max,
        ExpressionKind::StdDev,
        ExpressionKind::Length,
        ExpressionKind::Median,
        ExpressionKind::RegexMatch,
        ExpressionKind::Like,
        ExpressionKind::IsNull,
        ExpressionKind::IsNotNull,
        ExpressionKind::CastFloat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExpressionKind::RowCount => "row_count",
            ExpressionKind::Count => "count",
            ExpressionKind::NullCount => "null_count",
            ExpressionKind::DistinctCount => "distinct_count",
            ExpressionKind::Average => "average",
            ExpressionKind::Sum => "sum",
            ExpressionKind::Min => "min",
            ExpressionKind::Max => "max",
            ExpressionKind::StdDev => "std_dev",
            ExpressionKind::Length => "length",
            ExpressionKind::Median => "median",
            ExpressionKind::RegexMatch => "regex_match",
            ExpressionKind::Like => "like",
            ExpressionKind::IsNull => "is_null",
            ExpressionKind::IsNotNull => "is_not_null",
            ExpressionKind::CastFloat => "cast_float",
        }
    }

    /// Number of operands the kind takes.
    pub fn arity(&self) -> usize {
        match self {
            ExpressionKind::RowCount => 0,
            ExpressionKind::RegexMatch | ExpressionKind::Like => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a pattern-matching template treats letter case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
    /// The expression does not compare text
    NotApplicable,
}

/// A SQL fragment with positional `{0}`, `{1}` operand slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    sql: String,
    case_sensitivity: CaseSensitivity,
}

impl Template {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            case_sensitivity: CaseSensitivity::NotApplicable,
        }
    }

    /// Marks the template as a case-sensitive comparison.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitivity = CaseSensitivity::Sensitive;
        self
    }

    /// Marks the template as a case-insensitive comparison.
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitivity = CaseSensitivity::Insensitive;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Substitutes the operands into the template.
    ///
    /// Operands are spliced verbatim; callers pass quoted identifiers,
    /// placeholders or escaped literals. A `{` not followed by digits and `}` is
    /// copied unchanged.
    pub fn render(&self, operands: &[&str]) -> Result<String> {
        let mut out = String::with_capacity(self.sql.len() + 16);
        let mut rest = self.sql.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            if digits > 0 && after.as_bytes().get(digits) == Some(&b'}') {
                let index: usize = after[..digits]
                    .parse()
                    .map_err(|_| TermError::Configuration(format!("Bad operand slot in '{}'", self.sql)))?;
                let operand = operands.get(index).ok_or_else(|| {
                    TermError::Configuration(format!(
                        "Template '{}' references operand {index} but only {} were given",
                        self.sql,
                        operands.len()
                    ))
                })?;
                out.push_str(operand);
                rest = &after[digits + 1..];
            } else {
                out.push('{');
                rest = after;
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(sql: &str) -> Self {
        Template::new(sql)
    }
}

/// How a dialect spells a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ...
    Dollar,
    /// `?`
    QuestionMark,
}

/// The override table and syntax settings of one dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectDefinition {
    name: String,
    overrides: HashMap<ExpressionKind, Template>,
    identifier_quote: char,
    placeholder_style: PlaceholderStyle,
    parameter_binding: bool,
    backslash_escapes: bool,
}

impl DialectDefinition {
    /// Creates a dialect with no overrides, double-quoted identifiers and `$n`
    /// parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            overrides: HashMap::new(),
            identifier_quote: '"',
            placeholder_style: PlaceholderStyle::Dollar,
            parameter_binding: true,
            backslash_escapes: false,
        }
    }

    /// Copies another dialect under a new name.
    pub fn derived_from(name: impl Into<String>, base: &DialectDefinition) -> Self {
        Self {
            name: name.into().to_lowercase(),
            ..base.clone()
        }
    }

    pub fn with_override(mut self, kind: ExpressionKind, template: impl Into<Template>) -> Self {
        self.overrides.insert(kind, template.into());
        self
    }

    pub fn with_identifier_quote(mut self, quote: char) -> Self {
        self.identifier_quote = quote;
        self
    }

    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    /// Sets whether the warehouse binds query parameters. Without binding,
    /// user values are rendered as escaped literals.
    pub fn with_parameter_binding(mut self, enabled: bool) -> Self {
        self.parameter_binding = enabled;
        self
    }

    pub fn with_backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn override_for(&self, kind: ExpressionKind) -> Option<&Template> {
        self.overrides.get(&kind)
    }

    pub fn identifier_quote(&self) -> char {
        self.identifier_quote
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.placeholder_style
    }

    pub fn parameter_binding(&self) -> bool {
        self.parameter_binding
    }

    pub fn backslash_escapes(&self) -> bool {
        self.backslash_escapes
    }
}

/// Default templates and named dialect overrides.
///
/// Lookup is the dialect's override if present, else the default. Kinds with
/// neither fail with [`TermError::UnsupportedExpression`].
#[derive(Debug, Clone)]
pub struct ExpressionRegistry {
    defaults: HashMap<ExpressionKind, Template>,
    dialects: HashMap<String, DialectDefinition>,
    fallback: DialectDefinition,
}

impl Default for ExpressionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionRegistry {
    /// Creates a registry holding the default templates and no dialects.
    pub fn new() -> Self {
        Self {
            defaults: super::builtin::default_templates(),
            dialects: HashMap::new(),
            fallback: DialectDefinition::new("default")
                .with_placeholder_style(PlaceholderStyle::QuestionMark),
        }
    }

    /// Creates a registry with every built-in dialect registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for definition in super::builtin::builtin_dialects() {
            registry.register(definition);
        }
        registry
    }

    /// Registers a dialect, returning the definition it replaced.
    pub fn register(&mut self, definition: DialectDefinition) -> Option<DialectDefinition> {
        self.dialects
            .insert(definition.name().to_string(), definition)
    }

    /// Names of the registered dialects, sorted.
    pub fn dialect_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the definition registered under `dialect`.
    pub fn definition(&self, dialect: &str) -> Option<&DialectDefinition> {
        self.dialects.get(&dialect.to_lowercase())
    }

    /// Returns the definition used for `dialect`: the registered one, or the
    /// default settings for unknown names.
    pub fn definition_or_default(&self, dialect: &str) -> &DialectDefinition {
        self.definition(dialect).unwrap_or(&self.fallback)
    }

    pub fn default_template(&self, kind: ExpressionKind) -> Option<&Template> {
        self.defaults.get(&kind)
    }

    /// Resolves the template for `kind` in `dialect`.
    pub fn template(&self, dialect: &str, kind: ExpressionKind) -> Result<&Template> {
        self.definition(dialect)
            .and_then(|d| d.override_for(kind))
            .or_else(|| self.defaults.get(&kind))
            .ok_or_else(|| TermError::unsupported_expression(kind.name(), dialect))
    }

    /// Renders `kind` for `dialect` with the given operands.
    pub fn resolve(&self, dialect: &str, kind: ExpressionKind, operands: &[&str]) -> Result<String> {
        self.template(dialect, kind)?.render(operands)
    }

    /// Binds the registry to one dialect.
    pub fn dialect(self: &Arc<Self>, name: &str) -> Dialect {
        Dialect {
            registry: Arc::clone(self),
            name: name.to_lowercase(),
        }
    }
}

/// A registry bound to one dialect name. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Dialect {
    registry: Arc<ExpressionRegistry>,
    name: String,
}

impl Dialect {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ExpressionRegistry> {
        &self.registry
    }

    pub fn definition(&self) -> &DialectDefinition {
        self.registry.definition_or_default(&self.name)
    }

    pub fn template(&self, kind: ExpressionKind) -> Result<&Template> {
        self.registry.template(&self.name, kind)
    }

    /// Renders an expression.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use term_profiler::dialect::{ExpressionKind, ExpressionRegistry};
    ///
    /// let registry = Arc::new(ExpressionRegistry::with_builtins());
    /// let redshift = registry.dialect("redshift");
    /// assert_eq!(
    ///     redshift.expr(ExpressionKind::RegexMatch, &["\"email\"", "$1"]).unwrap(),
    ///     "\"email\" ~* $1"
    /// );
    /// ```
    pub fn expr(&self, kind: ExpressionKind, operands: &[&str]) -> Result<String> {
        self.registry.resolve(&self.name, kind, operands)
    }

    /// Quotes a column or other single-part identifier.
    pub fn quote_identifier(&self, identifier: &str) -> Result<String> {
        SqlSecurity::quote_identifier(identifier, self.definition().identifier_quote())
    }

    /// Quotes a possibly qualified table name, part by part.
    pub fn quote_table(&self, table: &str) -> Result<String> {
        let parts = table
            .split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("."))
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self.definition().placeholder_style() {
            PlaceholderStyle::Dollar => format!("${index}"),
            PlaceholderStyle::QuestionMark => "?".to_string(),
        }
    }

    /// Renders a string as an escaped literal for this dialect.
    pub fn literal(&self, value: &str) -> Result<String> {
        SqlSecurity::string_literal(value, self.definition().backslash_escapes())
    }

    pub fn binds_parameters(&self) -> bool {
        self.definition().parameter_binding()
    }
}
