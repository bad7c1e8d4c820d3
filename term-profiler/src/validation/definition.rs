//! Declarative test definitions.

use crate::core::ColumnCategory;
use crate::error::{Result, TermError};
use crate::security::{InputValidator, SqlSecurity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The assertion a test case makes.
///
/// Bounds are inclusive; a missing bound is open. `tolerance` is the fraction of
/// rows allowed to violate a row-level predicate, from `0.0` to `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestKind {
    /// The table's row count lies within the bounds
    RowCountBetween {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// The catalog's column count lies within the bounds
    ColumnCountBetween {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// The column holds no NULLs
    NotNull { column: String },
    /// Non-null values of the column are distinct
    Unique { column: String },
    /// Non-null values of a numeric column lie within the bounds
    ValueInRange {
        column: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        tolerance: f64,
    },
    /// Character lengths of a string column lie within the bounds
    LengthBetween {
        column: String,
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// Non-null values of a string column match a regular expression
    RegexMatch {
        column: String,
        pattern: String,
        #[serde(default)]
        tolerance: f64,
    },
    /// A boolean SQL expression holds for every row
    CustomExpression {
        expression: String,
        #[serde(default)]
        tolerance: f64,
    },
}

impl TestKind {
    /// The snake_case name used in definitions and results.
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::RowCountBetween { .. } => "row_count_between",
            TestKind::ColumnCountBetween { .. } => "column_count_between",
            TestKind::NotNull { .. } => "not_null",
            TestKind::Unique { .. } => "unique",
            TestKind::ValueInRange { .. } => "value_in_range",
            TestKind::LengthBetween { .. } => "length_between",
            TestKind::RegexMatch { .. } => "regex_match",
            TestKind::CustomExpression { .. } => "custom_expression",
        }
    }

    /// The column the test targets, `None` for table-level tests.
    pub fn column(&self) -> Option<&str> {
        match self {
            TestKind::NotNull { column }
            | TestKind::Unique { column }
            | TestKind::ValueInRange { column, .. }
            | TestKind::LengthBetween { column, .. }
            | TestKind::RegexMatch { column, .. } => Some(column),
            TestKind::RowCountBetween { .. }
            | TestKind::ColumnCountBetween { .. }
            | TestKind::CustomExpression { .. } => None,
        }
    }

    /// Whether the test can target a column of `category`.
    pub fn accepts(&self, category: ColumnCategory) -> bool {
        match self {
            TestKind::ValueInRange { .. } => category == ColumnCategory::Numeric,
            TestKind::LengthBetween { .. } | TestKind::RegexMatch { .. } => {
                category == ColumnCategory::String
            }
            _ => true,
        }
    }

    /// Allowed violation ratio of row-level tests.
    pub fn tolerance(&self) -> f64 {
        match self {
            TestKind::ValueInRange { tolerance, .. }
            | TestKind::RegexMatch { tolerance, .. }
            | TestKind::CustomExpression { tolerance, .. } => *tolerance,
            _ => 0.0,
        }
    }

    /// Checks the test's parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            TestKind::RowCountBetween { min, max }
            | TestKind::ColumnCountBetween { min, max }
            | TestKind::LengthBetween { min, max, .. } => {
                check_bounds(min.map(|v| v as f64), max.map(|v| v as f64))?;
                if min.is_some_and(|v| v < 0) {
                    return Err(TermError::Configuration(format!(
                        "{}: lower bound cannot be negative",
                        self.name()
                    )));
                }
            }
            TestKind::ValueInRange { min, max, .. } => {
                if let Some(min) = min {
                    InputValidator::validate_threshold(*min, "min")?;
                }
                if let Some(max) = max {
                    InputValidator::validate_threshold(*max, "max")?;
                }
                check_bounds(*min, *max)?;
            }
            TestKind::RegexMatch { pattern, .. } => SqlSecurity::validate_regex_pattern(pattern)?,
            TestKind::CustomExpression { expression, .. } => {
                SqlSecurity::validate_sql_expression(expression)?
            }
            TestKind::NotNull { .. } | TestKind::Unique { .. } => {}
        }
        InputValidator::validate_ratio(self.tolerance(), "tolerance")
    }
}

fn check_bounds(min: Option<f64>, max: Option<f64>) -> Result<()> {
    match (min, max) {
        (None, None) => Err(TermError::Configuration(
            "at least one of min and max is required".to_string(),
        )),
        (Some(min), Some(max)) if min > max => Err(TermError::Configuration(format!(
            "min ({min}) is greater than max ({max})"
        ))),
        _ => Ok(()),
    }
}

/// Inclusive bounds with open ends, rendered as `[2, 10]` or `[2, ∞)`.
pub(crate) struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.min {
            Some(min) => write!(f, "[{min}, ")?,
            None => f.write_str("(-∞, ")?,
        }
        match &self.max {
            Some(max) => write!(f, "{max}]"),
            None => f.write_str("∞)"),
        }
    }
}

/// One named test against one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub table: String,
    #[serde(flatten)]
    pub kind: TestKind,
}

impl TestCase {
    pub fn new(name: impl Into<String>, table: impl Into<String>, kind: TestKind) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            kind,
        }
    }
}

/// An ordered collection of test cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestDef {
    pub name: String,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl TestDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    pub fn with_test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    /// Test cases targeting `table`, in declared order.
    pub fn tests_for(&self, table: &str) -> Vec<&TestCase> {
        self.tests.iter().filter(|t| t.table == table).collect()
    }

    /// Whether any test targets `table`.
    pub fn targets(&self, table: &str) -> bool {
        self.tests.iter().any(|t| t.table == table)
    }

    /// Checks every test's parameters and that test names are unique per table.
    ///
    /// Evaluation tolerates invalid tests (they abort), so calling this is
    /// optional; loaders use it to reject a definition up front.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for test in &self.tests {
            if !seen.insert((test.table.as_str(), test.name.as_str())) {
                return Err(TermError::Configuration(format!(
                    "duplicate test '{}' for table '{}'",
                    test.name, test.table
                )));
            }
            test.kind.validate().map_err(|e| {
                TermError::Configuration(format!("test '{}': {e}", test.name))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "name": "orders_checks",
            "tests": [
                {"name": "has_rows", "table": "orders", "kind": "row_count_between", "min": 1},
                {"name": "email_format", "table": "customers", "kind": "regex_match",
                 "column": "email", "pattern": "^[^@]+@[^@]+$", "tolerance": 0.01},
                {"name": "id_not_null", "table": "orders", "kind": "not_null", "column": "id"}
            ]
        }"#;
        let def: TestDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.tests.len(), 3);
        assert_eq!(
            def.tests[0].kind,
            TestKind::RowCountBetween {
                min: Some(1),
                max: None
            }
        );
        assert_eq!(def.tests[1].kind.column(), Some("email"));
        assert_eq!(def.tests[1].kind.tolerance(), 0.01);

        let names: Vec<&str> = def.tests_for("orders").iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["has_rows", "id_not_null"]);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_unknown_kind_is_rejected_at_load() {
        let json = r#"{"name": "x", "table": "t", "kind": "fancy_check"}"#;
        assert!(serde_json::from_str::<TestCase>(json).is_err());
    }

    #[test]
    fn test_parameter_validation() {
        let inverted = TestKind::RowCountBetween {
            min: Some(10),
            max: Some(2),
        };
        assert!(inverted.validate().is_err());

        let unbounded = TestKind::LengthBetween {
            column: "c".to_string(),
            min: None,
            max: None,
        };
        assert!(unbounded.validate().is_err());

        let tolerance = TestKind::RegexMatch {
            column: "c".to_string(),
            pattern: "^a".to_string(),
            tolerance: 1.5,
        };
        assert!(tolerance.validate().is_err());

        let injection = TestKind::CustomExpression {
            expression: "1 = 1; DROP TABLE orders".to_string(),
            tolerance: 0.0,
        };
        assert!(injection.validate().is_err());

        let nan = TestKind::ValueInRange {
            column: "c".to_string(),
            min: Some(f64::NAN),
            max: None,
            tolerance: 0.0,
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let not_null = TestKind::NotNull {
            column: "id".to_string(),
        };
        let def = TestDef::new("dups")
            .with_test(TestCase::new("a", "t", not_null.clone()))
            .with_test(TestCase::new("a", "t", not_null.clone()))
            .with_test(TestCase::new("a", "u", not_null));
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate test 'a'"));
    }

    #[test]
    fn test_bounds() {
        let bounds = Bounds::new(Some(2), Some(10));
        assert!(bounds.contains(2));
        assert!(bounds.contains(10));
        assert!(!bounds.contains(11));
        assert_eq!(bounds.to_string(), "[2, 10]");

        let open = Bounds::new(None, Some(1.5));
        assert!(open.contains(-100.0));
        assert_eq!(open.to_string(), "(-∞, 1.5]");
    }

    #[test]
    fn test_category_acceptance() {
        let regex = TestKind::RegexMatch {
            column: "c".to_string(),
            pattern: ".".to_string(),
            tolerance: 0.0,
        };
        assert!(regex.accepts(ColumnCategory::String));
        assert!(!regex.accepts(ColumnCategory::Numeric));
        assert!(TestKind::NotNull {
            column: "c".to_string()
        }
        .accepts(ColumnCategory::Boolean));
    }
}
