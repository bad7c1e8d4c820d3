//! Security utilities for query construction.
//!
//! Identifiers supplied by the catalog are quoted, never spliced raw. User-supplied
//! literals travel as bound parameters; when a dialect cannot bind a value in some
//! clause position the literal is escaped here instead. Custom predicates and regex
//! patterns from test definitions are validated before they reach a warehouse.

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum identifier length accepted by [`SqlSecurity::validate_identifier`].
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Maximum regex pattern length accepted from test definitions.
const MAX_PATTERN_LENGTH: usize = 1000;

/// Maximum custom expression length accepted from test definitions.
const MAX_EXPRESSION_LENGTH: usize = 5000;

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Convert to a regular string. The SecureString will be zeroized.
    pub fn into_string(mut self) -> String {
        let value = std::mem::take(&mut self.0);
        self.0.zeroize();
        value
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// SQL identifier and literal handling.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a single identifier part (a column, schema or table name).
    ///
    /// Quoting makes any printable name safe, so only names that no warehouse
    /// accepts are rejected: empty names, overlong names and names with NUL bytes.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(TermError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }
        if identifier.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Quotes an identifier with the given quote character, doubling any embedded
    /// quote characters.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use term_profiler::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("order id", '"').unwrap(), "\"order id\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a`b", '`').unwrap(), "`a``b`");
    /// assert!(SqlSecurity::quote_identifier("", '"').is_err());
    /// ```
    pub fn quote_identifier(identifier: &str, quote: char) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let doubled: String = [quote, quote].iter().collect();
        let escaped = identifier.replace(quote, &doubled);
        Ok(format!("{quote}{escaped}{quote}"))
    }

    /// Renders a string as a single-quoted SQL literal.
    ///
    /// Single quotes are doubled. When `backslash_escapes` is set (MySQL-style
    /// literals) backslashes are doubled as well.
    pub fn string_literal(value: &str, backslash_escapes: bool) -> Result<String> {
        if value.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL literal cannot contain null bytes".to_string(),
            ));
        }
        let mut escaped = String::with_capacity(value.len() + 2);
        escaped.push('\'');
        for ch in value.chars() {
            match ch {
                '\'' => escaped.push_str("''"),
                '\\' if backslash_escapes => escaped.push_str("\\\\"),
                other => escaped.push(other),
            }
        }
        escaped.push('\'');
        Ok(escaped)
    }

    /// Validates a regex pattern from a test definition.
    ///
    /// The pattern must compile with the `regex` crate (a common subset of the
    /// warehouse regex flavours) and must not contain the classic catastrophic
    /// backtracking shapes.
    pub fn validate_regex_pattern(pattern: &str) -> Result<()> {
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(TermError::SecurityError(format!(
                "Regex pattern too long (max {MAX_PATTERN_LENGTH} characters)"
            )));
        }
        if pattern.contains('\0') {
            return Err(TermError::SecurityError(
                "Regex pattern cannot contain null bytes".to_string(),
            ));
        }
        Regex::new(pattern)
            .map_err(|e| TermError::SecurityError(format!("Invalid regex pattern: {e}")))?;

        for dangerous in ["(.*)*", "(.*)+", "(a+)+", "(a*)*"] {
            if pattern.contains(dangerous) {
                return Err(TermError::SecurityError(
                    "Regex pattern might cause ReDoS attack".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Validates a custom boolean predicate from a test definition.
    ///
    /// The predicate is spliced into a `CASE WHEN` clause, so it must be a single
    /// read-only expression: no statement separators, comments, subqueries or
    /// data-modifying keywords.
    pub fn validate_sql_expression(expression: &str) -> Result<()> {
        if expression.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL expression cannot be empty".to_string(),
            ));
        }
        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(TermError::SecurityError(format!(
                "SQL expression too long (max {MAX_EXPRESSION_LENGTH} characters)"
            )));
        }
        if expression.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL expression cannot contain null bytes".to_string(),
            ));
        }
        // Keywords and separators only count outside quoted literals and identifiers
        let expression = strip_quoted(expression)?;
        let expression = expression.as_str();
        if expression.contains(';') {
            return Err(TermError::SecurityError(
                "SQL expression cannot contain semicolons".to_string(),
            ));
        }
        if expression.contains("--") || expression.contains("/*") || expression.contains("*/") {
            return Err(TermError::SecurityError(
                "SQL expression cannot contain comments".to_string(),
            ));
        }

        static FORBIDDEN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
            // Hard-coded pattern, known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(
                r"(?i)\b(select|insert|update|delete|merge|drop|create|alter|truncate|grant|revoke|exec|execute|call|copy|unload|commit|rollback|begin|transaction|lock)\b",
            )
            .expect("Hard-coded regex pattern should be valid")
        });

        if let Some(found) = FORBIDDEN_KEYWORDS.find(expression) {
            return Err(TermError::SecurityError(format!(
                "SQL expression contains forbidden keyword: '{}'",
                found.as_str().to_uppercase()
            )));
        }
        Ok(())
    }
}

/// Blanks out the contents of `'...'` literals and `"..."` identifiers, keeping
/// the quotes. Doubled quotes inside a quoted run are part of it.
///
/// Backslashes inside quotes are rejected: dialects with backslash escapes would
/// end the run somewhere else than this scanner does.
fn strip_quoted(expression: &str) -> Result<String> {
    let mut stripped = String::with_capacity(expression.len());
    let mut chars = expression.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' && c != '"' {
            stripped.push(c);
            continue;
        }
        stripped.push(c);
        loop {
            match chars.next() {
                Some(q) if q == c => {
                    if chars.peek() == Some(&c) {
                        chars.next();
                    } else {
                        stripped.push(c);
                        break;
                    }
                }
                Some('\\') => {
                    return Err(TermError::SecurityError(
                        "SQL expression cannot contain backslashes inside quotes".to_string(),
                    ))
                }
                Some(_) => {}
                None => {
                    return Err(TermError::SecurityError(
                        "SQL expression has an unterminated quote".to_string(),
                    ))
                }
            }
        }
    }
    Ok(stripped)
}

/// Input validation utilities for numeric parameters.
pub struct InputValidator;

impl InputValidator {
    /// Validates a numeric threshold value.
    pub fn validate_threshold(value: f64, name: &str) -> Result<()> {
        if !value.is_finite() {
            return Err(TermError::Configuration(format!(
                "Invalid {name} value: must be finite (not NaN or infinite)"
            )));
        }
        Ok(())
    }

    /// Validates a ratio value (0.0 to 1.0).
    pub fn validate_ratio(value: f64, name: &str) -> Result<()> {
        Self::validate_threshold(value, name)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(TermError::Configuration(format!(
                "Invalid {name} value: must be between 0.0 and 1.0, got {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_debug_is_redacted() {
        let secure = SecureString::new("secret123");
        assert_eq!(format!("{secure:?}"), "SecureString(***)");
        assert_eq!(secure.expose(), "secret123");
        assert_eq!(secure.into_string(), "secret123");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(SqlSecurity::validate_identifier("customer_id").is_ok());
        assert!(SqlSecurity::validate_identifier("updated_at").is_ok());
        assert!(SqlSecurity::validate_identifier("Order Date").is_ok());

        assert!(SqlSecurity::validate_identifier("").is_err());
        assert!(SqlSecurity::validate_identifier("   ").is_err());
        assert!(SqlSecurity::validate_identifier(&"a".repeat(200)).is_err());
        assert!(SqlSecurity::validate_identifier("col\0name").is_err());
    }

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(
            SqlSecurity::quote_identifier("customer_id", '"').unwrap(),
            "\"customer_id\""
        );
        assert_eq!(
            SqlSecurity::quote_identifier("x\"; DROP TABLE t; --", '"').unwrap(),
            "\"x\"\"; DROP TABLE t; --\""
        );
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(
            SqlSecurity::string_literal("it's", false).unwrap(),
            "'it''s'"
        );
        assert_eq!(
            SqlSecurity::string_literal(r"^\d+$", false).unwrap(),
            r"'^\d+$'"
        );
        assert_eq!(
            SqlSecurity::string_literal(r"^\d+$", true).unwrap(),
            r"'^\\d+$'"
        );
        assert!(SqlSecurity::string_literal("a\0b", false).is_err());
    }

    #[test]
    fn test_regex_pattern_validation() {
        assert!(SqlSecurity::validate_regex_pattern(r"^[A-Z]\d+$").is_ok());
        assert!(SqlSecurity::validate_regex_pattern(r"^[^@]+@[^@]+\.[a-z]+$").is_ok());
        assert!(SqlSecurity::validate_regex_pattern(r"[unclosed").is_err());
        assert!(SqlSecurity::validate_regex_pattern(&"a".repeat(2000)).is_err());
        assert!(SqlSecurity::validate_regex_pattern("(.*)*x").is_err());
    }

    #[test]
    fn test_sql_expression_validation() {
        assert!(SqlSecurity::validate_sql_expression("price > 0").is_ok());
        assert!(SqlSecurity::validate_sql_expression("ship_date >= order_date").is_ok());
        assert!(SqlSecurity::validate_sql_expression("updated_at IS NOT NULL").is_ok());

        assert!(SqlSecurity::validate_sql_expression("").is_err());
        assert!(SqlSecurity::validate_sql_expression("price > 0; DROP TABLE users").is_err());
        assert!(SqlSecurity::validate_sql_expression("id IN (SELECT id FROM secrets)").is_err());
        assert!(SqlSecurity::validate_sql_expression("price > 0 -- comment").is_err());
        assert!(SqlSecurity::validate_sql_expression("delete = 1").is_err());
    }

    #[test]
    fn test_keywords_inside_quotes_are_allowed() {
        assert!(SqlSecurity::validate_sql_expression("\"status\" <> 'begin'").is_ok());
        assert!(SqlSecurity::validate_sql_expression("note <> 'drop; -- it''s fine'").is_ok());
        assert!(SqlSecurity::validate_sql_expression("\"update\" IS NOT NULL").is_ok());

        assert!(
            SqlSecurity::validate_sql_expression("status = 'x' OR 1 IN (SELECT 1)").is_err()
        );
        assert!(SqlSecurity::validate_sql_expression("status = 'it''s' ; DROP TABLE t").is_err());
        assert!(SqlSecurity::validate_sql_expression("status = 'open").is_err());
        assert!(
            SqlSecurity::validate_sql_expression("status = '\\' OR 1 IN (SELECT 1) --'").is_err()
        );
    }

    #[test]
    fn test_input_validation() {
        assert!(InputValidator::validate_threshold(5.5, "threshold").is_ok());
        assert!(InputValidator::validate_threshold(f64::NAN, "threshold").is_err());
        assert!(InputValidator::validate_ratio(0.05, "tolerance").is_ok());
        assert!(InputValidator::validate_ratio(1.5, "tolerance").is_err());
        assert!(InputValidator::validate_ratio(-0.1, "tolerance").is_err());
    }
}
