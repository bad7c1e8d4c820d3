//! Table and column descriptors supplied by the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type category of a column, used to pick applicable metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCategory {
    /// Integers, decimals and floating point numbers
    Numeric,
    /// Character data
    String,
    /// Dates, times and timestamps
    Temporal,
    /// Booleans
    Boolean,
}

impl ColumnCategory {
    /// Maps a declared warehouse type name to a category.
    ///
    /// Matching is case-insensitive and ignores precision/length modifiers, so
    /// `NUMERIC(10,2)`, `varchar(255)` and `timestamp with time zone` are all
    /// recognised. Anything unrecognised is treated as a string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use term_profiler::core::ColumnCategory;
    ///
    /// assert_eq!(ColumnCategory::from_declared_type("BIGINT"), ColumnCategory::Numeric);
    /// assert_eq!(ColumnCategory::from_declared_type("varchar(32)"), ColumnCategory::String);
    /// assert_eq!(ColumnCategory::from_declared_type("timestamptz"), ColumnCategory::Temporal);
    /// ```
    pub fn from_declared_type(declared: &str) -> Self {
        let lowered = declared.trim().to_lowercase();
        let base = lowered
            .split(['(', '['])
            .next()
            .unwrap_or_default()
            .trim();

        match base {
            "tinyint" | "smallint" | "int" | "integer" | "bigint" | "int2" | "int4" | "int8"
            | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64"
            | "serial" | "bigserial" | "decimal" | "numeric" | "number" | "real" | "float"
            | "float4" | "float8" | "float16" | "float32" | "float64" | "double"
            | "double precision" | "money" | "bignumeric" => ColumnCategory::Numeric,
            "bool" | "boolean" | "bit" => ColumnCategory::Boolean,
            "date" | "date32" | "date64" | "datetime" | "time" | "timetz" | "timestamp"
            | "timestamptz" | "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz"
            | "interval" => ColumnCategory::Temporal,
            other if other.starts_with("timestamp") || other.starts_with("time ") => {
                ColumnCategory::Temporal
            }
            _ => ColumnCategory::String,
        }
    }
}

impl fmt::Display for ColumnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnCategory::Numeric => "numeric",
            ColumnCategory::String => "string",
            ColumnCategory::Temporal => "temporal",
            ColumnCategory::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as stored in the warehouse
    pub name: String,
    /// Declared type as reported by the catalog
    pub declared_type: String,
    /// Semantic category derived from the declared type
    pub category: ColumnCategory,
}

impl Column {
    /// Creates a column, deriving the category from the declared type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            category: ColumnCategory::from_declared_type(&declared_type),
            declared_type,
        }
    }

    /// Creates a column with an explicit category.
    pub fn with_category(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        category: ColumnCategory,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            category,
        }
    }
}

/// A table descriptor: identifier plus ordered columns.
///
/// The identifier may be qualified (`schema.table` or `database.schema.table`);
/// each dotted part is quoted separately when SQL is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table identifier
    pub name: String,
    /// Columns in catalog order
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a table descriptor.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Looks up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the dotted parts of the identifier.
    pub fn name_parts(&self) -> Vec<&str> {
        self.name.split('.').collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_declared_type() {
        let cases = [
            ("int4", ColumnCategory::Numeric),
            ("NUMERIC(10, 2)", ColumnCategory::Numeric),
            ("double precision", ColumnCategory::Numeric),
            ("Float64", ColumnCategory::Numeric),
            ("character varying(20)", ColumnCategory::String),
            ("text", ColumnCategory::String),
            ("timestamp with time zone", ColumnCategory::Temporal),
            ("DATE", ColumnCategory::Temporal),
            ("boolean", ColumnCategory::Boolean),
            ("jsonb", ColumnCategory::String),
        ];
        for (declared, expected) in cases {
            assert_eq!(
                ColumnCategory::from_declared_type(declared),
                expected,
                "declared type {declared}"
            );
        }
    }

    #[test]
    fn test_table_column_lookup() {
        let table = Table::new(
            "sales.orders",
            vec![Column::new("id", "bigint"), Column::new("status", "varchar")],
        );
        assert_eq!(table.column("status").map(|c| c.category), Some(ColumnCategory::String));
        assert!(table.column("missing").is_none());
        assert_eq!(table.name_parts(), vec!["sales", "orders"]);
    }

    #[test]
    fn test_table_deserializes_from_catalog_json() {
        let json = r#"{
            "name": "orders",
            "columns": [
                {"name": "id", "declared_type": "bigint", "category": "numeric"},
                {"name": "placed_at", "declared_type": "timestamp", "category": "temporal"}
            ]
        }"#;
        let table: Table = serde_json::from_str(json).unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[1].category, ColumnCategory::Temporal);
    }
}
