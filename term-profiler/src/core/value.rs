//! Value types exchanged between adapters, profiles and test results.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value returned by a warehouse or bound into a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Boolean(bool),
    /// Any integer type that fits in 64 bits
    Integer(i64),
    /// Floating point and decimal types
    Float(f64),
    /// Character data
    String(String),
    /// Dates and timestamps, normalised to UTC
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value.
    ///
    /// Floats with an integral value are accepted, since some warehouses return
    /// `SUM` of integers as a floating point or decimal type.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Converts a warehouse value into a profile value. NULL becomes `None`.
    pub fn into_metric_value(self) -> Option<MetricValue> {
        match self {
            Value::Null => None,
            Value::Boolean(v) => Some(MetricValue::Text(v.to_string())),
            Value::Integer(v) => Some(MetricValue::Integer(v)),
            Value::Float(v) if v.is_finite() => Some(MetricValue::Float(v)),
            Value::Float(_) => None,
            Value::String(v) => Some(MetricValue::Text(v)),
            Value::Timestamp(v) => Some(MetricValue::Text(
                v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

/// One bucket of a frequency histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Rendered column value
    pub value: String,
    /// Number of rows holding the value
    pub count: u64,
}

/// A computed metric value stored in a profile or reported as a test observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Counts and integral aggregates
    Integer(i64),
    /// Averages, proportions and other real-valued aggregates
    Float(f64),
    /// Min/max of strings and temporal columns
    Text(String),
    /// Top-N value frequencies
    Histogram(Vec<HistogramBucket>),
}

impl MetricValue {
    /// Numeric view of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Integer(v) => Some(*v),
            MetricValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Text(v) => f.write_str(v),
            MetricValue::Histogram(buckets) => {
                let rendered: Vec<String> = buckets
                    .iter()
                    .map(|b| format!("{}={}", b.value, b.count))
                    .collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_null_becomes_absent_metric() {
        assert_eq!(Value::Null.into_metric_value(), None);
        assert_eq!(Value::Float(f64::NAN).into_metric_value(), None);
        assert_eq!(
            Value::Integer(4).into_metric_value(),
            Some(MetricValue::Integer(4))
        );
    }

    #[test]
    fn test_timestamp_metric_is_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            Value::Timestamp(ts).into_metric_value(),
            Some(MetricValue::Text("2024-03-01T12:30:00Z".to_string()))
        );
    }

    #[test]
    fn test_integer_views() {
        assert_eq!(Value::Float(12.0).as_i64(), Some(12));
        assert_eq!(Value::Float(12.5).as_i64(), None);
        assert_eq!(MetricValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(MetricValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn test_metric_value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&MetricValue::Integer(4)).unwrap(), "4");
        assert_eq!(serde_json::to_string(&MetricValue::Float(2.5)).unwrap(), "2.5");
        let histogram = MetricValue::Histogram(vec![HistogramBucket {
            value: "a".to_string(),
            count: 2,
        }]);
        assert_eq!(
            serde_json::to_string(&histogram).unwrap(),
            r#"[{"value":"a","count":2}]"#
        );
    }
}
