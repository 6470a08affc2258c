//! Value type definitions for the Strata storage engine.
//!
//! This module defines the `Value` enum which represents any value that can
//! be stored in a table cell, together with its textual serialization used
//! by the partition row files.

use crate::error::{Error, Result};
use crate::types::ValueType;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use core::cmp::Ordering;
use core::hash::{Hash, Hasher};
use std::str::FromStr;

/// Date serialization format used in row files and index paths.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A value that can be stored in a table cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Absent value (serialized as an empty field).
    Null,
    /// UTF-8 text.
    Text(String),
    /// Arbitrary-precision decimal.
    Number(BigDecimal),
    /// Calendar date.
    Date(NaiveDate),
}

impl Value {
    /// Returns the value type, or None if this is Null.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(ValueType::Text),
            Value::Number(_) => Some(ValueType::Number),
            Value::Date(_) => Some(ValueType::Date),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns a reference to the text if this is a Text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns a reference to the decimal if this is a Number value.
    pub fn as_number(&self) -> Option<&BigDecimal> {
        match self {
            Value::Number(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the date if this is a Date value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    /// Creates a Number value from an integer.
    pub fn number(v: i64) -> Self {
        Value::Number(BigDecimal::from(v))
    }

    /// Creates a Date value, panicking on an out-of-range date. Intended for
    /// literals; parse user input with [`Value::parse`].
    pub fn date(year: i32, month: u32, day: u32) -> Self {
        Value::Date(NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date"))
    }

    /// Milliseconds since the Unix epoch at midnight UTC for Date values.
    /// This is the key the numeric index trees store for date columns.
    pub fn date_millis(&self) -> Option<i64> {
        match self {
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis()),
            _ => None,
        }
    }

    /// Serializes this value to its row-file field text (unquoted).
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(v) => v.clone(),
            Value::Number(v) => v.normalized().to_string(),
            Value::Date(v) => v.format(DATE_FORMAT).to_string(),
        }
    }

    /// Parses a row-file field against the column's declared type.
    /// An empty field is Null for any type.
    pub fn parse(field: &str, value_type: ValueType) -> Result<Value> {
        if field.is_empty() {
            return Ok(Value::Null);
        }
        match value_type {
            ValueType::Text => Ok(Value::Text(field.to_string())),
            ValueType::Number => BigDecimal::from_str(field)
                .map(|d| Value::Number(d.normalized()))
                .map_err(|e| Error::invalid_operation(format!("bad number {field:?}: {e}"))),
            ValueType::Date => NaiveDate::parse_from_str(field, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| Error::invalid_operation(format!("bad date {field:?}: {e}"))),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            // Different types: order by type discriminant
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Text(v) => v.hash(state),
            // BigDecimal does not implement Hash; the normalized text is a
            // canonical representation consistent with Eq.
            Value::Number(v) => v.normalized().to_string().hash(state),
            Value::Date(v) => v.hash(state),
        }
    }
}

impl Value {
    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::Date(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::number(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Value::Number(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}
