//! Typed scalar values handed to the escaping primitive.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// A scalar value in a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Raw bytes
    Blob(Vec<u8>),
    /// Boolean
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Float
    Float(f64),
    /// Integer
    Int(i64),
    /// String
    String(String),
    /// Time of day
    Time(NaiveTime),
    /// Date and time without zone
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form used when a value becomes a search term.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Float(f) => f.to_string(),
            Value::Int(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        }
    }

    /// Convert the value to the declared column type where that is lossless.
    ///
    /// Values that can't be converted are returned unchanged; the target
    /// engine reports any real mismatch.
    pub fn coerce(self, column_type: ColumnType) -> Value {
        match (column_type, self) {
            (_, Value::Null) => Value::Null,
            (ColumnType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => Value::String(s),
            },
            (ColumnType::Integer, Value::Bool(b)) => Value::Int(b as i64),
            (ColumnType::Float, Value::Int(n)) => Value::Float(n as f64),
            (ColumnType::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            },
            (ColumnType::Boolean, Value::Int(n)) if n == 0 || n == 1 => Value::Bool(n == 1),
            (ColumnType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Value::Bool(true),
                "false" | "f" | "0" | "no" => Value::Bool(false),
                _ => Value::String(s),
            },
            (ColumnType::String | ColumnType::Text, v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
                Value::String(v.as_text())
            }
            (ColumnType::Date, Value::String(s)) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => Value::Date(d),
                Err(_) => Value::String(s),
            },
            (ColumnType::Date, Value::Timestamp(ts)) => Value::Date(ts.date()),
            (ColumnType::Time, Value::String(s)) => match parse_time(s.trim()) {
                Some(t) => Value::Time(t),
                None => Value::String(s),
            },
            (ColumnType::Timestamp, Value::String(s)) => match parse_timestamp(s.trim()) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::String(s),
            },
            (ColumnType::Timestamp, Value::Date(d)) => Value::Timestamp(d.and_time(NaiveTime::default())),
            (ColumnType::Blob, Value::String(s)) => Value::Blob(s.into_bytes()),
            (_, v) => v,
        }
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::default()))
        })
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Blob(b) => write!(f, "x'{}'", hex::encode(b)),
            Value::String(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.as_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
