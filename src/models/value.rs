//! Tagged values exchanged with the driver.
//!
//! A [`Value`] is what callers bind to a prepared statement and what a result
//! set stores in each cell. It is deliberately small: SQL NULL, a number, or
//! text. Backend types outside that set (dates, JSON, UUIDs, ...) arrive as
//! text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric cell or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
}

impl Number {
    /// Integer view of the number. Floats convert only when they hold an
    /// integral value inside the i64 range.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Float(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
                Some(v as i64)
            }
            Self::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Int(_) => true,
            Self::Float(v) => v.is_finite(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! number_from_int {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Number {
                fn from(v: $t) -> Self {
                    Self::Int(v as i64)
                }
            }
        )+
    };
}

number_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Number {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(Self::Int)
            .unwrap_or(Self::Float(v as f64))
    }
}

impl From<f32> for Number {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// A cell value or a bound parameter value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    Number(Number),
    Text(String),
}

impl Value {
    /// Check if this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }

    /// Numeric view. Text never parses into a number.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Textual view. Numbers render in their display form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! value_from_number {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::Number(v.into())
                }
            }
        )+
    };
}

value_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, Number);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Option<&str>> for Value {
    fn from(v: Option<&str>) -> Self {
        v.map(Value::from).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(42).type_name(), "number");
        assert_eq!(Value::from("hello").type_name(), "text");
        assert_eq!(Value::from(None::<&str>), Value::Null);
    }

    #[test]
    fn test_number_text_coercion() {
        assert_eq!(Value::from(30).to_text(), Some("30".to_string()));
        assert_eq!(Value::from(2.5).to_text(), Some("2.5".to_string()));
        assert_eq!(Value::from("30").as_number(), None);
        assert_eq!(Value::Null.to_text(), None);
    }

    #[test]
    fn test_number_conversions() {
        assert_eq!(Number::from(7u8), Number::Int(7));
        assert_eq!(Number::from(u64::MAX).as_i64(), None);
        assert_eq!(Number::Float(12.0).as_i64(), Some(12));
        assert_eq!(Number::Float(12.5).as_i64(), None);
        assert_eq!(Number::Int(3).as_f64(), 3.0);
        assert!(!Number::Float(f64::NAN).is_finite());
    }

    #[test]
    fn test_value_serializes_untagged() {
        let row = vec![Value::from(1), Value::from("John Smith"), Value::Null];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[1,"John Smith",null]"#);
    }
}
