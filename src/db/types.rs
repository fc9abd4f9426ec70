//! Mapping from backend column types onto driver [`Value`]s.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Backend-specific decoders handle the actual value extraction
//!
//! A driver value is NULL, a number or text, so everything that is neither
//! (dates, JSON, UUIDs, binary) is rendered as text.

use crate::models::{ColumnMetadata, Number, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Binary,
    Json,
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    // Exact names: "interval", "point" and "int4range" contain "int" too.
    let base = lower.strip_suffix(" unsigned").unwrap_or(&lower);
    if matches!(
        base,
        "tinyint"
            | "smallint"
            | "mediumint"
            | "int"
            | "integer"
            | "bigint"
            | "int2"
            | "int4"
            | "int8"
            | "smallserial"
            | "serial"
            | "bigserial"
            | "serial2"
            | "serial4"
            | "serial8"
            | "year"
    ) {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower == "date" || lower == "interval" || lower.contains("time") {
        return TypeCategory::Temporal;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // varchar, text, char, enum, set, ...
    TypeCategory::Unknown
}

/// Column metadata for a row description (also available for empty results).
pub fn column_metadata<C: Column>(columns: &[C]) -> Vec<ColumnMetadata> {
    columns
        .iter()
        .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
        .collect()
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl RawDecimal {
    /// Integral decimals that fit become integers; the rest become floats.
    /// Values that do not parse at all stay textual.
    pub fn into_value(self) -> Value {
        if let Ok(v) = self.0.parse::<i64>() {
            return Value::Number(Number::Int(v));
        }
        match self.0.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::Number(Number::Float(v)),
            _ => Value::Text(self.0),
        }
    }
}

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Render binary data as text: UTF-8 when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> Value {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => Value::Text(s.to_string()),
        Err(_) => Value::Text(STANDARD.encode(bytes)),
    }
}

fn float_value(v: f64) -> Value {
    Value::Number(Number::Float(v))
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Trait for converting backend rows into driver values.
pub trait RowToValues {
    fn to_values(&self) -> Vec<Value>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

impl RowToValues for MySqlRow {
    fn to_values(&self) -> Vec<Value> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                mysql::decode_column(self, idx, type_name, categorize_type(type_name))
            })
            .collect()
    }

    fn column_metadata(&self) -> Vec<ColumnMetadata> {
        column_metadata(self.columns())
    }
}

impl RowToValues for PgRow {
    fn to_values(&self) -> Vec<Value> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                postgres::decode_column(self, idx, type_name, categorize_type(type_name))
            })
            .collect()
    }

    fn column_metadata(&self) -> Vec<ColumnMetadata> {
        column_metadata(self.columns())
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx, type_name),
            TypeCategory::Integer => decode_integer(row, idx, type_name),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => v.into_value(),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::error!("Failed to decode {}: {:?}", type_name, e);
                Value::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
        // Check NULL first
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return v.into();
        }
        decode_text(row, idx, type_name)
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        Value::Null
    }

    fn decode_temporal(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Value::Text(v.naive_utc().to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Value::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Value::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Value::Text(v.to_string());
        }
        // out-of-range TIME values
        decode_text(row, idx, type_name)
    }

    fn decode_binary_col(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => v.map(Value::Text).unwrap_or(Value::Null),
            Err(_) => match row.try_get_unchecked::<Option<String>, _>(idx) {
                Ok(v) => v.map(Value::Text).unwrap_or(Value::Null),
                Err(e) => {
                    tracing::warn!("Cannot render {} column {} as text: {}", type_name, idx, e);
                    Value::Null
                }
            },
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::ValueRef as _;
    use sqlx::postgres::PgValueFormat;
    use sqlx::postgres::types::PgInterval;

    pub fn decode_column(row: &PgRow, idx: usize, type_name: &str, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx, type_name),
            TypeCategory::Integer => decode_integer(row, idx, type_name),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx, type_name),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize, type_name: &str) -> Value {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => v.into_value(),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::error!("Failed to decode {}: {:?}", type_name, e);
                Value::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize, type_name: &str) -> Value {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return v.into();
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return v.into();
        }
        decode_text(row, idx, type_name)
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        Value::Null
    }

    fn decode_temporal(row: &PgRow, idx: usize, type_name: &str) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Value::Text(v.to_rfc3339());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Value::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Value::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Value::Text(v.to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<PgInterval>, _>(idx) {
            return Value::Text(format_interval(&v));
        }
        // timetz
        decode_text(row, idx, type_name)
    }

    fn decode_binary_col(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| decode_binary_value(&v))
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &PgRow, idx: usize, type_name: &str) -> Value {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => v.map(Value::Text).unwrap_or(Value::Null),
            Err(_) => decode_raw(row, idx, type_name),
        }
    }

    /// Types without a decoder: text-format values come as the server printed
    /// them, binary-format values go through [`decode_binary_value`].
    fn decode_raw(row: &PgRow, idx: usize, type_name: &str) -> Value {
        let raw = match row.try_get_raw(idx) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Cannot read {} column {}: {}", type_name, idx, e);
                return Value::Null;
            }
        };
        if raw.is_null() {
            return Value::Null;
        }
        let value = match raw.format() {
            PgValueFormat::Text => raw.as_str().map(|s| Value::Text(s.to_string())),
            PgValueFormat::Binary => raw.as_bytes().map(decode_binary_value),
        };
        value.unwrap_or_else(|e| {
            tracing::warn!("Cannot render {} column {} as text: {}", type_name, idx, e);
            Value::Null
        })
    }

    /// Render an interval the way PostgreSQL prints it by default, e.g.
    /// `1 year 2 mons 3 days 04:05:06.5`.
    pub fn format_interval(interval: &PgInterval) -> String {
        fn unit(n: i32, one: &str, many: &str) -> String {
            format!("{} {}", n, if n.abs() == 1 { one } else { many })
        }

        let mut parts = Vec::new();
        let (years, months) = (interval.months / 12, interval.months % 12);
        if years != 0 {
            parts.push(unit(years, "year", "years"));
        }
        if months != 0 {
            parts.push(unit(months, "mon", "mons"));
        }
        if interval.days != 0 {
            parts.push(unit(interval.days, "day", "days"));
        }
        if interval.microseconds != 0 || parts.is_empty() {
            let sign = if interval.microseconds < 0 { "-" } else { "" };
            let micros = interval.microseconds.unsigned_abs();
            let secs = micros / 1_000_000;
            let mut time = format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                secs / 3600,
                secs / 60 % 60,
                secs % 60
            );
            let frac = micros % 1_000_000;
            if frac != 0 {
                time.push_str(format!(".{:06}", frac).trim_end_matches('0'));
            }
            parts.push(time);
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(categorize_type("INT"), TypeCategory::Integer);
        assert_eq!(categorize_type("BIGINT"), TypeCategory::Integer);
        assert_eq!(categorize_type("TINYINT"), TypeCategory::Integer);
        assert_eq!(categorize_type("INT UNSIGNED"), TypeCategory::Integer);
        assert_eq!(categorize_type("INT8"), TypeCategory::Integer);
    }

    #[test]
    fn test_categorize_type_not_integer() {
        assert_eq!(categorize_type("INTERVAL"), TypeCategory::Temporal);
        assert_eq!(categorize_type("POINT"), TypeCategory::Unknown);
        assert_eq!(categorize_type("INT4RANGE"), TypeCategory::Unknown);
        assert_eq!(categorize_type("INT8RANGE"), TypeCategory::Unknown);
        assert_eq!(categorize_type("INT4[]"), TypeCategory::Unknown);
        assert_eq!(categorize_type("BIGINT UNSIGNED"), TypeCategory::Integer);
        assert_eq!(categorize_type("SERIAL4"), TypeCategory::Integer);
        assert_eq!(categorize_type("YEAR"), TypeCategory::Integer);
    }

    #[test]
    fn test_format_interval() {
        use sqlx::postgres::types::PgInterval;

        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(postgres::format_interval(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(
            postgres::format_interval(&interval(14, 3, 14_706_500_000)),
            "1 year 2 mons 3 days 04:05:06.5"
        );
        assert_eq!(postgres::format_interval(&interval(1, 1, 0)), "1 mon 1 day");
        assert_eq!(postgres::format_interval(&interval(0, -2, -90_000_000)), "-2 days -00:01:30");
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(categorize_type("DECIMAL"), TypeCategory::Decimal);
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Decimal);
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(categorize_type("DATETIME"), TypeCategory::Temporal);
        assert_eq!(categorize_type("TIMESTAMPTZ"), TypeCategory::Temporal);
        assert_eq!(categorize_type("DATE"), TypeCategory::Temporal);
        assert_eq!(categorize_type("TIME"), TypeCategory::Temporal);
    }

    #[test]
    fn test_categorize_type_other() {
        assert_eq!(categorize_type("jsonb"), TypeCategory::Json);
        assert_eq!(categorize_type("BYTEA"), TypeCategory::Binary);
        assert_eq!(categorize_type("VARBINARY"), TypeCategory::Binary);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Unknown);
        assert_eq!(categorize_type("uuid"), TypeCategory::Uuid);
    }

    #[test]
    fn test_raw_decimal_into_value() {
        assert_eq!(RawDecimal("42".to_string()).into_value(), Value::from(42));
        assert_eq!(RawDecimal("12.50".to_string()).into_value(), Value::from(12.5));
        assert_eq!(
            RawDecimal("NaN".to_string()).into_value(),
            Value::Text("NaN".to_string())
        );
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(
            decode_binary_value(b"hello world"),
            Value::Text("hello world".to_string())
        );
        assert_eq!(
            decode_binary_value(&[0xFF, 0xFE, 0x00, 0x01]),
            Value::Text("//4AAQ==".to_string())
        );
        assert_eq!(decode_binary_value(&[]), Value::Text(String::new()));
    }
}
