//! Database-agnostic type mappings.
//!
//! This module maps database-specific column values onto [`FieldValue`].
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! A decoder that cannot read a value as its category's type falls back to
//! text and then to raw bytes, so an unusual column never aborts a load.

use crate::models::{DriverKind, FieldValue, Record};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, driver: DriverKind) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if driver == DriverKind::Sqlite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "interval" {
        return TypeCategory::Text;
    }

    if lower.contains("date") || lower.contains("time") {
        return TypeCategory::Temporal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
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

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "enum" || lower == "set" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

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
// Row to Record Trait
// =============================================================================

/// Trait for converting database rows to records.
pub trait RowToRecord {
    fn to_record(&self) -> Record;
}

fn float_value(v: f64) -> FieldValue {
    FieldValue::Float(v)
}

/// Text when the bytes are UTF-8, raw bytes otherwise.
fn text_or_bytes(bytes: Vec<u8>) -> FieldValue {
    match String::from_utf8(bytes) {
        Ok(s) => FieldValue::Text(s),
        Err(e) => FieldValue::Bytes(e.into_bytes()),
    }
}

impl RowToRecord for MySqlRow {
    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DriverKind::MySql);
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowToRecord for PgRow {
    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DriverKind::Postgres);
                (col.name().to_string(), postgres::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl RowToRecord for SqliteRow {
    fn to_record(&self) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DriverKind::Sqlite);
                (col.name().to_string(), sqlite::decode_column(self, idx, category))
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> FieldValue {
        if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
            return FieldValue::Null;
        }
        let decoded = match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(FieldValue::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).ok().map(FieldValue::Bytes),
            TypeCategory::Json => row.try_get::<serde_json::Value, _>(idx).ok().map(FieldValue::Json),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => None,
        };
        decoded.unwrap_or_else(|| decode_fallback(row, idx))
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Option<FieldValue> {
        match row.try_get::<RawDecimal, _>(idx) {
            Ok(v) => Some(FieldValue::Text(v.0)),
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                None
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<FieldValue> {
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(FieldValue::Int(v));
        }
        if let Ok(v) = row.try_get::<u8, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        // BIGINT UNSIGNED beyond i64 keeps its digits as text
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Some(
                i64::try_from(v)
                    .map(FieldValue::Int)
                    .unwrap_or_else(|_| FieldValue::Text(v.to_string())),
            );
        }
        None
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Option<FieldValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_value(v));
        }
        row.try_get::<f32, _>(idx).ok().map(|v| float_value(v.into()))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Option<FieldValue> {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(FieldValue::Text(v.to_string()));
        }
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Some(FieldValue::Text(v.naive_utc().to_string()));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Some(FieldValue::Text(v.to_string()));
        }
        row.try_get::<NaiveTime, _>(idx)
            .ok()
            .map(|v| FieldValue::Text(v.to_string()))
    }

    fn decode_fallback(row: &MySqlRow, idx: usize) -> FieldValue {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return FieldValue::Text(v);
        }
        row.try_get::<Vec<u8>, _>(idx)
            .map(text_or_bytes)
            .unwrap_or(FieldValue::Null)
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> FieldValue {
        if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
            return FieldValue::Null;
        }
        let decoded = match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(FieldValue::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).ok().map(FieldValue::Bytes),
            TypeCategory::Json => row.try_get::<serde_json::Value, _>(idx).ok().map(FieldValue::Json),
            TypeCategory::Uuid => row
                .try_get::<sqlx::types::Uuid, _>(idx)
                .ok()
                .map(|v| FieldValue::Text(v.to_string())),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => None,
        };
        decoded.unwrap_or_else(|| decode_fallback(row, idx))
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Option<FieldValue> {
        match row.try_get::<RawDecimal, _>(idx) {
            Ok(v) => Some(FieldValue::Text(v.0)),
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                None
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<FieldValue> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(FieldValue::Int(v.into()));
        }
        row.try_get::<i64, _>(idx).ok().map(FieldValue::Int)
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<FieldValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_value(v));
        }
        row.try_get::<f32, _>(idx).ok().map(|v| float_value(v.into()))
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Option<FieldValue> {
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Some(FieldValue::Text(v.to_rfc3339()));
        }
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(FieldValue::Text(v.to_string()));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Some(FieldValue::Text(v.to_string()));
        }
        row.try_get::<NaiveTime, _>(idx)
            .ok()
            .map(|v| FieldValue::Text(v.to_string()))
    }

    fn decode_fallback(row: &PgRow, idx: usize) -> FieldValue {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return FieldValue::Text(v);
        }
        row.try_get::<Vec<u8>, _>(idx)
            .map(FieldValue::Bytes)
            .unwrap_or(FieldValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> FieldValue {
        if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
            return FieldValue::Null;
        }
        // Declared types only map to an affinity; the stored value decides
        let decoded = match category {
            TypeCategory::Integer => row.try_get::<i64, _>(idx).ok().map(FieldValue::Int),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(FieldValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => {
                row.try_get::<f64, _>(idx).ok().map(float_value)
            }
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).ok().map(FieldValue::Bytes),
            _ => None,
        };
        decoded.unwrap_or_else(|| decode_fallback(row, idx))
    }

    fn decode_fallback(row: &SqliteRow, idx: usize) -> FieldValue {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return FieldValue::Int(v);
        }
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return float_value(v);
        }
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return FieldValue::Text(v);
        }
        row.try_get::<Vec<u8>, _>(idx)
            .map(text_or_bytes)
            .unwrap_or(FieldValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::executor::do_sql;
    use crate::db::pool::ConnectionHandle;
    use crate::models::AccessorConfig;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(categorize_type("INT", DriverKind::MySql), TypeCategory::Integer);
        assert_eq!(
            categorize_type("BIGINT", DriverKind::Postgres),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", DriverKind::MySql),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DriverKind::Postgres),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DriverKind::MySql),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DriverKind::Postgres),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DriverKind::Sqlite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal_and_text() {
        assert_eq!(
            categorize_type("DATETIME", DriverKind::MySql),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DriverKind::Postgres),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("INTERVAL", DriverKind::Postgres),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("VARCHAR", DriverKind::MySql),
            TypeCategory::Text
        );
        assert_eq!(categorize_type("jsonb", DriverKind::Postgres), TypeCategory::Json);
        assert_eq!(categorize_type("BLOB", DriverKind::Sqlite), TypeCategory::Binary);
        assert_eq!(
            categorize_type("geometry", DriverKind::MySql),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_text_or_bytes() {
        assert_eq!(text_or_bytes(b"abc".to_vec()), FieldValue::Text("abc".into()));
        assert_eq!(
            text_or_bytes(vec![0xFF, 0xFE]),
            FieldValue::Bytes(vec![0xFF, 0xFE])
        );
    }

    #[tokio::test]
    async fn test_sqlite_row_decoding() {
        let source = AccessorConfig::new("sqlite", "localhost", ":memory:")
            .validate()
            .unwrap();
        let handle = ConnectionHandle::open(&source).await.unwrap();
        do_sql(
            &handle,
            "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, flag BOOLEAN, doc JSON, n TEXT)",
        )
        .await
        .unwrap();
        do_sql(
            &handle,
            "INSERT INTO t VALUES (7, 1.5, 'x', X'00FF', 1, '{\"a\":1}', NULL)",
        )
        .await
        .unwrap();

        let result = do_sql(&handle, "SELECT i, r, s, b, flag, doc, n FROM t")
            .await
            .unwrap();
        let row = result.into_first_row().unwrap();
        assert_eq!(row["i"], FieldValue::Int(7));
        assert_eq!(row["r"], FieldValue::Float(1.5));
        assert_eq!(row["s"], FieldValue::Text("x".into()));
        assert_eq!(row["b"], FieldValue::Bytes(vec![0x00, 0xFF]));
        assert_eq!(row["flag"], FieldValue::Bool(true));
        // JSON has numeric affinity in SQLite, so the document stays text
        assert_eq!(row["doc"], FieldValue::Text("{\"a\":1}".into()));
        assert_eq!(row["n"], FieldValue::Null);
    }

    #[tokio::test]
    async fn test_sqlite_affinity_mismatch_falls_back() {
        let source = AccessorConfig::new("sqlite", "localhost", ":memory:")
            .validate()
            .unwrap();
        let handle = ConnectionHandle::open(&source).await.unwrap();
        do_sql(&handle, "CREATE TABLE t (i INTEGER)").await.unwrap();
        do_sql(&handle, "INSERT INTO t VALUES ('not a number')")
            .await
            .unwrap();

        let result = do_sql(&handle, "SELECT i FROM t").await.unwrap();
        assert_eq!(
            result.into_first_row().unwrap()["i"],
            FieldValue::Text("not a number".into())
        );
    }
}
