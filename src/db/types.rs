//! Row to JSON conversion.
//!
//! Column values are coerced to the JSON types the protocol can carry:
//! numbers, strings, booleans and null.
//!
//! A column is first mapped to a [`TypeCategory`] from its type name, then
//! decoded by the backend module. Anything that fails its category's decoder
//! falls back to text, and then to null.

use crate::db::pool::Backend;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::types::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row as _, Type, TypeInfo, ValueRef};

/// One result row: column name to coerced value.
pub type Row = serde_json::Map<String, JsonValue>;

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
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, backend: Backend) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        return match backend {
            Backend::Postgres => TypeCategory::Decimal,
            Backend::Sqlite => TypeCategory::Float,
        };
    }

    if lower == "null" {
        return TypeCategory::Null;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
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

    if lower.starts_with("timestamp") || lower == "date" || lower.starts_with("time") {
        return TypeCategory::Temporal;
    }

    if lower == "text" || lower.contains("char") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Raw NUMERIC value as text, preserving the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        matches!(categorize_type(ty.name(), Backend::Postgres), TypeCategory::Decimal)
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        // Simple-protocol results arrive as text, prepared ones as binary digits.
        match value.format() {
            PgValueFormat::Text => {
                <&str as Decode<sqlx::Postgres>>::decode(value).map(|text| RawDecimal(text.to_owned()))
            }
            PgValueFormat::Binary => {
                <Decimal as Decode<sqlx::Postgres>>::decode(value).map(|d| RawDecimal(d.to_string()))
            }
        }
    }
}

/// Binary column as JSON: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    JsonValue::String(match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => STANDARD.encode(bytes),
    })
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Non-null value at `idx` decoded as `T`, or `None`.
fn value<'r, R, T>(row: &'r R, idx: usize) -> Option<T>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, usize>(idx).ok().flatten()
}

/// Conversion of a driver row into a [`Row`].
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), Backend::Postgres);
                let value = postgres::decode_column(self, col.ordinal(), category);
                (col.name().to_owned(), value)
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .map(|col| {
                let idx = col.ordinal();
                // The stored value's type decides; expressions have no declared type.
                let stored = self
                    .try_get_raw(idx)
                    .map(|raw| raw.type_info().name().to_owned())
                    .unwrap_or_else(|_| col.type_info().name().to_owned());
                let category = categorize_type(&stored, Backend::Sqlite);
                (col.name().to_owned(), sqlite::decode_column(self, idx, category))
            })
            .collect()
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        if row.try_get_raw(idx).map_or(true, |raw| raw.is_null()) {
            return JsonValue::Null;
        }

        let decoded = match category {
            TypeCategory::Decimal => value::<_, RawDecimal>(row, idx).map(|d| JsonValue::String(d.0)),
            TypeCategory::Integer => value::<_, i16>(row, idx)
                .map(i64::from)
                .or_else(|| value::<_, i32>(row, idx).map(i64::from))
                .or_else(|| value::<_, i64>(row, idx))
                .map(JsonValue::from),
            TypeCategory::Float => value::<_, f64>(row, idx)
                .or_else(|| value::<_, f32>(row, idx).map(f64::from))
                .map(float_value),
            TypeCategory::Boolean => value::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Binary => value::<_, Vec<u8>>(row, idx).map(|b| decode_binary_value(&b)),
            TypeCategory::Json => value::<_, JsonValue>(row, idx),
            TypeCategory::Uuid => value::<_, uuid::Uuid>(row, idx).map(|u| JsonValue::String(u.to_string())),
            TypeCategory::Temporal => temporal(row, idx).map(JsonValue::String),
            _ => None,
        };

        decoded
            .or_else(|| value::<_, String>(row, idx).map(JsonValue::String))
            .unwrap_or_else(|| {
                tracing::debug!(column = idx, ?category, "Undecodable value, returning null");
                JsonValue::Null
            })
    }

    fn temporal(row: &PgRow, idx: usize) -> Option<String> {
        value::<_, DateTime<Utc>>(row, idx)
            .map(|v| v.to_rfc3339())
            .or_else(|| value::<_, NaiveDateTime>(row, idx).map(|v| v.to_string()))
            .or_else(|| value::<_, NaiveDate>(row, idx).map(|v| v.to_string()))
            .or_else(|| value::<_, NaiveTime>(row, idx).map(|v| v.to_string()))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        let decoded = match category {
            TypeCategory::Null => return JsonValue::Null,
            TypeCategory::Integer => value::<_, i64>(row, idx).map(JsonValue::from),
            TypeCategory::Float | TypeCategory::Decimal => value::<_, f64>(row, idx).map(float_value),
            TypeCategory::Boolean => value::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Binary => value::<_, Vec<u8>>(row, idx).map(|b| decode_binary_value(&b)),
            _ => None,
        };

        decoded
            .or_else(|| {
                row.try_get_unchecked::<Option<String>, _>(idx)
                    .ok()
                    .flatten()
                    .map(JsonValue::String)
            })
            .unwrap_or(JsonValue::Null)
    }
}
