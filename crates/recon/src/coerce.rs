//! Typed field coercion.
//!
//! Source adapters hand over loosely typed values (mostly text). Every
//! declared field is converted to its semantic type here. Coercion never
//! fails: empty or malformed input becomes [`Value::Absent`] so one bad cell
//! cannot abort an import.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::{RawFields, Record, Value};
use crate::schema::TableSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Whole number. Reals truncate toward zero.
    Integer,
    /// Finite decimal. Accepts a trailing `%` and `,` thousands separators.
    Real,
    /// Text. Numbers render as decimal text.
    Text,
    /// Boolean flag stored as 0/1.
    Flag,
    /// Unix seconds, from an integer or a calendar date.
    UnixTime,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

impl Conversion {
    /// Map a declared SQL column type to a conversion using SQLite's
    /// affinity rules. Blob and untyped columns are handled as text.
    pub fn from_affinity(decl_type: &str) -> Self {
        let t = decl_type.to_ascii_uppercase();
        if t.contains("INT") {
            Self::Integer
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            Self::Text
        } else if t.contains("BLOB") || t.is_empty() {
            Self::Text
        } else {
            Self::Real
        }
    }

    /// Convert one raw value. `None` means the conversion failed.
    pub fn apply(&self, raw: &Value) -> Option<Value> {
        match (self, raw) {
            (_, Value::Absent) => Some(Value::Absent),

            (Self::Integer, Value::Int(i)) => Some(Value::Int(*i)),
            (Self::Integer, Value::Real(f)) => truncate(*f).map(Value::Int),
            (Self::Integer, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Int),

            (Self::Real, Value::Int(i)) => Some(Value::Real(*i as f64)),
            (Self::Real, Value::Real(f)) => f.is_finite().then_some(Value::Real(*f)),
            (Self::Real, Value::Text(s)) => parse_real(s).map(Value::Real),

            (Self::Text, Value::Text(s)) => Some(Value::Text(s.clone())),
            (Self::Text, Value::Int(i)) => Some(Value::Text(i.to_string())),
            (Self::Text, Value::Real(f)) => Some(Value::Text(f.to_string())),

            (Self::Flag, Value::Int(i @ (0 | 1))) => Some(Value::Int(*i)),
            (Self::Flag, Value::Int(_)) => None,
            (Self::Flag, Value::Real(f)) => match *f {
                f if f == 0.0 => Some(Value::Int(0)),
                f if f == 1.0 => Some(Value::Int(1)),
                _ => None,
            },
            (Self::Flag, Value::Text(s)) => parse_flag(s).map(Value::Int),

            (Self::UnixTime, Value::Int(i)) => Some(Value::Int(*i)),
            (Self::UnixTime, Value::Real(f)) => truncate(*f).map(Value::Int),
            (Self::UnixTime, Value::Text(s)) => parse_unix_time(s).map(Value::Int),
        }
    }
}

fn truncate(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn parse_real(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim_end();
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_flag(s: &str) -> Option<i64> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(1),
        "0" | "false" | "no" | "n" => Some(0),
        _ => None,
    }
}

fn parse_unix_time(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        }
    }
    None
}

/// Coerce `fields[key]` with `conversion`.
///
/// A missing key, an absent value, blank text and a failed conversion all
/// yield [`Value::Absent`].
pub fn coerce(fields: &RawFields, key: &str, conversion: Conversion) -> Value {
    let Some(raw) = fields.get(key) else {
        return Value::Absent;
    };
    if matches!(raw, Value::Text(s) if s.trim().is_empty()) {
        return Value::Absent;
    }
    match conversion.apply(raw) {
        Some(value) => value,
        None => {
            tracing::debug!(field = key, raw = %raw, ?conversion, "coercion failed, treating as absent");
            Value::Absent
        }
    }
}

/// Coerce every field of `fields` that the live schema knows about.
///
/// Keys outside the schema are dropped. Columns the source did not mention
/// stay missing from the record.
pub fn coerce_record(fields: &RawFields, schema: &TableSchema) -> Record {
    let mut record = Record::new(schema.kind());
    for column in schema.columns() {
        if fields.contains_key(&column.name) {
            record.set(&column.name, coerce(fields, &column.name, column.conversion));
        }
    }
    for key in fields.keys().filter(|k| schema.column(k).is_none()) {
        tracing::trace!(field = %key, table = schema.table(), "dropping field unknown to the store");
    }
    record
}
