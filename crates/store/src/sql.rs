//! Conversions between engine values and SQLite values.

use lotledger_recon::Value;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlOwned, ValueRef};

/// Borrowing adapter so engine values can be bound as statement parameters.
pub struct SqlValue<'a>(pub &'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Absent => ToSqlOutput::Owned(SqlOwned::Null),
            Value::Int(i) => ToSqlOutput::Owned(SqlOwned::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlOwned::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Read a column value. Blobs come back as lossily decoded text.
pub fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Absent,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn values_survive_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        for value in [Value::Absent, Value::Int(-4), Value::Real(2.5), Value::text("a:b")] {
            let back = conn
                .query_row("SELECT ?1", [SqlValue(&value)], |row| Ok(value_from_ref(row.get_ref(0)?)))
                .unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn blobs_decode_as_text() {
        assert_eq!(value_from_ref(ValueRef::Blob(b"caf\xc3\xa9")), Value::text("café"));
    }

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("n_bids"), "\"n_bids\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
