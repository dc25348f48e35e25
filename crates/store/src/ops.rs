//! Operations that run inside a gateway transaction.
//!
//! Each takes a plain `&Connection` so they nest under [`crate::Tx`] and
//! compose within a single transaction.

use lotledger_recon::{Column, EntityKind, MergeError, Record, TableSchema, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::sql::{quote_ident, value_from_ref, SqlValue};

const SETTINGS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Create every table that does not exist yet.
pub fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    for kind in [EntityKind::Listing, EntityKind::Profile] {
        conn.execute_batch(&kind.create_table_sql())?;
    }
    conn.execute_batch(SETTINGS_DDL)?;
    Ok(())
}

/// Read the live column set of `kind`'s table.
pub fn table_schema(conn: &Connection, kind: EntityKind) -> Result<TableSchema, StoreError> {
    let mut stmt = conn.prepare(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1)"#,
    )?;
    let columns = stmt
        .query_map([kind.table()], |row| {
            let name: String = row.get(0)?;
            let decl_type: String = row.get(1)?;
            let not_null: bool = row.get(2)?;
            let default: Option<String> = row.get(3)?;
            let pk: i64 = row.get(4)?;
            Ok(Column::introspected(kind, &name, &decl_type, not_null, pk > 0, default.as_deref()))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(StoreError::MissingTable(kind.table().to_string()));
    }
    Ok(TableSchema::new(kind, columns))
}

/// Fetch the stored row for `identity`, every live column included.
/// NULL columns come back present and [`Value::Absent`].
pub fn fetch_record(
    conn: &Connection,
    schema: &TableSchema,
    identity: &Value,
) -> Result<Option<Record>, StoreError> {
    let columns: Vec<String> = schema.column_names().map(quote_ident).collect();
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        columns.join(", "),
        quote_ident(schema.table()),
        quote_ident(schema.identity_field()),
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([SqlValue(identity)])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut record = Record::new(schema.kind());
    for (i, column) in schema.columns().iter().enumerate() {
        record.set(&column.name, value_from_ref(row.get_ref(i)?));
    }
    Ok(Some(record))
}

/// Replace the stored row with `record`: delete by identity, then insert
/// every live column.
pub fn replace_record(conn: &Connection, schema: &TableSchema, record: &Record) -> Result<(), StoreError> {
    let identity = record
        .identity()
        .ok_or(MergeError::MissingIdentity { kind: schema.kind() })?;
    let table = quote_ident(schema.table());

    conn.execute(
        &format!("DELETE FROM {table} WHERE {} = ?1", quote_ident(schema.identity_field())),
        [SqlValue(identity)],
    )?;

    let columns: Vec<String> = schema.column_names().map(quote_ident).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", "),
    );
    let values = schema.columns().iter().map(|c| SqlValue(record.value(&c.name)));
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

/// Make sure a profile row exists for `profile_id`. Returns true when one
/// was created.
pub fn ensure_profile_stub(conn: &Connection, profile_id: &str) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO profiles (profile_id) VALUES (?1)",
        [profile_id],
    )?;
    Ok(changed > 0)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub fn put_setting(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotledger_recon::Conversion;

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn introspection_matches_declared_schema() {
        let conn = db();
        for kind in [EntityKind::Listing, EntityKind::Profile] {
            let live = table_schema(&conn, kind).unwrap();
            assert_eq!(live, TableSchema::declared(kind), "{kind}");
        }
    }

    #[test]
    fn introspection_sees_added_columns() {
        let conn = db();
        conn.execute_batch("ALTER TABLE listings ADD COLUMN watchers INTEGER").unwrap();
        let live = table_schema(&conn, EntityKind::Listing).unwrap();
        let col = live.column("watchers").unwrap();
        assert_eq!(col.conversion, Conversion::Integer);
        assert!(!col.not_null);
    }

    #[test]
    fn missing_table_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        let err = table_schema(&conn, EntityKind::Profile).unwrap_err();
        assert!(matches!(err, StoreError::MissingTable(t) if t == "profiles"));
    }

    #[test]
    fn replace_then_fetch() {
        let conn = db();
        let schema = table_schema(&conn, EntityKind::Listing).unwrap();
        let record = Record::new(EntityKind::Listing)
            .with("listing_id", 42)
            .with("title", "Brass lamp")
            .with("price", 12.5)
            .with("image_paths", "");
        replace_record(&conn, &schema, &record).unwrap();
        replace_record(&conn, &schema, &record.clone().with("n_bids", 2)).unwrap();

        let count: i64 = conn.query_row("SELECT count(*) FROM listings", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);

        let stored = fetch_record(&conn, &schema, &Value::Int(42)).unwrap().unwrap();
        assert_eq!(stored.value("title"), &Value::text("Brass lamp"));
        assert_eq!(stored.value("n_bids"), &Value::Int(2));
        assert_eq!(stored.get("winner"), Some(&Value::Absent));
        assert_eq!(stored.len(), schema.columns().len());
    }

    #[test]
    fn fetch_unknown_identity_is_none() {
        let conn = db();
        let schema = table_schema(&conn, EntityKind::Profile).unwrap();
        assert!(fetch_record(&conn, &schema, &Value::text("nobody")).unwrap().is_none());
    }

    #[test]
    fn replace_without_identity_fails() {
        let conn = db();
        let schema = table_schema(&conn, EntityKind::Profile).unwrap();
        let err = replace_record(&conn, &schema, &Record::new(EntityKind::Profile)).unwrap_err();
        assert!(matches!(err, StoreError::Merge(MergeError::MissingIdentity { .. })));
    }

    #[test]
    fn profile_stub_is_created_once() {
        let conn = db();
        assert!(ensure_profile_stub(&conn, "bob").unwrap());
        assert!(!ensure_profile_stub(&conn, "bob").unwrap());
        let contacted: i64 = conn
            .query_row("SELECT contacted FROM profiles WHERE profile_id = 'bob'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(contacted, 0);
    }

    #[test]
    fn settings_round_trip() {
        let conn = db();
        assert_eq!(get_setting(&conn, "image_location").unwrap(), None);
        put_setting(&conn, "image_location", "/tmp/a").unwrap();
        put_setting(&conn, "image_location", "/tmp/b").unwrap();
        assert_eq!(get_setting(&conn, "image_location").unwrap().as_deref(), Some("/tmp/b"));
    }
}
