//! `lotledger show`: print one stored row as JSON.

use std::collections::BTreeMap;

use lotledger_recon::image_paths;
use lotledger_recon::schema::IMAGE_PATHS_FIELD;
use lotledger_recon::{coerce, Conversion, EntityKind, RawFields, Record, Value};
use serde::Serialize;

use crate::app::App;
use crate::exit_codes::EXIT_STORE_NOT_FOUND;
use crate::CliError;

pub fn cmd_show(app: &App, kind: EntityKind, id: &str) -> Result<(), CliError> {
    let identity = parse_identity(kind, id)?;
    let record = app
        .store
        .get(kind, &identity)
        .map_err(CliError::store)?
        .ok_or_else(|| CliError {
            code: EXIT_STORE_NOT_FOUND,
            message: format!("no {} with {} {}", kind, kind.identity_field(), id),
            hint: None,
        })?;

    let out = serde_json::to_string_pretty(&record_json(&record))
        .map_err(|e| CliError::io(format!("failed to serialize {}: {}", kind, e)))?;
    println!("{}", out);
    Ok(())
}

/// The identity typed the way its column stores it.
fn parse_identity(kind: EntityKind, raw: &str) -> Result<Value, CliError> {
    let field = kind.identity_field();
    let conversion = kind.field(field).map(|f| f.conversion).unwrap_or(Conversion::Text);
    let mut fields = RawFields::new();
    fields.insert(field.to_string(), Value::text(raw));
    match coerce(&fields, field, conversion) {
        Value::Absent => Err(CliError::args(format!("invalid {}: {:?}", field, raw))),
        value => Ok(value),
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Field<'a> {
    Paths(Vec<String>),
    Value(&'a Value),
}

/// Column name to value, with the image path list decoded.
fn record_json(record: &Record) -> BTreeMap<&str, Field<'_>> {
    record
        .fields()
        .map(|(name, value)| {
            let field = match value {
                Value::Text(s) if name == IMAGE_PATHS_FIELD => Field::Paths(image_paths::split(s)),
                other => Field::Value(other),
            };
            (name, field)
        })
        .collect()
}
