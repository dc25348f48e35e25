//! Field-level record merge.

use std::cmp::Ordering;

use crate::error::MergeError;
use crate::image_paths;
use crate::model::{Record, Value};
use crate::schema::TableSchema;

/// Merge `incoming` on top of `base`, field by field, over the live columns
/// of `schema`. Fields the schema does not list are dropped.
pub fn merge(base: &Record, incoming: &Record, schema: &TableSchema) -> Result<Record, MergeError> {
    let mut merged = Record::new(schema.kind());
    for column in schema.columns() {
        let name = column.name.as_str();
        let b = base.value(name);
        let i = incoming.value(name);
        let value = if name == schema.identity_field() {
            merge_identity(schema, b, i)?
        } else if column.is_path_list() {
            merge_path_list(name, b, i)?
        } else {
            merge_value(name, b, i)?
        };
        merged.set(name, value);
    }
    Ok(merged)
}

/// Merge one pair of values.
///
/// 1. base absent: take incoming (which may itself be absent)
/// 2. incoming absent: keep base
/// 3. both numeric: the larger; ties keep base
/// 4. different types: [`MergeError::TypeConflict`]
/// 5. both text: incoming
pub fn merge_value(field: &str, base: &Value, incoming: &Value) -> Result<Value, MergeError> {
    if base.is_absent() {
        return Ok(incoming.clone());
    }
    if incoming.is_absent() {
        return Ok(base.clone());
    }
    if base.is_numeric() && incoming.is_numeric() {
        return Ok(match incoming.numeric_cmp(base) {
            Some(Ordering::Greater) => incoming.clone(),
            _ => base.clone(),
        });
    }
    match (base, incoming) {
        (Value::Text(_), Value::Text(_)) => Ok(incoming.clone()),
        _ => Err(conflict(field, base, incoming)),
    }
}

fn merge_path_list(field: &str, base: &Value, incoming: &Value) -> Result<Value, MergeError> {
    match (base, incoming) {
        (Value::Text(b), Value::Text(i)) => Ok(Value::Text(image_paths::union(b, i))),
        _ => merge_value(field, base, incoming),
    }
}

/// The identity is immutable: keep base's, adopt incoming's only when base
/// has none.
fn merge_identity(schema: &TableSchema, base: &Value, incoming: &Value) -> Result<Value, MergeError> {
    if base.is_absent() {
        return Ok(incoming.clone());
    }
    if incoming.is_absent() || same_identity(base, incoming) {
        return Ok(base.clone());
    }
    Err(MergeError::IdentityMismatch {
        kind: schema.kind(),
        base: base.clone(),
        incoming: incoming.clone(),
    })
}

fn same_identity(a: &Value, b: &Value) -> bool {
    match a.numeric_cmp(b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

fn conflict(field: &str, base: &Value, incoming: &Value) -> MergeError {
    MergeError::TypeConflict {
        field: field.to_string(),
        base: base.clone(),
        incoming: incoming.clone(),
    }
}
