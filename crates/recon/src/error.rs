use thiserror::Error;

use crate::model::{EntityKind, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    /// Both sides hold a value for the field but of incompatible types.
    #[error(
        "field '{field}': cannot merge {base} ({}) with {incoming} ({})",
        .base.type_name(),
        .incoming.type_name()
    )]
    TypeConflict {
        field: String,
        base: Value,
        incoming: Value,
    },
    /// Both sides carry an identity and they disagree.
    #[error("{kind} identity mismatch: {base} vs {incoming}")]
    IdentityMismatch {
        kind: EntityKind,
        base: Value,
        incoming: Value,
    },
    /// The record has no identity value.
    #[error("{kind} record has no identity")]
    MissingIdentity { kind: EntityKind },
    /// A NOT NULL column has neither a value nor a default.
    #[error("{table}.{field} is required but absent")]
    MissingRequired { table: &'static str, field: String },
}
