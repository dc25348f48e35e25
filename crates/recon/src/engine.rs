use crate::error::MergeError;
use crate::merge::merge;
use crate::model::{EntityKind, Record};
use crate::recency::{authority, Authority};
use crate::schema::TableSchema;

/// Result of reconciling one observation against the stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub record: Record,
    /// `None` when nothing was stored yet.
    pub authority: Option<Authority>,
}

/// Merge a freshly observed record with its stored counterpart.
///
/// Listings first pick an authoritative side with the recency heuristic and
/// merge it on top of the other. Profiles always merge incoming on top of
/// stored.
pub fn reconcile(
    stored: Option<&Record>,
    incoming: &Record,
    schema: &TableSchema,
) -> Result<Reconciled, MergeError> {
    let Some(stored) = stored else {
        let record = merge(&Record::new(schema.kind()), incoming, schema)?;
        return Ok(Reconciled { record, authority: None });
    };

    let side = match schema.kind() {
        EntityKind::Listing => authority(stored, incoming),
        EntityKind::Profile => Authority::Incoming,
    };
    let record = match side {
        Authority::Incoming => merge(stored, incoming, schema)?,
        Authority::Stored => merge(incoming, stored, schema)?,
    };
    Ok(Reconciled {
        record,
        authority: Some(side),
    })
}
