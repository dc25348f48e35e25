//! Which side of a listing conflict is the newer observation.
//!
//! The heuristic only picks the merge direction. Field values are still
//! decided by [`crate::merge`], so numbers accumulate either way and only
//! text fields follow the authoritative side.

use std::cmp::Ordering;

use crate::model::{Record, Value};

const N_BIDS: &str = "n_bids";
const END_TIME: &str = "end_time";
const CURRENCY: &str = "currency_code";
const PRICE: &str = "price";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Stored,
    Incoming,
}

/// Outcome of one ordering comparison.
enum Verdict {
    Newer,
    NotNewer,
    /// One side was absent or not a number.
    Inconclusive,
}

fn strictly_greater(incoming: &Value, stored: &Value) -> Verdict {
    match incoming.numeric_cmp(stored) {
        Some(Ordering::Greater) => Verdict::Newer,
        Some(_) => Verdict::NotNewer,
        None => Verdict::Inconclusive,
    }
}

/// Both sides of one recency field, or `None` when either record lacks it.
fn pair<'a>(stored: &'a Record, incoming: &'a Record, field: &str) -> Option<(&'a Value, &'a Value)> {
    Some((stored.get(field)?, incoming.get(field)?))
}

fn missing(field: &str) -> Authority {
    tracing::debug!(field, "recency field missing, incoming is authoritative");
    Authority::Incoming
}

/// Decide which listing is authoritative.
///
/// Checked in order: more bids, later end time, same currency with a higher
/// price. Each step first looks the field up on both sides: a record that
/// does not carry it at all makes the incoming side authoritative. A field
/// that is present but absent or not a number makes the comparison
/// inconclusive, which stops the evaluation with the stored side in charge.
pub fn authority(stored: &Record, incoming: &Record) -> Authority {
    for field in [N_BIDS, END_TIME] {
        let Some((old, new)) = pair(stored, incoming, field) else {
            return missing(field);
        };
        match strictly_greater(new, old) {
            Verdict::Newer => return Authority::Incoming,
            Verdict::NotNewer => {}
            Verdict::Inconclusive => return Authority::Stored,
        }
    }

    let Some((old, new)) = pair(stored, incoming, CURRENCY) else {
        return missing(CURRENCY);
    };
    if new != old {
        return Authority::Stored;
    }
    let Some((old, new)) = pair(stored, incoming, PRICE) else {
        return missing(PRICE);
    };
    match strictly_greater(new, old) {
        Verdict::Newer => Authority::Incoming,
        Verdict::NotNewer | Verdict::Inconclusive => Authority::Stored,
    }
}
