//! `lotledger-recon`: record reconciliation engine.
//!
//! Pure engine crate: receives loosely typed observations and stored rows,
//! returns merged records. No IO, no store access.

pub mod coerce;
pub mod engine;
pub mod error;
pub mod image_paths;
pub mod merge;
pub mod model;
pub mod recency;
pub mod schema;

pub use coerce::{coerce, coerce_record, Conversion};
pub use engine::{reconcile, Reconciled};
pub use error::MergeError;
pub use merge::merge;
pub use model::{EntityKind, Observation, RawFields, Record, Value};
pub use recency::Authority;
pub use schema::{Column, TableSchema};
