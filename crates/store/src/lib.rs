//! `lotledger-store`: SQLite persistence for reconciled records.
//!
//! All access goes through [`Gateway::run`], which wraps an operation in a
//! transaction and retries it under lock contention. [`Store`] builds the
//! read/reconcile/write cycle on top; [`Importer`] feeds it adapter output.

pub mod error;
pub mod gateway;
pub mod ops;
pub mod pipeline;
pub mod sql;
pub mod store;

pub use error::{ImportError, StoreError};
pub use gateway::{Gateway, GatewayOptions, RetryPolicy, Tx, TxMode};
pub use pipeline::{BatchReport, Importer};
pub use store::{Outcome, Store, IMAGE_LOCATION_KEY};
