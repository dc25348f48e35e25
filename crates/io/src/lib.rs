//! `lotledger-io`: file source adapters.
//!
//! Each adapter turns a file into a stream of [`Observation`]s, one result
//! per item so a malformed row or auction does not sink the whole file.
//!
//! [`Observation`]: lotledger_recon::Observation

pub mod csv_source;
pub mod error;
pub mod jbidwatcher;
pub mod text;

pub use csv_source::CsvSource;
pub use error::SourceError;
