//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 10-19   | import           | File imports and batches                 |
//! | 20-29   | store            | Database open, contention, rejection     |
//! | 30-39   | config           | Settings file                            |
//! | 50-59   | fetch            | Marketplace pages and images             |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use lotledger_store::{ImportError, StoreError};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Import (10-19)
// =============================================================================

/// Batch finished but at least one item failed and was skipped.
pub const EXIT_IMPORT_PARTIAL: u8 = 10;

/// Input file unreadable or malformed as a whole.
pub const EXIT_IMPORT_SOURCE: u8 = 11;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Database file cannot be opened or its tables are missing.
pub const EXIT_STORE_OPEN: u8 = 20;

/// Database stayed locked through every retry, including the exclusive one.
pub const EXIT_STORE_BUSY: u8 = 21;

/// Record rejected (type conflict, missing identity or required field).
pub const EXIT_STORE_REJECTED: u8 = 22;

/// `show` found no row for the identity.
pub const EXIT_STORE_NOT_FOUND: u8 = 23;

// =============================================================================
// Config (30-39)
// =============================================================================

/// Settings file unreadable or invalid.
pub const EXIT_CONFIG: u8 = 30;

// =============================================================================
// Fetch (50-59)
// =============================================================================

/// Marketplace refused access (401/403).
pub const EXIT_FETCH_AUTH: u8 = 51;

/// Request rejected as malformed (400).
pub const EXIT_FETCH_VALIDATION: u8 = 52;

/// Rate limited (429) after all retries.
pub const EXIT_FETCH_RATE_LIMIT: u8 = 53;

/// Upstream error: 5xx after retries, network failure, unreadable body.
pub const EXIT_FETCH_UPSTREAM: u8 = 54;

/// Page does not exist (404).
pub const EXIT_FETCH_NOT_FOUND: u8 = 55;

/// Page fetched but no listing data could be extracted.
pub const EXIT_FETCH_EXTRACT: u8 = 56;

/// Map a store error to its exit code.
pub fn store_exit_code(err: &StoreError) -> u8 {
    if err.is_busy() {
        return EXIT_STORE_BUSY;
    }
    match err {
        StoreError::Open { .. } | StoreError::MissingTable(_) => EXIT_STORE_OPEN,
        StoreError::Merge(_) => EXIT_STORE_REJECTED,
        StoreError::Sqlite(_) if !err.is_fatal() => EXIT_STORE_REJECTED,
        _ => EXIT_ERROR,
    }
}

/// Map an import error to its exit code.
pub fn import_exit_code(err: &ImportError) -> u8 {
    match err {
        ImportError::Source(_) => EXIT_IMPORT_SOURCE,
        ImportError::Rejected { source, .. } | ImportError::Fatal { source, .. } => store_exit_code(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotledger_recon::{EntityKind, MergeError};

    #[test]
    fn codes_are_unique() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_IMPORT_PARTIAL,
            EXIT_IMPORT_SOURCE,
            EXIT_STORE_OPEN,
            EXIT_STORE_BUSY,
            EXIT_STORE_REJECTED,
            EXIT_STORE_NOT_FOUND,
            EXIT_CONFIG,
            EXIT_FETCH_AUTH,
            EXIT_FETCH_VALIDATION,
            EXIT_FETCH_RATE_LIMIT,
            EXIT_FETCH_UPSTREAM,
            EXIT_FETCH_NOT_FOUND,
            EXIT_FETCH_EXTRACT,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn rejected_records_map_to_rejected() {
        let err = ImportError::from_store(
            "t.csv:2",
            StoreError::Merge(MergeError::MissingIdentity {
                kind: EntityKind::Listing,
            }),
        );
        assert_eq!(import_exit_code(&err), EXIT_STORE_REJECTED);
        assert_eq!(import_exit_code(&ImportError::Source("bad".into())), EXIT_IMPORT_SOURCE);
    }

    #[test]
    fn missing_table_maps_to_open() {
        assert_eq!(
            store_exit_code(&StoreError::MissingTable("listings".into())),
            EXIT_STORE_OPEN
        );
    }
}
