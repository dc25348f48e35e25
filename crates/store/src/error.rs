use std::path::PathBuf;

use lotledger_recon::MergeError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("table '{0}' does not exist")]
    MissingTable(String),

    #[error("exclusive transaction failed after {attempts} busy attempts: {source}")]
    Escalation {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },
}

fn sqlite_code(err: &rusqlite::Error) -> Option<ErrorCode> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
        _ => None,
    }
}

impl StoreError {
    /// Another connection holds a conflicting lock.
    pub fn is_busy(&self) -> bool {
        let source = match self {
            Self::Sqlite(e) | Self::Escalation { source: e, .. } => e,
            _ => return false,
        };
        matches!(
            sqlite_code(source),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    /// True when the fault lies with the store rather than one record.
    ///
    /// Merge failures and constraint or datatype violations reject a single
    /// record; everything else means the store itself is unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Merge(_) => false,
            Self::Sqlite(e) => !matches!(
                sqlite_code(e),
                Some(ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch)
            ),
            Self::Open { .. } | Self::MissingTable(_) | Self::Escalation { .. } => true,
        }
    }
}

/// Failure of one item in an import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The adapter could not produce an observation.
    #[error("{0}")]
    Source(String),

    /// The store refused this record; the batch can go on.
    #[error("{origin}: {source}")]
    Rejected {
        origin: String,
        #[source]
        source: StoreError,
    },

    /// The store is unusable; the batch must stop.
    #[error("{origin}: {source}")]
    Fatal {
        origin: String,
        #[source]
        source: StoreError,
    },
}

impl ImportError {
    pub fn from_store(origin: &str, source: StoreError) -> Self {
        let origin = origin.to_string();
        if source.is_fatal() {
            Self::Fatal { origin, source }
        } else {
            Self::Rejected { origin, source }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}
