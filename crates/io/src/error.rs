use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("{origin}: malformed XML: {source}")]
    Xml {
        origin: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("{origin}: {field} has unusable value {value:?}")]
    Field {
        origin: String,
        field: &'static str,
        value: String,
    },

    #[error("{origin}: auction has no id")]
    MissingId { origin: String },
}
