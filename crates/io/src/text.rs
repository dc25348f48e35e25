use std::path::Path;

use crate::error::SourceError;

/// Read a file as UTF-8, falling back to Windows-1252 for legacy exports.
pub fn read_file_as_utf8(path: &Path) -> Result<String, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode(bytes))
}

/// Decode bytes as UTF-8, or as Windows-1252 when they are not valid UTF-8.
pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            tracing::debug!(len = bytes.len(), "input is not UTF-8, decoding as Windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}
