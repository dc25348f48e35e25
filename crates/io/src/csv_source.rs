// CSV exports of listings or profiles

use std::io::{Cursor, Read};
use std::path::Path;

use lotledger_recon::{EntityKind, Observation, Value};

use crate::error::SourceError;
use crate::text::read_file_as_utf8;

/// Rows of a headed CSV file as observations of one entity kind.
///
/// Every cell is handed over as text; typing happens in coercion. Header
/// aliases for the identity column are renamed.
pub struct CsvSource<R: Read> {
    kind: EntityKind,
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<R>,
    origin: String,
}

impl CsvSource<Cursor<Vec<u8>>> {
    pub fn open(kind: EntityKind, path: &Path) -> Result<Self, SourceError> {
        let content = read_file_as_utf8(path)?;
        let delimiter = sniff_delimiter(&content);
        Self::with_delimiter(kind, Cursor::new(content.into_bytes()), delimiter, &path.display().to_string())
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(kind: EntityKind, reader: R, origin: &str) -> Result<Self, SourceError> {
        Self::with_delimiter(kind, reader, b',', origin)
    }

    fn with_delimiter(kind: EntityKind, reader: R, delimiter: u8, origin: &str) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|source| SourceError::Csv {
                origin: origin.to_string(),
                source,
            })?
            .iter()
            .map(|h| canonical_header(kind, h))
            .collect();
        Ok(Self {
            kind,
            headers,
            records: reader.into_records(),
            origin: origin.to_string(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<Observation, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.records.next()? {
            Ok(row) => row,
            Err(source) => {
                let origin = match source.position() {
                    Some(pos) => format!("{}:{}", self.origin, pos.line()),
                    None => self.origin.clone(),
                };
                return Some(Err(SourceError::Csv { origin, source }));
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let mut observation = Observation::new(self.kind, format!("{}:{line}", self.origin));
        for (header, cell) in self.headers.iter().zip(row.iter()) {
            observation.fields.insert(header.clone(), Value::text(cell));
        }
        Some(Ok(observation))
    }
}

fn canonical_header(kind: EntityKind, raw: &str) -> String {
    let header = raw.trim_start_matches('\u{feff}').trim();
    if kind.identity_aliases().contains(&header) {
        kind.identity_field().to_string()
    } else {
        header.to_string()
    }
}

/// Pick the delimiter that splits the header line into the most fields.
fn sniff_delimiter(content: &str) -> u8 {
    let Some(first) = content.lines().next() else {
        return b',';
    };
    let mut best = b',';
    let mut best_count = 1;
    for delim in [b',', b';', b'\t'] {
        let count = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .from_reader(first.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map(|r| r.len())
            .unwrap_or(1);
        if count > best_count {
            best = delim;
            best_count = count;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source(kind: EntityKind, csv: &str) -> CsvSource<&[u8]> {
        CsvSource::from_reader(kind, csv.as_bytes(), "t.csv").unwrap()
    }

    #[test]
    fn rows_become_text_observations() {
        let rows: Vec<_> = source(EntityKind::Listing, "listing_id,title,n_bids\n12,Lamp,3\n13,,\n")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields["title"], Value::text("Lamp"));
        assert_eq!(rows[0].fields["n_bids"], Value::text("3"));
        assert_eq!(rows[0].origin, "t.csv:2");
        assert_eq!(rows[1].fields["title"], Value::text(""));
    }

    #[test]
    fn identity_aliases_are_renamed() {
        let src = source(EntityKind::Listing, "auction_id,title\n5,x\n");
        assert_eq!(src.headers(), ["listing_id", "title"]);
        let src = source(EntityKind::Profile, "seller_id,name\nbob,Bob\n");
        let rows: Vec<_> = src.collect::<Result<_, _>>().unwrap();
        assert_eq!(rows[0].identity(), Some(&Value::text("bob")));
    }

    #[test]
    fn ragged_row_is_a_per_row_error() {
        let results: Vec<_> = source(EntityKind::Listing, "listing_id,title\n1,a\n2,b,extra\n3,c\n").collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(&results[1], Err(SourceError::Csv { origin, .. }) if origin == "t.csv:3"));
        assert!(results[2].is_ok());
    }

    #[test]
    fn open_sniffs_semicolons_and_strips_bom() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all("\u{feff}listing_id;title\n9;Vase\n".as_bytes()).unwrap();
        let rows: Vec<_> = CsvSource::open(EntityKind::Listing, file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].fields["listing_id"], Value::text("9"));
        assert_eq!(rows[0].fields["title"], Value::text("Vase"));
    }
}
