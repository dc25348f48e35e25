//! `lotledger csv` and `lotledger xml`: file imports.

use std::path::{Path, PathBuf};

use lotledger_io::{jbidwatcher, CsvSource, SourceError};
use lotledger_recon::EntityKind;
use lotledger_store::{BatchReport, Importer, Outcome};

use crate::app::App;
use crate::exit_codes::{EXIT_IMPORT_PARTIAL, EXIT_IMPORT_SOURCE, EXIT_USAGE};
use crate::CliError;

pub fn cmd_csv(app: &App, kind: EntityKind, file: &Path) -> Result<(), CliError> {
    let source = CsvSource::open(kind, file).map_err(source_error)?;
    let report = Importer::new(&app.store)
        .import_batch(source)
        .map_err(CliError::import)?;
    finish_batch(&file.display().to_string(), &report)
}

/// Import jbidwatcher exports. Every auction's seller gets a profile row.
/// A file that cannot be parsed at all counts as one failed item.
pub fn cmd_xml(app: &App, files: &[PathBuf]) -> Result<(), CliError> {
    let importer = Importer::new(&app.store).with_seller_stubs(true);
    let mut total = BatchReport::default();

    for file in files {
        let auctions = match jbidwatcher::read_file(file) {
            Ok(auctions) => auctions,
            Err(e) => {
                tracing::warn!(error = %e, "skipping file");
                total.failed += 1;
                continue;
            }
        };
        let report = importer.import_batch(auctions).map_err(CliError::import)?;
        if files.len() > 1 {
            print_report(&file.display().to_string(), &report);
        }
        total.inserted += report.inserted;
        total.merged += report.merged;
        total.failed += report.failed;
    }

    let label = match files {
        [only] => only.display().to_string(),
        _ => format!("{} files", files.len()),
    };
    finish_batch(&label, &total)
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Inserted => "inserted",
        Outcome::Merged => "merged",
    }
}

fn print_report(label: &str, report: &BatchReport) {
    println!(
        "{}: {} inserted, {} merged, {} failed",
        label, report.inserted, report.merged, report.failed
    );
}

/// Print the counts; any failed item makes the command fail.
pub fn finish_batch(label: &str, report: &BatchReport) -> Result<(), CliError> {
    print_report(label, report);
    if report.is_clean() {
        return Ok(());
    }
    Err(CliError {
        code: EXIT_IMPORT_PARTIAL,
        message: format!("{} of {} items failed", report.failed, report.total()),
        hint: Some("run with -v to see why each item was skipped".to_string()),
    })
}

fn source_error(err: SourceError) -> CliError {
    let code = match err {
        SourceError::Io { .. } => EXIT_USAGE,
        _ => EXIT_IMPORT_SOURCE,
    };
    CliError {
        code,
        message: err.to_string(),
        hint: None,
    }
}
