//! `lotledger listing|profile|search`: fetch marketplace pages into the store.

mod common;
mod extract;
mod images;
mod listing;
mod profile;
mod search;

pub use common::FetchClient;

use std::path::Path;

use lotledger_recon::{Observation, Value};
use lotledger_store::{BatchReport, ImportError, Importer, Outcome};

use crate::app::App;
use crate::import::{finish_batch, outcome_label};
use crate::CliError;

/// Why one item of a search run was skipped.
enum ItemError {
    Fetch(CliError),
    Import(ImportError),
}

impl ItemError {
    /// Count a skipped item, or stop the run when the store is unusable.
    fn skip(self, report: &mut BatchReport, what: &str) -> Result<(), CliError> {
        match self {
            Self::Import(e) if e.is_fatal() => Err(CliError::import(e)),
            Self::Import(e) => {
                tracing::warn!(item = what, error = %e, "skipping item");
                report.failed += 1;
                Ok(())
            }
            Self::Fetch(e) => {
                tracing::warn!(item = what, error = %e.message, "skipping item");
                report.failed += 1;
                Ok(())
            }
        }
    }
}

fn with_images(observation: &mut Observation, client: &FetchClient, app: &App, dir: Option<&Path>) {
    if let Some(dir) = dir {
        images::attach(observation, client, dir, &app.settings.images.prefix);
    }
}

pub fn cmd_listing(app: &App, target: &str, download_images: bool) -> Result<(), CliError> {
    let client = app.fetch_client()?;
    let image_dir = if download_images { app.image_dir()? } else { None };

    let url = listing::listing_url(client.base_url(), target)?;
    let mut observation = listing::fetch_listing(&client, &url)?;
    with_images(&mut observation, &client, app, image_dir.as_deref());

    let outcome = Importer::new(&app.store)
        .import(&observation)
        .map_err(CliError::import)?;
    println!("{}: {}", url, outcome_label(outcome));
    Ok(())
}

pub fn cmd_profile(app: &App, target: &str) -> Result<(), CliError> {
    let client = app.fetch_client()?;
    let (url, profile_id) = profile::profile_url(client.base_url(), target)?;
    let page = client.get_text(&url)?;
    let observation = profile::parse_profile_page(&page, &profile_id, &url);

    let outcome = Importer::new(&app.store)
        .import(&observation)
        .map_err(CliError::import)?;
    println!("{}: {}", url, outcome_label(outcome));
    Ok(())
}

/// Import up to `count` listings found by `query`, then the profile of each
/// distinct seller once.
pub fn cmd_search(app: &App, query: &str, count: usize, download_images: bool) -> Result<(), CliError> {
    let client = app.fetch_client()?;
    let image_dir = if download_images { app.image_dir()? } else { None };
    let importer = Importer::new(&app.store);

    let ids = search::collect_item_ids(&client, query, count)?;
    tracing::info!(query, found = ids.len(), "search results collected");

    let mut report = BatchReport::default();
    let mut sellers: Vec<String> = Vec::new();

    for id in &ids {
        let url = client.url(&format!("itm/{}", id));
        let result = listing::fetch_listing(&client, &url)
            .map_err(ItemError::Fetch)
            .and_then(|mut observation| {
                with_images(&mut observation, &client, app, image_dir.as_deref());
                let seller = observation
                    .fields
                    .get("seller")
                    .and_then(Value::as_text)
                    .map(str::to_string);
                let outcome = importer.import(&observation).map_err(ItemError::Import)?;
                Ok((outcome, seller))
            });
        match result {
            Ok((outcome, seller)) => {
                report.record(outcome);
                if let Some(seller) = seller.filter(|s| !sellers.contains(s)) {
                    sellers.push(seller);
                }
            }
            Err(e) => e.skip(&mut report, &url)?,
        }
    }

    for seller in &sellers {
        let result = import_profile(&client, &importer, seller);
        match result {
            Ok(outcome) => report.record(outcome),
            Err(e) => e.skip(&mut report, seller)?,
        }
    }

    finish_batch(&format!("search {:?}", query), &report)
}

fn import_profile(client: &FetchClient, importer: &Importer<'_>, profile_id: &str) -> Result<Outcome, ItemError> {
    let (url, profile_id) = profile::profile_url(client.base_url(), profile_id).map_err(ItemError::Fetch)?;
    let page = client.get_text(&url).map_err(ItemError::Fetch)?;
    let observation = profile::parse_profile_page(&page, &profile_id, &url);
    importer.import(&observation).map_err(ItemError::Import)
}
