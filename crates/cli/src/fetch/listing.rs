//! Item pages.

use lotledger_recon::{EntityKind, Observation};
use url::Url;

use super::common::FetchClient;
use super::extract;
use crate::exit_codes;
use crate::CliError;

/// Item page URL for a numeric id, or `target` itself when it is a URL.
pub(super) fn listing_url(base: &str, target: &str) -> Result<String, CliError> {
    let target = target.trim();
    if !target.is_empty() && target.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!("{}/itm/{}", base.trim_end_matches('/'), target));
    }
    match Url::parse(target) {
        Ok(url) if url.has_host() => Ok(url.into()),
        _ => Err(CliError::args(format!("not an item id or URL: {:?}", target))
            .with_hint("pass the numeric item id or the full item page URL")),
    }
}

/// Observation of the listing on `page`, fetched from `url`.
pub(super) fn parse_listing_page(page: &str, url: &str) -> Option<Observation> {
    let extracted = extract::extract_listing(page)?;
    let mut observation = Observation::new(EntityKind::Listing, url);
    observation.fields = extracted.data.fields;
    observation.image_urls = extracted.data.image_urls;
    Some(observation)
}

pub(super) fn fetch_listing(client: &FetchClient, url: &str) -> Result<Observation, CliError> {
    let page = client.get_text(url)?;
    parse_listing_page(&page, url).ok_or_else(|| CliError {
        code: exit_codes::EXIT_FETCH_EXTRACT,
        message: format!("no listing data found at {}", url),
        hint: Some("run with -v to see which extraction strategies were tried".to_string()),
    })
}
