//! Listing image downloads.
//!
//! Images are saved before the listing reaches the store, so no network IO
//! happens inside a transaction. Only file names relative to the image
//! directory are recorded.

use std::fs;
use std::path::Path;

use lotledger_recon::image_paths;
use lotledger_recon::schema::IMAGE_PATHS_FIELD;
use lotledger_recon::{Observation, Value};
use url::Url;

use super::common::FetchClient;

/// `<prefix>_<last two URL path segments joined by _>`.
pub(super) fn image_file_name(prefix: &str, url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let tail = &segments[segments.len().saturating_sub(2)..];
    if tail.is_empty() {
        return None;
    }
    Some(format!("{}_{}", prefix, tail.join("_")))
}

/// Download every image into `dir`, skipping files already there. Returns
/// the names of the files now present; failed downloads are logged and left
/// out.
pub(super) fn download_all(client: &FetchClient, dir: &Path, prefix: &str, urls: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    for url in urls {
        let Some(name) = image_file_name(prefix, url) else {
            tracing::warn!(url = url.as_str(), "cannot name image, skipping");
            continue;
        };
        let path = dir.join(&name);
        if path.is_file() {
            tracing::debug!(file = %path.display(), "image already saved");
            names.push(name);
            continue;
        }
        let saved = client
            .get_bytes(url)
            .map_err(|e| e.message)
            .and_then(|bytes| fs::write(&path, bytes).map_err(|e| e.to_string()));
        match saved {
            Ok(()) => {
                tracing::debug!(file = %path.display(), "image saved");
                names.push(name);
            }
            Err(error) => tracing::warn!(url = url.as_str(), %error, "image download failed"),
        }
    }
    names
}

/// Download the observation's images and record their names in its
/// image path field.
pub(super) fn attach(observation: &mut Observation, client: &FetchClient, dir: &Path, prefix: &str) {
    if observation.image_urls.is_empty() {
        return;
    }
    let names = download_all(client, dir, prefix, &observation.image_urls);
    if !names.is_empty() {
        observation
            .fields
            .insert(IMAGE_PATHS_FIELD.to_string(), Value::text(image_paths::join(&names)));
    }
}
