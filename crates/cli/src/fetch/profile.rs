//! Seller profile pages.

use lotledger_recon::{EntityKind, Observation, Value};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::CliError;

/// Profile page URL and profile id for an id or a profile URL. A URL's id is
/// its last path segment.
pub(super) fn profile_url(base: &str, target: &str) -> Result<(String, String), CliError> {
    let target = target.trim();
    if let Ok(url) = Url::parse(target) {
        if url.has_host() {
            let id = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
                .ok_or_else(|| CliError::args(format!("no profile id in {}", target)))?;
            return Ok((url.into(), id));
        }
    }
    if target.is_empty() || target.contains('/') {
        return Err(CliError::args(format!("not a profile id or URL: {:?}", target)));
    }
    Ok((format!("{}/usr/{}", base.trim_end_matches('/'), target), target.to_string()))
}

/// Observation of the profile on `page`. Missing page sections leave their
/// fields out.
pub(super) fn parse_profile_page(page: &str, profile_id: &str, origin: &str) -> Observation {
    let doc = Html::parse_document(page);
    let mut observation = Observation::new(EntityKind::Profile, origin).with("profile_id", profile_id);

    let mut set = |field: &str, text: Option<String>| {
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            observation.fields.insert(field.to_string(), Value::text(text));
        }
    };

    set("description", first_text(&doc, "h2.bio"));
    set("location", first_text(&doc, "#member_info span.mem_loc"));
    let since = member_since(&doc);
    set("member_since_unix", since.clone());
    set("member_since", since);
    set(
        "percent_positive_feedback",
        first_text(&doc, "div.perctg").map(|t| t.split('%').next().unwrap_or_default().trim().to_string()),
    );
    observation
}

fn stripped(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next().map(stripped)
}

/// The info span next to the "Member since:" label.
fn member_since(doc: &Html) -> Option<String> {
    let sel = Selector::parse("#member_info span.info").ok()?;
    doc.select(&sel)
        .find(|info| {
            info.parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|parent| stripped(parent).contains("Member since"))
        })
        .map(stripped)
}
