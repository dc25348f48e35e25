//! Search result pages.

use scraper::{Html, Selector};

use super::common::FetchClient;
use super::extract::item_id_from_url;
use crate::CliError;

const PAGE_SIZE: usize = 50;

/// Relative URL of result page `page` (1-based) for `query`.
pub(super) fn search_path(query: &str, page: usize) -> String {
    let offset = PAGE_SIZE * page.saturating_sub(1);
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("_nkw", query)
        .append_pair("_pgn", &page.to_string())
        .append_pair("_skc", &offset.to_string())
        .finish();
    format!("sch/i.html?{}", query)
}

/// Item ids on one result page, in page order, sponsored results skipped.
pub(super) fn parse_search_page(page: &str) -> Vec<String> {
    let doc = Html::parse_document(page);
    let ids = result_items(&doc).unwrap_or_default();
    if ids.is_empty() {
        return item_links(&doc).unwrap_or_default();
    }
    ids
}

fn result_items(doc: &Html) -> Option<Vec<String>> {
    let items = Selector::parse("ul#ListViewInner > li[listingid]").ok()?;
    let promoted = Selector::parse(r#"div.promoted-lv, div.s-item__title--tagblock, a[href*="pulsar"]"#).ok()?;
    let ids = doc
        .select(&items)
        .filter(|li| li.select(&promoted).next().is_none())
        .filter_map(|li| li.value().attr("listingid"))
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
        .collect();
    Some(ids)
}

/// Result pages without the list markup: every item link on the page.
fn item_links(doc: &Html) -> Option<Vec<String>> {
    let links = Selector::parse("a[href]").ok()?;
    let mut ids: Vec<String> = Vec::new();
    for href in doc.select(&links).filter_map(|a| a.value().attr("href")) {
        if href.contains("pulsar") {
            continue;
        }
        if let Some(id) = item_id_from_url(href) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Some(ids)
}

/// Walk result pages until `limit` distinct ids are found or a page adds
/// nothing new.
pub(super) fn collect_item_ids(client: &FetchClient, query: &str, limit: usize) -> Result<Vec<String>, CliError> {
    let mut ids: Vec<String> = Vec::new();
    let mut page = 1;
    while ids.len() < limit {
        let body = client.get_text(&client.url(&search_path(query, page)))?;
        let before = ids.len();
        for id in parse_search_page(&body) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        tracing::debug!(page, new = ids.len() - before, "search page read");
        if ids.len() == before {
            break;
        }
        page += 1;
    }
    ids.truncate(limit);
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::common::test_client;
    use httpmock::prelude::*;

    fn results_page(ids: &[&str]) -> String {
        let items: String = ids
            .iter()
            .map(|id| format!(r#"<li listingid="{id}"><h3><a href="https://www.ebay.com/itm/x/{id}?trk=1">Item {id}</a></h3></li>"#))
            .collect();
        format!(r#"<html><body><ul id="ListViewInner">{items}</ul></body></html>"#)
    }

    #[test]
    fn test_search_path() {
        assert_eq!(search_path("mambila mask", 1), "sch/i.html?_nkw=mambila+mask&_pgn=1&_skc=0");
        assert_eq!(search_path("a&b", 3), "sch/i.html?_nkw=a%26b&_pgn=3&_skc=100");
    }

    #[test]
    fn test_sponsored_results_are_skipped() {
        let page = r#"<html><body><ul id="ListViewInner">
<li listingid="11"><h3><a href="/itm/11">One</a></h3></li>
<li listingid="12"><div class="promoted-lv"></div><h3><a href="/itm/12">Ad</a></h3></li>
<li listingid="13"><h3><a href="https://pulsar.ebay.com/itm/13">Ad</a></h3></li>
<li><h3>Not an item</h3></li>
<li listingid="14"><h3><a href="/itm/14">Two</a></h3></li>
</ul></body></html>"#;
        assert_eq!(parse_search_page(page), ["11", "14"]);
    }

    #[test]
    fn test_item_links_fallback() {
        let page = r#"<html><body>
<a href="https://www.ebay.com/itm/lamp/201">Lamp</a>
<a href="https://www.ebay.com/itm/201?var=2">Lamp again</a>
<a href="https://www.ebay.com/itm/202">Vase</a>
<a href="https://www.ebay.com/usr/bob">Bob</a>
</body></html>"#;
        assert_eq!(parse_search_page(page), ["201", "202"]);
    }

    #[test]
    fn test_collect_stops_at_limit() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET).path("/sch/i.html").query_param("_pgn", "1");
            then.status(200).body(results_page(&["1", "2", "3"]));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/sch/i.html").query_param("_pgn", "2");
            then.status(200).body(results_page(&["4", "5", "6"]));
        });

        let client = test_client(&server.base_url());
        let ids = collect_item_ids(&client, "drum", 4).unwrap();

        assert_eq!(ids, ["1", "2", "3", "4"]);
        first.assert();
        second.assert();
    }

    #[test]
    fn test_collect_stops_when_page_adds_nothing() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET).path("/sch/i.html").query_param("_pgn", "1");
            then.status(200).body(results_page(&["1", "2"]));
        });
        // the site repeats the last page past the end of the results
        let second = server.mock(|when, then| {
            when.method(GET).path("/sch/i.html").query_param("_pgn", "2");
            then.status(200).body(results_page(&["2", "1"]));
        });

        let client = test_client(&server.base_url());
        let ids = collect_item_ids(&client, "drum", 10).unwrap();

        assert_eq!(ids, ["1", "2"]);
        first.assert();
        second.assert();
    }
}
