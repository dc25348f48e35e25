//! Pulling listing fields out of an item page.
//!
//! Item pages carry the same facts in several places depending on their
//! age. Strategies are tried in order; the first whose result contains an
//! item id wins. Field values are handed over loosely typed and typed later
//! by coercion.

use std::collections::HashMap;

use lotledger_recon::{RawFields, Value};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// What one strategy recovered from a page.
#[derive(Debug, Default)]
pub struct PageData {
    pub fields: RawFields,
    pub image_urls: Vec<String>,
}

impl PageData {
    fn set(&mut self, field: &str, value: Value) {
        let blank = value.as_text().is_some_and(|t| t.trim().is_empty());
        if !value.is_absent() && !blank {
            self.fields.insert(field.to_string(), value);
        }
    }

    fn has_identity(&self) -> bool {
        self.fields.get(LISTING_ID).is_some_and(|v| !v.is_absent())
    }
}

#[derive(Debug)]
pub struct Extracted {
    pub strategy: &'static str,
    pub data: PageData,
}

const LISTING_ID: &str = "listing_id";

type Strategy = fn(&Html) -> Option<PageData>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("widgets", widget_assignments),
    ("legacy", legacy_layout),
    ("json-ld", json_ld),
    ("meta", meta_tags),
];

/// Run the strategies over `page` until one finds the item id.
pub fn extract_listing(page: &str) -> Option<Extracted> {
    let doc = Html::parse_document(page);
    for &(strategy, run) in STRATEGIES {
        match run(&doc) {
            Some(data) if data.has_identity() => {
                tracing::debug!(strategy, fields = data.fields.len(), images = data.image_urls.len(), "listing extracted");
                return Some(Extracted { strategy, data });
            }
            _ => tracing::debug!(strategy, "no item id"),
        }
    }
    None
}

/// The numeric item id in an item page URL (`/itm/<id>` or `/itm/<slug>/<id>`).
pub fn item_id_from_url(url: &str) -> Option<String> {
    let re = Regex::new(r"/itm/(?:[^/?#]+/)?(\d+)(?:[/?#]|$)").ok()?;
    re.captures(url).map(|c| c[1].to_string())
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of whitespace to single spaces.
fn normalise(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn description(doc: &Html) -> Value {
    let Ok(sel) = Selector::parse("#desc_div, div.item_description") else {
        return Value::Absent;
    };
    doc.select(&sel)
        .map(|el| normalise(&text_of(el)))
        .find(|d| !d.is_empty())
        .map(Value::Text)
        .unwrap_or(Value::Absent)
}

// ── $rwidgets assignments ───────────────────────────────────────────

/// Widget key → listing field, for values passed through as text.
const WIDGET_FIELDS: &[(&str, &str)] = &[
    ("itemId", "listing_id"),
    ("entityName", "seller"),
    ("bids", "n_bids"),
    ("ccode", "currency_code"),
    ("bidPriceDouble", "price"),
    ("binPriceDouble", "buy_now_price"),
];

/// `"key":value` pairs inside the page's `$rwidgets(...)` script calls.
fn widget_assignments(doc: &Html) -> Option<PageData> {
    let scripts = Selector::parse("script").ok()?;
    let pair = Regex::new(r#""(\w+)"\s*:\s*("(?:[^"\\]|\\.)*"|[-+\w.]+)"#).ok()?;

    let mut values: HashMap<String, String> = HashMap::new();
    let mut max_images: Vec<Option<String>> = Vec::new();
    let mut display_images: Vec<Option<String>> = Vec::new();
    let mut seen = false;

    for script in doc.select(&scripts) {
        let text: String = script.text().collect();
        if !text.contains("$rwidgets") {
            continue;
        }
        seen = true;
        for cap in pair.captures_iter(&text) {
            let value = js_literal(&cap[2]);
            match &cap[1] {
                "maxImageUrl" => max_images.push(value),
                "displayImgUrl" => display_images.push(value),
                key => {
                    if let Some(value) = value {
                        values.insert(key.to_string(), value);
                    }
                }
            }
        }
    }
    if !seen {
        return None;
    }

    let mut data = PageData::default();
    for &(key, field) in WIDGET_FIELDS {
        if let Some(v) = values.get(key) {
            data.set(field, Value::text(v.as_str()));
        }
    }
    if let Some(title) = values.get("it").or_else(|| values.get("kw")) {
        data.set("title", Value::text(title.as_str()));
    }
    for (key, field) in [("startTime", "start_time"), ("endTime", "end_time")] {
        if let Some(raw) = values.get(key) {
            data.set(field, millis_to_seconds(raw));
        }
    }
    data.set("description", description(doc));

    // A null full-size image falls back to the display image at the same position.
    data.image_urls = if max_images.is_empty() {
        display_images.into_iter().flatten().collect()
    } else {
        let mut display = display_images.into_iter();
        max_images
            .into_iter()
            .filter_map(|max| {
                let disp = display.next().flatten();
                max.or(disp)
            })
            .collect()
    };
    Some(data)
}

/// Decode a JS literal: quoted strings are unescaped, `null` is nothing.
fn js_literal(raw: &str) -> Option<String> {
    if raw.starts_with('"') {
        return serde_json::from_str::<String>(raw).ok();
    }
    match raw {
        "null" | "undefined" => None,
        other => Some(other.to_string()),
    }
}

fn millis_to_seconds(raw: &str) -> Value {
    match raw.parse::<f64>() {
        Ok(ms) if ms.is_finite() => Value::Int((ms / 1000.0).trunc() as i64),
        _ => {
            tracing::debug!(raw, "unusable timestamp");
            Value::Absent
        }
    }
}

// ── Legacy layout ───────────────────────────────────────────────────

/// Older pages: an "Item number:" table cell followed by the id cell.
fn legacy_layout(doc: &Html) -> Option<PageData> {
    let cells = Selector::parse("td").ok()?;
    let label = doc
        .select(&cells)
        .find(|td| text_of(*td).contains("Item number:"))?;
    let id_cell = label.next_siblings().find_map(ElementRef::wrap)?;

    let mut data = PageData::default();
    data.set(LISTING_ID, Value::text(normalise(&text_of(id_cell))));
    data.set("description", description(doc));
    Some(data)
}

// ── JSON-LD ─────────────────────────────────────────────────────────

fn json_ld(doc: &Html) -> Option<PageData> {
    let scripts = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    doc.select(&scripts).find_map(|script| {
        let text: String = script.text().collect();
        let json: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
        find_product(&json).map(product_fields)
    })
}

fn find_product(json: &serde_json::Value) -> Option<&serde_json::Value> {
    match json {
        serde_json::Value::Array(items) => items.iter().find_map(find_product),
        serde_json::Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(serde_json::Value::String(t)) => t == "Product",
                Some(serde_json::Value::Array(types)) => types.iter().any(|t| t == "Product"),
                _ => false,
            };
            if is_product {
                Some(json)
            } else {
                map.get("@graph").and_then(find_product)
            }
        }
        _ => None,
    }
}

static NULL: serde_json::Value = serde_json::Value::Null;

fn product_fields(product: &serde_json::Value) -> PageData {
    let offer = match &product["offers"] {
        serde_json::Value::Array(offers) => offers.first().unwrap_or(&NULL),
        other => other,
    };

    let mut data = PageData::default();
    let id = json_scalar(&product["productID"])
        .or_else(|| json_scalar(&product["sku"]))
        .or_else(|| {
            offer["url"]
                .as_str()
                .and_then(item_id_from_url)
                .map(Value::Text)
        })
        .or_else(|| product["url"].as_str().and_then(item_id_from_url).map(Value::Text));
    data.set(LISTING_ID, id.unwrap_or(Value::Absent));
    data.set("title", json_scalar(&product["name"]).unwrap_or(Value::Absent));
    data.set("description", json_scalar(&product["description"]).unwrap_or(Value::Absent));
    data.set("price", json_scalar(&offer["price"]).unwrap_or(Value::Absent));
    data.set("currency_code", json_scalar(&offer["priceCurrency"]).unwrap_or(Value::Absent));
    data.set("seller", json_scalar(&offer["seller"]["name"]).unwrap_or(Value::Absent));

    data.image_urls = match &product["image"] {
        serde_json::Value::String(url) => vec![url.clone()],
        serde_json::Value::Array(images) => images
            .iter()
            .filter_map(|i| i.as_str().or_else(|| i["url"].as_str()))
            .map(str::to_string)
            .collect(),
        serde_json::Value::Object(image) => image
            .get("url")
            .and_then(|u| u.as_str())
            .map(|u| vec![u.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    data
}

fn json_scalar(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(Value::text(s.as_str())),
        serde_json::Value::Number(n) => n.as_i64().map(Value::Int).or_else(|| n.as_f64().map(Value::Real)),
        _ => None,
    }
}

// ── Meta tags ───────────────────────────────────────────────────────

fn meta_tags(doc: &Html) -> Option<PageData> {
    let metas = Selector::parse("meta[content]").ok()?;
    let mut data = PageData::default();
    for meta in doc.select(&metas) {
        let el = meta.value();
        let Some(name) = el.attr("property").or_else(|| el.attr("name")) else {
            continue;
        };
        let content = el.attr("content").unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        match name {
            "og:url" => {
                if let Some(id) = item_id_from_url(content) {
                    data.set(LISTING_ID, Value::text(id));
                }
            }
            "og:title" => data.set("title", Value::text(content)),
            "og:image" => data.image_urls.push(content.to_string()),
            "product:price:amount" | "og:price:amount" => data.set("price", Value::text(content)),
            "product:price:currency" | "og:price:currency" => data.set("currency_code", Value::text(content)),
            _ => {}
        }
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget_page(script: &str) -> String {
        format!(
            r#"<html><body><div id="JSDF"><script>{script}</script></div>
<div id="desc_div"><p>Carved   mask,
  good condition</p></div></body></html>"#
        )
    }

    #[test]
    fn test_widget_assignments() {
        let page = widget_page(
            r#"$rwidgets(["x",{"itemId":"183885054092","it":"Mambila figure","kw":"Mambila figure",
"entityName":"artdealer","startTime":1583020800500,"endTime":1583625600000,"bids":4,
"ccode":"GBP","bidPriceDouble":41.5,"binPriceDouble":null,
"maxImageUrl":"https:\/\/i.ebayimg.com\/images\/g\/abc\/s-l1600.jpg","displayImgUrl":"https:\/\/i.ebayimg.com\/images\/g\/abc\/s-l500.jpg",
"maxImageUrl":null,"displayImgUrl":"https:\/\/i.ebayimg.com\/images\/g\/def\/s-l500.jpg"}]);"#,
        );
        let got = extract_listing(&page).unwrap();
        assert_eq!(got.strategy, "widgets");
        let f = &got.data.fields;
        assert_eq!(f["listing_id"], Value::text("183885054092"));
        assert_eq!(f["title"], Value::text("Mambila figure"));
        assert_eq!(f["seller"], Value::text("artdealer"));
        assert_eq!(f["start_time"], Value::Int(1583020800));
        assert_eq!(f["end_time"], Value::Int(1583625600));
        assert_eq!(f["n_bids"], Value::text("4"));
        assert_eq!(f["price"], Value::text("41.5"));
        assert_eq!(f["currency_code"], Value::text("GBP"));
        assert!(!f.contains_key("buy_now_price"));
        assert_eq!(f["description"], Value::text("Carved mask, good condition"));
        assert_eq!(
            got.data.image_urls,
            [
                "https://i.ebayimg.com/images/g/abc/s-l1600.jpg",
                "https://i.ebayimg.com/images/g/def/s-l500.jpg",
            ]
        );
    }

    #[test]
    fn test_json_ld_used_when_widgets_absent() {
        let page = r#"<html><head><script type="application/ld+json">
{"@context":"https://schema.org","@type":"Product","name":"Brass bell",
 "image":["https://img.example/a/1.jpg"],
 "offers":{"@type":"Offer","price":"12.50","priceCurrency":"USD","url":"https://www.ebay.com/itm/brass-bell/1234567"}}
</script></head><body></body></html>"#;
        let got = extract_listing(page).unwrap();
        assert_eq!(got.strategy, "json-ld");
        assert_eq!(got.data.fields["listing_id"], Value::text("1234567"));
        assert_eq!(got.data.fields["title"], Value::text("Brass bell"));
        assert_eq!(got.data.fields["price"], Value::text("12.50"));
        assert_eq!(got.data.fields["currency_code"], Value::text("USD"));
        assert_eq!(got.data.image_urls, ["https://img.example/a/1.jpg"]);
    }

    #[test]
    fn test_widgets_without_id_fall_through_to_meta() {
        let page = r#"<html><head>
<meta property="og:url" content="https://www.ebay.com/itm/998877">
<meta property="og:title" content="Stool">
<meta property="og:image" content="https://img.example/s/2.jpg">
</head><body><script>$rwidgets([{"it":"Stool"}]);</script></body></html>"#;
        let got = extract_listing(page).unwrap();
        assert_eq!(got.strategy, "meta");
        assert_eq!(got.data.fields["listing_id"], Value::text("998877"));
        assert_eq!(got.data.fields["title"], Value::text("Stool"));
        assert_eq!(got.data.image_urls, ["https://img.example/s/2.jpg"]);
    }

    #[test]
    fn test_legacy_item_number_cell() {
        let page = r#"<html><body><table><tr><td>Item number:</td><td> 400130806558 </td></tr></table>
<div class="item_description">Old  listing</div></body></html>"#;
        let got = extract_listing(page).unwrap();
        assert_eq!(got.strategy, "legacy");
        assert_eq!(got.data.fields["listing_id"], Value::text("400130806558"));
        assert_eq!(got.data.fields["description"], Value::text("Old listing"));
    }

    #[test]
    fn test_page_without_listing_data() {
        assert!(extract_listing("<html><body><p>Nothing here</p></body></html>").is_none());
    }

    #[test]
    fn test_item_id_from_url() {
        assert_eq!(item_id_from_url("https://www.ebay.com/itm/123").as_deref(), Some("123"));
        assert_eq!(
            item_id_from_url("https://www.ebay.co.uk/itm/African-Tribal-Art/183885054092?hash=item2a").as_deref(),
            Some("183885054092")
        );
        assert_eq!(item_id_from_url("https://www.ebay.com/usr/bob"), None);
    }
}
