//! jbidwatcher XML export files.
//!
//! Auctions live at `jbidwatcher/auctions/server/auction[@id]/info`. The
//! info block carries plain text children (`title`, `seller`, `start`,
//! `end`, `bidcount`, `highbidder`) and price elements (`currently`,
//! `buynow`, `minimum`) whose amount and currency are attributes.

use std::collections::BTreeMap;
use std::path::Path;

use lotledger_recon::{EntityKind, Observation, Value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::SourceError;
use crate::text::read_file_as_utf8;

const AUCTION_PATH: [&str; 3] = ["jbidwatcher", "auctions", "server"];

/// Currency jbidwatcher writes when it never saw a price.
const UNKNOWN_CURRENCY: &str = "UNK";

/// Price element name and the listing field it fills.
const PRICE_FIELDS: [(&str, &str); 3] = [
    ("currently", "price"),
    ("buynow", "buy_now_price"),
    ("minimum", "starting_price"),
];

pub fn read_file(path: &Path) -> Result<Vec<Result<Observation, SourceError>>, SourceError> {
    let xml = read_file_as_utf8(path)?;
    parse_str(&xml, &path.display().to_string())
}

/// Parse an export. Malformed XML fails the whole file; a malformed
/// auction only fails its own entry.
pub fn parse_str(xml: &str, origin: &str) -> Result<Vec<Result<Observation, SourceError>>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<Draft> = None;
    let mut auctions = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|source| SourceError::Xml {
            origin: origin.to_string(),
            source,
        })?;
        match event {
            Event::Start(ref e) => {
                let name = element_name(e);
                open_element(&stack, &name, e, &mut current, auctions.len());
                stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = element_name(e);
                open_element(&stack, &name, e, &mut current, auctions.len());
                if name == "auction" {
                    if let Some(draft) = current.take() {
                        auctions.push(draft.finish(origin));
                    }
                }
            }
            Event::Text(ref e) => {
                if let Some(draft) = current.as_mut() {
                    draft.push_text(&stack, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(draft) = current.as_mut() {
                    if let Some(text) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                        draft.push_text(&stack, &text);
                    }
                }
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("auction") {
                    if let Some(draft) = current.take() {
                        auctions.push(draft.finish(origin));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!(origin, auctions = auctions.len(), "parsed jbidwatcher export");
    Ok(auctions)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn open_element(stack: &[String], name: &str, e: &BytesStart<'_>, current: &mut Option<Draft>, index: usize) {
    if name == "auction" && stack == AUCTION_PATH {
        *current = Some(Draft::new(attribute(e, b"id"), index));
        return;
    }
    let Some(draft) = current.as_mut() else {
        return;
    };
    if stack.last().map(String::as_str) == Some("info") && PRICE_FIELDS.iter().any(|(el, _)| *el == name) {
        draft.prices.insert(
            name.to_string(),
            Price {
                amount: attribute(e, b"price"),
                currency: attribute(e, b"currency"),
            },
        );
    }
}

/// Resolve a predefined or numeric character reference by name.
fn resolve_entity(name: &str) -> Option<String> {
    let predefined = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    };
    let c = predefined.or_else(|| {
        let num = name.strip_prefix('#')?;
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        char::from_u32(code)
    })?;
    Some(c.to_string())
}

// ---------------------------------------------------------------------------
// Auction assembly
// ---------------------------------------------------------------------------

struct Price {
    amount: Option<String>,
    currency: Option<String>,
}

/// An auction being read.
struct Draft {
    id: Option<String>,
    index: usize,
    texts: BTreeMap<String, String>,
    prices: BTreeMap<String, Price>,
}

impl Draft {
    fn new(id: Option<String>, index: usize) -> Self {
        Self {
            id,
            index,
            texts: BTreeMap::new(),
            prices: BTreeMap::new(),
        }
    }

    /// Collect text of `info` children. A seller may be written either as
    /// text or as a `<name>` child.
    fn push_text(&mut self, stack: &[String], text: &str) {
        let Some(info) = stack.iter().rposition(|s| s == "info") else {
            return;
        };
        let field = match &stack[info + 1..] {
            [field] => field.as_str(),
            [seller, name] if seller == "seller" && name == "name" => "seller",
            _ => return,
        };
        self.texts.entry(field.to_string()).or_default().push_str(text);
    }

    fn text(&self, field: &str) -> Option<&str> {
        self.texts.get(field).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    fn finish(self, file: &str) -> Result<Observation, SourceError> {
        let origin = match &self.id {
            Some(id) => format!("{file}#auction {id}"),
            None => format!("{file}#auction[{}]", self.index),
        };
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SourceError::MissingId { origin: origin.clone() })?;

        let mut obs = Observation::new(EntityKind::Listing, origin.clone()).with("listing_id", id);
        obs = obs
            .with("title", self.text("title"))
            .with("seller", self.text("seller"))
            .with("winner", self.text("highbidder"));

        for (element, field) in [("start", "start_time"), ("end", "end_time")] {
            let millis = self.integer(element, &origin)?;
            // Non-positive timestamps mean "unknown".
            obs = obs.with(field, millis.filter(|ms| *ms > 0).map(|ms| ms / 1000));
        }
        let bids = self.integer("bidcount", &origin)?;
        obs = obs.with("n_bids", bids.map(|n| n.max(0)));

        for (element, field) in PRICE_FIELDS {
            let (amount, currency) = self.price(element, field, &origin)?;
            obs = obs.with(field, amount);
            if element == "currently" {
                obs = obs.with("currency_code", currency);
            }
        }
        Ok(obs)
    }

    fn integer(&self, element: &'static str, origin: &str) -> Result<Option<i64>, SourceError> {
        let Some(raw) = self.text(element) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|_| SourceError::Field {
            origin: origin.to_string(),
            field: element,
            value: raw.to_string(),
        })
    }

    /// Amount and currency of a price element. An unknown currency
    /// discards both.
    fn price(&self, element: &str, field: &'static str, origin: &str) -> Result<(Value, Value), SourceError> {
        let Some(price) = self.prices.get(element) else {
            return Ok((Value::Absent, Value::Absent));
        };
        let currency = price.currency.as_deref().map(str::trim);
        if currency == Some(UNKNOWN_CURRENCY) {
            return Ok((Value::Absent, Value::Absent));
        }
        let amount = match price.amount.as_deref().map(str::trim) {
            Some(raw) => raw.parse::<f64>().map(Value::Real).map_err(|_| SourceError::Field {
                origin: origin.to_string(),
                field,
                value: raw.to_string(),
            })?,
            None => Value::Absent,
        };
        Ok((amount, Value::from(currency.filter(|c| !c.is_empty()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<jbidwatcher format="0101">
  <auctions count="3">
    <server name="ebay">
      <auction id="110001">
        <info>
          <title>Carved mask &amp; stand</title>
          <seller><name>masks_r_us</name></seller>
          <start>1500000000000</start>
          <end>1500600000000</end>
          <bidcount>-1</bidcount>
          <highbidder>carol</highbidder>
          <currently price="25.5" currency="USD"/>
          <buynow price="0.0" currency="UNK"/>
          <minimum price="9.99" currency="USD"/>
        </info>
      </auction>
      <auction id="110002">
        <info>
          <title>Tin toy</title>
          <seller>toyshop</seller>
          <start>0</start>
          <bidcount>4</bidcount>
        </info>
      </auction>
      <auction id="110003">
        <info>
          <end>soon</end>
        </info>
      </auction>
    </server>
  </auctions>
</jbidwatcher>
"#;

    fn parse() -> Vec<Result<Observation, SourceError>> {
        parse_str(EXPORT, "export.xml").unwrap()
    }

    #[test]
    fn reads_every_auction() {
        let auctions = parse();
        assert_eq!(auctions.len(), 3);
        let first = auctions[0].as_ref().unwrap();
        assert_eq!(first.fields["listing_id"], Value::text("110001"));
        assert_eq!(first.fields["title"], Value::text("Carved mask & stand"));
        assert_eq!(first.fields["seller"], Value::text("masks_r_us"));
        assert_eq!(first.fields["winner"], Value::text("carol"));
        assert_eq!(first.origin, "export.xml#auction 110001");
    }

    #[test]
    fn milliseconds_become_seconds() {
        let auctions = parse();
        let first = auctions[0].as_ref().unwrap();
        assert_eq!(first.fields["start_time"], Value::Int(1_500_000_000));
        assert_eq!(first.fields["end_time"], Value::Int(1_500_600_000));
        let second = auctions[1].as_ref().unwrap();
        assert_eq!(second.fields["start_time"], Value::Absent);
        assert_eq!(second.fields["end_time"], Value::Absent);
    }

    #[test]
    fn negative_bid_count_is_zero() {
        let auctions = parse();
        assert_eq!(auctions[0].as_ref().unwrap().fields["n_bids"], Value::Int(0));
        assert_eq!(auctions[1].as_ref().unwrap().fields["n_bids"], Value::Int(4));
    }

    #[test]
    fn prices_and_unknown_currency() {
        let auctions = parse();
        let first = auctions[0].as_ref().unwrap();
        assert_eq!(first.fields["price"], Value::Real(25.5));
        assert_eq!(first.fields["currency_code"], Value::text("USD"));
        assert_eq!(first.fields["buy_now_price"], Value::Absent);
        assert_eq!(first.fields["starting_price"], Value::Real(9.99));
        let second = auctions[1].as_ref().unwrap();
        assert_eq!(second.fields["seller"], Value::text("toyshop"));
        assert_eq!(second.fields["price"], Value::Absent);
    }

    #[test]
    fn bad_auction_fails_alone() {
        let auctions = parse();
        let err = auctions[2].as_ref().unwrap_err();
        assert!(matches!(err, SourceError::Field { field: "end", .. }), "{err}");
    }

    #[test]
    fn auction_without_id_is_rejected() {
        let xml = "<jbidwatcher><auctions><server><auction><info><title>x</title></info></auction></server></auctions></jbidwatcher>";
        let auctions = parse_str(xml, "a.xml").unwrap();
        assert!(matches!(auctions[0], Err(SourceError::MissingId { .. })));
    }

    #[test]
    fn auctions_outside_the_server_path_are_ignored() {
        let xml = "<jbidwatcher><auction id=\"1\"><info><title>x</title></info></auction></jbidwatcher>";
        assert!(parse_str(xml, "a.xml").unwrap().is_empty());
    }

    #[test]
    fn malformed_xml_fails_the_file() {
        let err = parse_str("<jbidwatcher><auctions></jbidwatcher>", "bad.xml").unwrap_err();
        assert!(matches!(err, SourceError::Xml { .. }));
    }
}
