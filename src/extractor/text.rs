//! Whole-document text mining, used when no flight card selector matches.
//!
//! Prices, times and flight numbers are collected independently and then
//! zipped by position. Nothing ties the i-th price to the i-th pair of times,
//! so every field of a mined record is individually unreliable.

use scraper::{Html, Node};

use super::patterns::FarePatterns;
use super::positional_direction;
use crate::model::FlightRecord;

/// A matched value and the text node it came from.
#[derive(Debug, Clone)]
struct Fragment {
    value: String,
    source: String,
}

#[derive(Debug, Default)]
struct Mined {
    prices: Vec<Fragment>,
    times: Vec<Fragment>,
    flight_numbers: Vec<Fragment>,
}

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Text nodes of the document in order, excluding script and style bodies.
fn text_nodes(document: &Html) -> Vec<String> {
    let mut nodes = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| SKIPPED_ELEMENTS.contains(&name));
        if skipped {
            continue;
        }
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            nodes.push(collapsed);
        }
    }
    nodes
}

fn mine(document: &Html, patterns: &FarePatterns) -> Mined {
    let mut mined = Mined::default();
    for source in text_nodes(document) {
        let fragment = |value: String| Fragment {
            value,
            source: source.clone(),
        };
        mined
            .prices
            .extend(patterns.prices_usd(&source).into_iter().map(fragment));
        mined
            .times
            .extend(patterns.times(&source).into_iter().map(fragment));
        mined
            .flight_numbers
            .extend(patterns.flight_numbers(&source).into_iter().map(fragment));
    }
    mined
}

/// Reconstructs up to `limit` records from loose text matches.
pub fn records_from_text(
    document: &Html,
    patterns: &FarePatterns,
    limit: usize,
) -> Vec<FlightRecord> {
    let mined = mine(document, patterns);
    let count = mined.prices.len().min(mined.times.len() / 2).min(limit);

    tracing::debug!(
        prices = mined.prices.len(),
        times = mined.times.len(),
        flight_numbers = mined.flight_numbers.len(),
        count,
        "Mined page text"
    );

    (0..count)
        .map(|i| {
            let price = &mined.prices[i];
            let departure = &mined.times[i * 2];
            let arrival = &mined.times[i * 2 + 1];
            let flight = mined.flight_numbers.get(i);

            let mut sources: Vec<&str> = Vec::new();
            for fragment in [Some(price), Some(departure), Some(arrival), flight]
                .into_iter()
                .flatten()
            {
                if !sources.contains(&fragment.source.as_str()) {
                    sources.push(&fragment.source);
                }
            }

            let mut record = FlightRecord::new(positional_direction(i, count), sources.join(" "));
            record.price_usd_text = Some(price.value.clone());
            record.departure_time = Some(departure.value.clone());
            record.arrival_time = Some(arrival.value.clone());
            record.flight_number = flight.map(|f| f.value.clone());
            record
        })
        .collect()
}
