//! Structural pass: flight cards found by CSS selector.

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

use super::patterns::FarePatterns;
use crate::model::{Direction, FlightRecord};

/// Card selectors, most specific first. Only the first one that matches is used.
pub const CARD_SELECTORS: &[&str] = &[
    "[data-testid='flight-card']",
    ".flight-card",
    ".flight-result",
    ".flight-option",
    ".search-result-item",
    ".flight-details",
    "[class*='flight'][class*='card']",
    "[class*='flight-row']",
];

/// Selectors expected to hold both times of a card, departure first.
pub const TIME_SELECTORS: &[&str] = &["[data-testid*='time']", ".time"];

pub const DEPARTURE_TIME_SELECTOR: &str = ".departure-time";
pub const ARRIVAL_TIME_SELECTOR: &str = ".arrival-time";

pub const PRICE_SELECTORS: &[&str] = &[
    "[data-testid*='price']",
    ".price",
    ".fare",
    ".cost",
];

/// A named selector applied as a pure function over a document or element.
pub struct CardMatcher {
    pub name: &'static str,
    selector: Selector,
}

impl CardMatcher {
    pub fn parse(name: &'static str) -> Result<Self> {
        let selector =
            Selector::parse(name).map_err(|e| anyhow!("invalid selector {name}: {e:?}"))?;
        Ok(CardMatcher { name, selector })
    }

    pub fn in_document<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&self.selector).collect()
    }

    pub fn in_element<'a>(&self, element: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        element.select(&self.selector).collect()
    }
}

pub fn compile(selectors: &[&'static str]) -> Result<Vec<CardMatcher>> {
    selectors.iter().copied().map(CardMatcher::parse).collect()
}

/// Visible text of an element with whitespace collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Direction declared by the card itself or one of its ancestors.
pub fn direction_marker(card: ElementRef<'_>) -> Option<Direction> {
    if let Some(direction) = marker_on(card) {
        return Some(direction);
    }
    card.ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(marker_on)
}

fn marker_on(element: ElementRef<'_>) -> Option<Direction> {
    let value = element.value();
    for attr in ["data-direction", "data-trip-direction"] {
        if let Some(direction) = value.attr(attr).and_then(parse_direction) {
            return Some(direction);
        }
    }
    value.classes().find_map(parse_direction)
}

fn parse_direction(token: &str) -> Option<Direction> {
    match token.trim().to_ascii_lowercase().as_str() {
        "outbound" => Some(Direction::Outbound),
        "return" | "inbound" => Some(Direction::Return),
        _ => None,
    }
}

/// Field sub-selectors applied inside a card.
pub struct FieldMatchers {
    pub times: Vec<CardMatcher>,
    pub departure: CardMatcher,
    pub arrival: CardMatcher,
    pub prices: Vec<CardMatcher>,
}

impl FieldMatchers {
    pub fn new() -> Result<Self> {
        Ok(FieldMatchers {
            times: compile(TIME_SELECTORS)?,
            departure: CardMatcher::parse(DEPARTURE_TIME_SELECTOR)?,
            arrival: CardMatcher::parse(ARRIVAL_TIME_SELECTOR)?,
            prices: compile(PRICE_SELECTORS)?,
        })
    }
}

fn first_text(matcher: &CardMatcher, card: ElementRef<'_>) -> Option<String> {
    matcher
        .in_element(card)
        .into_iter()
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Builds a record from one card. Returns `None` for a card with no text.
pub fn parse_card(
    card: ElementRef<'_>,
    direction: Direction,
    patterns: &FarePatterns,
    fields: &FieldMatchers,
) -> Option<FlightRecord> {
    let text = element_text(card);
    if text.is_empty() {
        return None;
    }

    let mut record = FlightRecord::new(direction, text.as_str());

    let times = patterns.times(&text);
    if times.len() >= 2 {
        record.departure_time = Some(times[0].clone());
        record.arrival_time = Some(times[1].clone());
    }
    record.price_usd_text = patterns.first_price_usd(&text);
    record.price_miles_text = patterns.first_price_miles(&text);
    record.duration_text = patterns.first_duration(&text);
    record.flight_number = patterns.first_flight_number(&text);
    record.stops = patterns.stops(&text);

    // Dedicated elements beat whatever the free-text scan found.
    for matcher in &fields.times {
        let found: Vec<String> = matcher
            .in_element(card)
            .into_iter()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        if found.len() >= 2 {
            record.departure_time = Some(found[0].clone());
            record.arrival_time = Some(found[1].clone());
            break;
        }
    }
    if let Some(departure) = first_text(&fields.departure, card) {
        record.departure_time = Some(departure);
    }
    if let Some(arrival) = first_text(&fields.arrival, card) {
        record.arrival_time = Some(arrival);
    }

    let mut usd = None;
    let mut miles = None;
    for matcher in &fields.prices {
        for element in matcher.in_element(card) {
            let price = element_text(element);
            let lower = price.to_lowercase();
            if price.contains('$') {
                usd.get_or_insert(price);
            } else if lower.contains("miles") || lower.contains("points") {
                miles.get_or_insert(price);
            }
        }
    }
    if usd.is_some() {
        record.price_usd_text = usd;
    }
    if miles.is_some() {
        record.price_miles_text = miles;
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_card(html: &str) -> (Html, CardMatcher) {
        (Html::parse_fragment(html), CardMatcher::parse(".flight-card").unwrap())
    }

    #[test]
    fn test_all_selectors_compile() {
        assert_eq!(compile(CARD_SELECTORS).unwrap().len(), CARD_SELECTORS.len());
        assert!(FieldMatchers::new().is_ok());
    }

    #[test]
    fn test_element_text_collapses_whitespace() {
        let (doc, m) =
            first_card("<div class='flight-card'>\n  <b>6:00 AM</b>\n\n<i>UA 1</i> </div>");
        let card = m.in_document(&doc)[0];
        assert_eq!(element_text(card), "6:00 AM UA 1");
    }

    #[test]
    fn test_marker_on_ancestor() {
        let (doc, m) = first_card(
            "<section class='results return'><div class='flight-card'>x</div></section>",
        );
        let card = m.in_document(&doc)[0];
        assert_eq!(direction_marker(card), Some(Direction::Return));
    }

    #[test]
    fn test_marker_attribute() {
        let (doc, m) = first_card("<div class='flight-card' data-direction='Outbound'>x</div>");
        let card = m.in_document(&doc)[0];
        assert_eq!(direction_marker(card), Some(Direction::Outbound));
    }

    #[test]
    fn test_no_marker() {
        let (doc, m) = first_card("<div class='flight-card'>x</div>");
        let card = m.in_document(&doc)[0];
        assert_eq!(direction_marker(card), None);
    }

    #[test]
    fn test_miles_from_price_element() {
        let (doc, m) = first_card(
            "<div class='flight-card'>7:00 AM 8:10 AM <span class='fare'>25,000 miles</span></div>",
        );
        let patterns = FarePatterns::new("UA", "United").unwrap();
        let fields = FieldMatchers::new().unwrap();
        let card = m.in_document(&doc)[0];

        let record = parse_card(card, Direction::Outbound, &patterns, &fields).unwrap();
        assert_eq!(record.price_miles_text.as_deref(), Some("25,000 miles"));
        assert_eq!(record.price_usd_text, None);
    }

    #[test]
    fn test_single_time_leaves_both_absent() {
        let (doc, m) = first_card("<div class='flight-card'>Departs 6:00 AM $99</div>");
        let patterns = FarePatterns::new("UA", "United").unwrap();
        let fields = FieldMatchers::new().unwrap();
        let card = m.in_document(&doc)[0];

        let record = parse_card(card, Direction::Outbound, &patterns, &fields).unwrap();
        assert_eq!(record.departure_time, None);
        assert_eq!(record.arrival_time, None);
        assert_eq!(record.price_usd_text.as_deref(), Some("$99"));
    }

    #[test]
    fn test_dedicated_time_elements_beat_earlier_text() {
        let (doc, m) = first_card(
            "<div class='flight-card'><p>Updated 5:00 PM</p>\
             <span class='departure-time'>6:00 AM</span>\
             <span class='arrival-time'>9:15 AM</span> $245</div>",
        );
        let patterns = FarePatterns::new("UA", "United").unwrap();
        let fields = FieldMatchers::new().unwrap();
        let card = m.in_document(&doc)[0];

        let record = parse_card(card, Direction::Outbound, &patterns, &fields).unwrap();
        assert_eq!(record.departure_time.as_deref(), Some("6:00 AM"));
        assert_eq!(record.arrival_time.as_deref(), Some("9:15 AM"));
        assert_eq!(record.price_usd_text.as_deref(), Some("$245"));
    }

    #[test]
    fn test_lone_departure_element_keeps_text_arrival() {
        let (doc, m) = first_card(
            "<div class='flight-card'>7:00 AM 8:10 AM \
             <span class='departure-time'>7:05 AM</span></div>",
        );
        let patterns = FarePatterns::new("UA", "United").unwrap();
        let fields = FieldMatchers::new().unwrap();
        let card = m.in_document(&doc)[0];

        let record = parse_card(card, Direction::Outbound, &patterns, &fields).unwrap();
        assert_eq!(record.departure_time.as_deref(), Some("7:05 AM"));
        assert_eq!(record.arrival_time.as_deref(), Some("8:10 AM"));
    }

    #[test]
    fn test_unlisted_direction_words_are_not_markers() {
        let (doc, m) = first_card("<div class='flight-card departing'>x</div>");
        let card = m.in_document(&doc)[0];
        assert_eq!(direction_marker(card), None);
    }

    #[test]
    fn test_empty_card_is_skipped() {
        let (doc, m) = first_card("<div class='flight-card'>   </div>");
        let patterns = FarePatterns::new("UA", "United").unwrap();
        let fields = FieldMatchers::new().unwrap();
        let card = m.in_document(&doc)[0];

        assert!(parse_card(card, Direction::Return, &patterns, &fields).is_none());
    }
}
