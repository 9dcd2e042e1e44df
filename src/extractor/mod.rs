//! Fare extraction from a search-results page.
//!
//! Extraction is a single degrading pass over the markup: the first card
//! selector that matches anything wins, and if none does the whole document
//! is mined for loose prices and times. The pass never fails; an unusable
//! page yields an empty [`SearchResult`].

mod cards;
mod patterns;
mod text;

pub use cards::{
    ARRIVAL_TIME_SELECTOR, CARD_SELECTORS, CardMatcher, DEPARTURE_TIME_SELECTOR, PRICE_SELECTORS,
    TIME_SELECTORS,
};
pub use patterns::FarePatterns;

use anyhow::Result;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

use crate::error::ExtractionIssue;
use crate::model::{Direction, ExtractionMethod, SearchResult};
use cards::FieldMatchers;

/// Upper bound on candidates processed per page.
pub const MAX_CANDIDATES: usize = 20;

pub const DEFAULT_CARRIER_CODE: &str = "UA";
pub const DEFAULT_CARRIER_NAME: &str = "United";

/// Direction for the `index`-th of `total` candidates when the page gives no
/// hint: the first half (rounded up) is outbound.
pub(crate) fn positional_direction(index: usize, total: usize) -> Direction {
    if index < total.div_ceil(2) {
        Direction::Outbound
    } else {
        Direction::Return
    }
}

pub struct Extractor {
    cards: Vec<CardMatcher>,
    fields: FieldMatchers,
    patterns: FarePatterns,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Self::with_carrier(DEFAULT_CARRIER_CODE, DEFAULT_CARRIER_NAME)
    }

    pub fn with_carrier(carrier_code: &str, carrier_name: &str) -> Result<Self> {
        Ok(Extractor {
            cards: cards::compile(CARD_SELECTORS)?,
            fields: FieldMatchers::new()?,
            patterns: FarePatterns::new(carrier_code, carrier_name)?,
        })
    }

    /// Extracts at most `min(max_records, MAX_CANDIDATES)` records from `page`.
    #[tracing::instrument(skip(self, page), fields(bytes = page.len()))]
    pub fn extract(&self, page: &str, route: &str, max_records: usize) -> SearchResult {
        let limit = max_records.min(MAX_CANDIDATES);
        let document = Html::parse_document(page);

        let result = match self.match_cards(&document) {
            Some((selector, matched)) => {
                info!(selector, matched = matched.len(), "Flight cards found");
                self.from_cards(matched, route, limit)
            }
            None => {
                debug!(issue = %ExtractionIssue::NoStructuralMatch, "Falling back to text mining");
                let mut result = SearchResult::new(route, ExtractionMethod::FallbackHtmlParse);
                for record in text::records_from_text(&document, &self.patterns, limit) {
                    result.push(record);
                }
                if result.is_empty() {
                    debug!(issue = %ExtractionIssue::NoTextualMatch, "No prices or times found");
                }
                result
            }
        };

        for (index, record) in result.records().enumerate() {
            if record.is_partial() {
                debug!(
                    issue = %ExtractionIssue::PartialRecord,
                    index,
                    "Record has unresolved fields"
                );
            }
        }

        info!(
            method = %result.extraction_method,
            outbound = result.outbound.len(),
            return_flights = result.return_flights.len(),
            "Extraction finished"
        );
        result
    }

    /// First selector in the cascade with at least one match.
    fn match_cards<'a>(&self, document: &'a Html) -> Option<(&'static str, Vec<ElementRef<'a>>)> {
        self.cards.iter().find_map(|matcher| {
            let found = matcher.in_document(document);
            if found.is_empty() {
                None
            } else {
                Some((matcher.name, found))
            }
        })
    }

    fn from_cards(&self, matched: Vec<ElementRef<'_>>, route: &str, limit: usize) -> SearchResult {
        let mut result = SearchResult::new(route, ExtractionMethod::Structured);
        let total = matched.len().min(limit);

        for (index, card) in matched.into_iter().take(limit).enumerate() {
            let direction = cards::direction_marker(card)
                .unwrap_or_else(|| positional_direction(index, total));

            match cards::parse_card(card, direction, &self.patterns, &self.fields) {
                Some(record) => result.push(record),
                None => debug!(index, "Skipping card without text"),
            }
        }

        result
    }
}
