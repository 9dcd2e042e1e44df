//! Flight records and the search result container produced by the extractor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Leg of the round trip a record was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Return,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("outbound"),
            Direction::Return => f.write_str("return"),
        }
    }
}

/// Number of stops advertised on a flight card.
///
/// `Unknown` means the card mentions stops but not a count we recognize.
/// A card that never mentions stops gets no value at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stops {
    Nonstop,
    OneStop,
    TwoStop,
    Unknown,
}

impl fmt::Display for Stops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stops::Nonstop => "nonstop",
            Stops::OneStop => "one-stop",
            Stops::TwoStop => "two-stop",
            Stops::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Which branch of the extraction cascade produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    Structured,
    FallbackHtmlParse,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Structured => f.write_str("structured"),
            ExtractionMethod::FallbackHtmlParse => f.write_str("fallback-html-parse"),
        }
    }
}

/// One candidate flight recovered from a results page.
///
/// Every optional field is resolved on its own; a missing price says nothing
/// about whether the times were found. Values are kept exactly as matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightRecord {
    pub direction: Direction,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub duration_text: Option<String>,
    pub stops: Option<Stops>,
    pub price_usd_text: Option<String>,
    pub price_miles_text: Option<String>,
    pub flight_number: Option<String>,
    pub raw_text: String,
}

impl FlightRecord {
    pub fn new(direction: Direction, raw_text: impl Into<String>) -> Self {
        FlightRecord {
            direction,
            departure_time: None,
            arrival_time: None,
            duration_text: None,
            stops: None,
            price_usd_text: None,
            price_miles_text: None,
            flight_number: None,
            raw_text: raw_text.into(),
        }
    }

    /// True when at least one optional field could not be resolved.
    pub fn is_partial(&self) -> bool {
        self.departure_time.is_none()
            || self.arrival_time.is_none()
            || self.duration_text.is_none()
            || self.stops.is_none()
            || self.price_usd_text.is_none()
            || self.price_miles_text.is_none()
            || self.flight_number.is_none()
    }
}

/// Records found during one search attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub outbound: Vec<FlightRecord>,
    #[serde(rename = "return")]
    pub return_flights: Vec<FlightRecord>,
    pub search_timestamp: DateTime<Utc>,
    pub route: String,
    pub extraction_method: ExtractionMethod,
}

impl SearchResult {
    pub fn new(route: &str, extraction_method: ExtractionMethod) -> Self {
        SearchResult {
            outbound: Vec::new(),
            return_flights: Vec::new(),
            search_timestamp: Utc::now(),
            route: route.to_string(),
            extraction_method,
        }
    }

    /// Appends a record to the list matching its direction.
    pub fn push(&mut self, record: FlightRecord) {
        match record.direction {
            Direction::Outbound => self.outbound.push(record),
            Direction::Return => self.return_flights.push(record),
        }
    }

    pub fn len(&self) -> usize {
        self.outbound.len() + self.return_flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outbound records followed by return records, in extraction order.
    pub fn records(&self) -> impl Iterator<Item = &FlightRecord> {
        self.outbound.iter().chain(self.return_flights.iter())
    }
}
