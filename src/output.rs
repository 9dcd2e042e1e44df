//! Output formatting and persistence for search results.
//!
//! Supports a logged summary, pretty JSON, and a flat CSV with one row per
//! flight.

use anyhow::{Context, Result};
use chrono::Utc;
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::{FlightRecord, SearchResult, Stops};

/// Serializes a result as pretty-printed JSON.
pub fn to_json(result: &SearchResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// One CSV row: a flight with its leg and route repeated alongside.
#[derive(Debug, Serialize)]
pub struct FlightRow<'a> {
    pub direction: String,
    pub route: &'a str,
    pub departure_time: Option<&'a str>,
    pub arrival_time: Option<&'a str>,
    pub duration_text: Option<&'a str>,
    pub stops: Option<Stops>,
    pub price_usd_text: Option<&'a str>,
    pub price_miles_text: Option<&'a str>,
    pub flight_number: Option<&'a str>,
    pub raw_text: &'a str,
}

impl<'a> FlightRow<'a> {
    pub fn new(route: &'a str, record: &'a FlightRecord) -> Self {
        FlightRow {
            direction: record.direction.to_string(),
            route,
            departure_time: record.departure_time.as_deref(),
            arrival_time: record.arrival_time.as_deref(),
            duration_text: record.duration_text.as_deref(),
            stops: record.stops,
            price_usd_text: record.price_usd_text.as_deref(),
            price_miles_text: record.price_miles_text.as_deref(),
            flight_number: record.flight_number.as_deref(),
            raw_text: &record.raw_text,
        }
    }
}

/// Rows for every record, outbound first.
pub fn rows(result: &SearchResult) -> Vec<FlightRow<'_>> {
    result
        .records()
        .map(|record| FlightRow::new(&result.route, record))
        .collect()
}

/// Writes a header and one row per record. Absent fields are empty cells.
pub fn write_csv<W: Write>(writer: W, result: &SearchResult) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows(result) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// `united_flights_<YYYYmmdd_HHMMSS>` for the current time.
pub fn default_stem() -> String {
    format!("united_flights_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Writes `<stem>.json` and `<stem>.csv` under `dir` and returns their
/// paths. An empty result writes nothing.
pub fn save_results(dir: &Path, result: &SearchResult, stem: &str) -> Result<Vec<PathBuf>> {
    if result.is_empty() {
        info!(route = %result.route, "No flight data to save");
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let json_path = dir.join(format!("{stem}.json"));
    std::fs::write(&json_path, to_json(result)?)
        .with_context(|| format!("writing {}", json_path.display()))?;
    info!(path = %json_path.display(), "Flight data saved");

    let csv_path = dir.join(format!("{stem}.csv"));
    let file = std::fs::File::create(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    write_csv(file, result)?;
    info!(path = %csv_path.display(), rows = result.len(), "Flight data saved");

    Ok(vec![json_path, csv_path])
}

/// Logs record counts and the populated fields of the first outbound flight.
pub fn print_summary(result: &SearchResult) {
    info!(
        route = %result.route,
        method = %result.extraction_method,
        outbound = result.outbound.len(),
        return_flights = result.return_flights.len(),
        "Search results"
    );

    if let Some(sample) = result.outbound.first() {
        info!(
            departure = sample.departure_time.as_deref(),
            arrival = sample.arrival_time.as_deref(),
            duration = sample.duration_text.as_deref(),
            stops = sample.stops.map(|s| s.to_string()),
            price_usd = sample.price_usd_text.as_deref(),
            price_miles = sample.price_miles_text.as_deref(),
            flight = sample.flight_number.as_deref(),
            "Sample outbound flight"
        );
    }
    debug!("{:#?}", result);
}
