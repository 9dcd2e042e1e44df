//! CLI entry point for the fare scraper.
//!
//! Provides subcommands for running a live round-trip search and for
//! extracting fares from a saved results page or a single URL.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use fare_scraper::{
    config::ScraperConfig,
    extractor::{Extractor, MAX_CANDIDATES},
    fetch::{HttpPageSource, PageSource},
    output::{default_stem, print_summary, save_results},
    search::{FareSearch, SearchQuery, default_dates},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fare_scraper")]
#[command(about = "Scrape round-trip airline fares from a results page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search round-trip fares and save them as JSON and CSV
    Search {
        /// Departure date (YYYY-MM-DD), defaults to tomorrow
        #[arg(short, long)]
        departure: Option<NaiveDate>,

        /// Return date (YYYY-MM-DD), defaults to the day after departure
        #[arg(short, long)]
        return_date: Option<NaiveDate>,

        /// Number of adult passengers
        #[arg(short, long, default_value_t = 1)]
        adults: u8,

        #[arg(long, default_value = "SFO")]
        origin: String,

        #[arg(long, default_value = "LAX")]
        destination: String,

        /// Skip the browser and fetch the page over plain HTTP
        #[arg(long, default_value_t = false)]
        no_browser: bool,

        /// Show the browser window
        #[arg(long, default_value_t = false)]
        headed: bool,

        /// Directory for result files (overrides OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Extract fares from a saved HTML page or a URL
    Extract {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Route label for the result
        #[arg(long, default_value = "SFO-LAX")]
        route: String,

        /// Maximum number of records to keep
        #[arg(short, long, default_value_t = MAX_CANDIDATES)]
        max_records: usize,

        /// Directory for result files (overrides OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fare_scraper.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fare_scraper.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = ScraperConfig::from_env().context("reading configuration")?;

    match cli.command {
        Commands::Search {
            departure,
            return_date,
            adults,
            origin,
            destination,
            no_browser,
            headed,
            output_dir,
        } => {
            let (default_departure, _) = default_dates(Local::now().date_naive());
            let departure = departure.unwrap_or(default_departure);
            let return_date = return_date.unwrap_or_else(|| default_dates(departure).0);
            let query = SearchQuery::new(&origin, &destination, departure, return_date, adults)?;

            if headed {
                config.headless = false;
            }
            info!(
                route = %query.route(),
                departure = %query.departure_date,
                return_date = %query.return_date,
                adults = query.adults,
                browser = !no_browser,
                "Starting fare search"
            );

            let search = FareSearch::from_config(&config, !no_browser)?;
            let result = search.run(&query).await?;

            print_summary(&result);
            let dir = output_dir.unwrap_or(config.output_dir);
            save_results(&dir, &result, &default_stem())?;
        }
        Commands::Extract {
            source,
            route,
            max_records,
            output_dir,
        } => {
            let html = load_page(&source, &config).await?;
            let result = Extractor::new()?.extract(&html, &route, max_records);

            print_summary(&result);
            let dir = output_dir.unwrap_or(config.output_dir);
            save_results(&dir, &result, &default_stem())?;
        }
    }

    Ok(())
}

/// Loads page markup from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(config), fields(source = %source))]
async fn load_page(source: &str, config: &ScraperConfig) -> Result<String> {
    let html = if source.starts_with("http") {
        let page = HttpPageSource::browser_like(config.request_timeout)?
            .acquire(source)
            .await?;
        page.html
    } else {
        let bytes = std::fs::read(source).with_context(|| format!("reading {source}"))?;
        decode_page(&bytes)
    };
    Ok(html)
}

/// Saved pages are not always valid UTF-8; invalid sequences become U+FFFD.
fn decode_page(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
