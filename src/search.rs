//! Round-trip fare searches: build the results URL, acquire the page once,
//! extract once.

use anyhow::{Result, bail};
use chrono::{Days, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::AcquisitionError;
use crate::extractor::{Extractor, MAX_CANDIDATES};
use crate::fetch::{
    HttpPageSource, PageContent, PageSource, WebDriverPageSource, acquire_with_fallback,
};
use crate::model::SearchResult;

const RESULTS_PATH: &str = "/en/us/fsr/choose-flights";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    pub adults: u8,
}

impl SearchQuery {
    /// Airport codes are trimmed and uppercased. The return date may equal
    /// the departure date but not precede it.
    pub fn new(
        origin: &str,
        destination: &str,
        departure_date: NaiveDate,
        return_date: NaiveDate,
        adults: u8,
    ) -> Result<Self> {
        let origin = origin.trim().to_ascii_uppercase();
        let destination = destination.trim().to_ascii_uppercase();
        if origin.is_empty() || destination.is_empty() {
            bail!("origin and destination are required");
        }
        if return_date < departure_date {
            bail!("return date {return_date} is before departure date {departure_date}");
        }
        if adults == 0 {
            bail!("at least one adult passenger is required");
        }
        Ok(SearchQuery {
            origin,
            destination,
            departure_date,
            return_date,
            adults,
        })
    }

    /// SFO to LAX for one adult.
    pub fn round_trip(departure_date: NaiveDate, return_date: NaiveDate) -> Result<Self> {
        Self::new("SFO", "LAX", departure_date, return_date, 1)
    }

    pub fn route(&self) -> String {
        format!("{}-{}", self.origin, self.destination)
    }
}

/// Results page URL for `query` under `base`, economy, taxes included,
/// sorted by best match.
pub fn build_search_url(base: &str, query: &SearchQuery) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base.trim_end_matches('/'))?.join(RESULTS_PATH)?;
    url.query_pairs_mut()
        .append_pair("f", &query.origin)
        .append_pair("t", &query.destination)
        .append_pair("d", &query.departure_date.format("%Y-%m-%d").to_string())
        .append_pair("r", &query.return_date.format("%Y-%m-%d").to_string())
        .append_pair("sc", "7,7")
        .append_pair("px", &query.adults.to_string())
        .append_pair("taxng", "1")
        .append_pair("newHP", "True")
        .append_pair("clm", "7")
        .append_pair("st", "bestmatches")
        .append_pair("tqp", "R");
    Ok(url)
}

pub struct FareSearch {
    base_url: String,
    extractor: Extractor,
    primary: Box<dyn PageSource>,
    fallback: Option<Box<dyn PageSource>>,
    debug_dir: Option<PathBuf>,
}

impl FareSearch {
    pub fn new(
        base_url: impl Into<String>,
        extractor: Extractor,
        primary: Box<dyn PageSource>,
    ) -> Self {
        FareSearch {
            base_url: base_url.into(),
            extractor,
            primary,
            fallback: None,
            debug_dir: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn PageSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// With `use_browser` the WebDriver source is primary and plain HTTP is
    /// the fallback. Without it plain HTTP is the only source.
    pub fn from_config(config: &ScraperConfig, use_browser: bool) -> Result<Self> {
        let http = HttpPageSource::browser_like(config.request_timeout)?;
        let extractor = Extractor::new()?;

        let mut search = if use_browser {
            let browser = WebDriverPageSource::new(config.webdriver())?;
            FareSearch::new(&config.base_url, extractor, Box::new(browser))
                .with_fallback(Box::new(http))
        } else {
            FareSearch::new(&config.base_url, extractor, Box::new(http))
        };
        if let Some(dir) = &config.debug_dir {
            search = search.with_debug_dir(dir);
        }
        Ok(search)
    }

    /// Acquires the results page for `query` and extracts it. Only a failure
    /// to obtain the page is an error; an unusable page is an empty result.
    #[tracing::instrument(skip(self, query), fields(route = %query.route()))]
    pub async fn run(&self, query: &SearchQuery) -> Result<SearchResult, AcquisitionError> {
        let url = build_search_url(&self.base_url, query)?;
        info!(%url, "Searching fares");

        let page = acquire_with_fallback(
            self.primary.as_ref(),
            self.fallback.as_deref(),
            url.as_str(),
        )
        .await?;
        let result = self.extractor.extract(&page.html, &query.route(), MAX_CANDIDATES);

        info!(
            source = page.source,
            method = %result.extraction_method,
            outbound = result.outbound.len(),
            return_flights = result.return_flights.len(),
            "Search complete"
        );

        if result.is_empty() {
            if let Some(dir) = &self.debug_dir {
                match save_page_source(dir, &page) {
                    Ok(path) => info!(path = %path.display(), "Saved page source for inspection"),
                    Err(e) => warn!(error = %e, "Could not save page source"),
                }
            }
        }
        Ok(result)
    }
}

fn save_page_source(dir: &Path, page: &PageContent) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("debug_{}_{}.html", page.source, stamp));
    std::fs::write(&path, &page.html)?;
    Ok(path)
}

/// Tomorrow and the day after, the dates used when none are given.
pub fn default_dates(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let departure = today + Days::new(1);
    (departure, departure + Days::new(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct StaticPage {
        name: &'static str,
        html: Option<&'static str>,
        calls: AtomicU32,
    }

    impl StaticPage {
        fn serving(name: &'static str, html: &'static str) -> Self {
            Self {
                name,
                html: Some(html),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                html: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for StaticPage {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn acquire(&self, _url: &str) -> Result<PageContent, AcquisitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.html {
                Some(html) => Ok(PageContent {
                    html: html.to_string(),
                    source: self.name,
                }),
                None => Err(AcquisitionError::Status(503)),
            }
        }
    }

    const TWO_CARDS: &str = r#"<html><body>
        <div class="flight-card">6:00 AM 7:30 AM $120 UA 100 Nonstop</div>
        <div class="flight-card">5:00 PM 6:30 PM $140 UA 200 Nonstop</div>
    </body></html>"#;

    #[test]
    fn test_query_normalizes_codes() {
        let q =
            SearchQuery::new(" sfo", "lax ", date("2026-03-01"), date("2026-03-05"), 2).unwrap();
        assert_eq!(q.route(), "SFO-LAX");
        assert_eq!(q.adults, 2);
    }

    #[test]
    fn test_query_rejects_return_before_departure() {
        assert!(SearchQuery::round_trip(date("2026-03-05"), date("2026-03-01")).is_err());
        assert!(SearchQuery::round_trip(date("2026-03-05"), date("2026-03-05")).is_ok());
    }

    #[test]
    fn test_query_rejects_zero_adults() {
        assert!(SearchQuery::new("SFO", "LAX", date("2026-03-01"), date("2026-03-02"), 0).is_err());
    }

    #[test]
    fn test_build_search_url() {
        let q = SearchQuery::round_trip(date("2026-03-01"), date("2026-03-05")).unwrap();
        let url = build_search_url("https://www.united.com/", &q).unwrap();

        assert_eq!(url.path(), "/en/us/fsr/choose-flights");
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            ["f", "t", "d", "r", "sc", "px", "taxng", "newHP", "clm", "st", "tqp"]
        );
        assert_eq!(
            url.as_str(),
            "https://www.united.com/en/us/fsr/choose-flights?f=SFO&t=LAX&d=2026-03-01&r=2026-03-05\
             &sc=7%2C7&px=1&taxng=1&newHP=True&clm=7&st=bestmatches&tqp=R"
        );
    }

    #[test]
    fn test_build_search_url_rejects_bad_base() {
        let q = SearchQuery::round_trip(date("2026-03-01"), date("2026-03-05")).unwrap();
        assert!(build_search_url("not a base", &q).is_err());
    }

    #[test]
    fn test_default_dates() {
        let (dep, ret) = default_dates(date("2026-12-31"));
        assert_eq!(dep, date("2027-01-01"));
        assert_eq!(ret, date("2027-01-02"));
    }

    #[tokio::test]
    async fn test_run_extracts_from_primary() {
        let search = FareSearch::new(
            "https://example.com",
            Extractor::new().unwrap(),
            Box::new(StaticPage::serving("primary", TWO_CARDS)),
        );
        let q = SearchQuery::round_trip(date("2026-03-01"), date("2026-03-05")).unwrap();

        let result = search.run(&q).await.unwrap();
        assert_eq!(result.route, "SFO-LAX");
        assert_eq!(result.outbound.len(), 1);
        assert_eq!(result.return_flights.len(), 1);
    }

    #[tokio::test]
    async fn test_run_uses_fallback_once() {
        let search = FareSearch::new(
            "https://example.com",
            Extractor::new().unwrap(),
            Box::new(StaticPage::failing("primary")),
        )
        .with_fallback(Box::new(StaticPage::serving("fallback", TWO_CARDS)));
        let q = SearchQuery::round_trip(date("2026-03-01"), date("2026-03-05")).unwrap();

        let result = search.run(&q).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_run_propagates_acquisition_failure() {
        let search = FareSearch::new(
            "https://example.com",
            Extractor::new().unwrap(),
            Box::new(StaticPage::failing("primary")),
        )
        .with_fallback(Box::new(StaticPage::failing("fallback")));
        let q = SearchQuery::round_trip(date("2026-03-01"), date("2026-03-05")).unwrap();

        assert!(matches!(search.run(&q).await, Err(AcquisitionError::Status(503))));
    }

    #[tokio::test]
    async fn test_empty_result_saves_page_source() {
        let dir = std::env::temp_dir().join("fare_scraper_test_debug_dir");
        let _ = std::fs::remove_dir_all(&dir);

        let search = FareSearch::new(
            "https://example.com",
            Extractor::new().unwrap(),
            Box::new(StaticPage::serving("primary", "<html><body>Nothing here</body></html>")),
        )
        .with_debug_dir(&dir);
        let q = SearchQuery::round_trip(date("2026-03-01"), date("2026-03-05")).unwrap();

        let result = search.run(&q).await.unwrap();
        assert!(result.is_empty());

        let saved: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(saved.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
