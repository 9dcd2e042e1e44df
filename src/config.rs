//! Runtime settings read from the environment.
//!
//! The binary loads a `.env` file first, so every variable below may live
//! there instead:
//!
//! ```text
//! WEBDRIVER_URL=http://localhost:9515
//! FARE_BASE_URL=https://www.united.com
//! HEADLESS=true
//! REQUEST_TIMEOUT_SECS=30
//! RESULTS_TIMEOUT_SECS=20
//! HUMAN_PACING=true
//! DEBUG_DIR=debug
//! OUTPUT_DIR=.
//! ```

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{Pacing, WebDriverConfig};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_BASE_URL: &str = "https://www.united.com";

/// Words that suggest flight content on a page whose results container
/// was not recognized.
const CONTENT_KEYWORDS: &[&str] = &["flight", "departure", "arrival", "price", "duration"];

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub webdriver_url: String,
    pub base_url: String,
    pub headless: bool,
    pub request_timeout: Duration,
    pub results_timeout: Duration,
    pub human_pacing: bool,
    /// Where to dump page sources that yielded nothing.
    pub debug_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        ScraperConfig {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            headless: true,
            request_timeout: Duration::from_secs(30),
            results_timeout: Duration::from_secs(20),
            human_pacing: true,
            debug_dir: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ScraperConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for unset or
    /// empty variables. Malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ScraperConfig::default();

        let headless = match get("HEADLESS") {
            Some(v) => parse_bool("HEADLESS", &v)?,
            None => defaults.headless,
        };
        let human_pacing = match get("HUMAN_PACING") {
            Some(v) => parse_bool("HUMAN_PACING", &v)?,
            None => defaults.human_pacing,
        };
        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => parse_secs("REQUEST_TIMEOUT_SECS", &v)?,
            None => defaults.request_timeout,
        };
        let results_timeout = match get("RESULTS_TIMEOUT_SECS") {
            Some(v) => parse_secs("RESULTS_TIMEOUT_SECS", &v)?,
            None => defaults.results_timeout,
        };

        Ok(ScraperConfig {
            webdriver_url: get("WEBDRIVER_URL").unwrap_or(defaults.webdriver_url),
            base_url: get("FARE_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            headless,
            request_timeout,
            results_timeout,
            human_pacing,
            debug_dir: get("DEBUG_DIR").map(PathBuf::from),
            output_dir: get("OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
        })
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.human_pacing)
    }

    /// Browser settings derived from this config. The page budget covers the
    /// request timeout, the results wait and a minute of pacing and popups.
    pub fn webdriver(&self) -> WebDriverConfig {
        WebDriverConfig {
            endpoint: self.webdriver_url.clone(),
            headless: self.headless,
            page_timeout: self.request_timeout + self.results_timeout + Duration::from_secs(60),
            results_timeout: self.results_timeout,
            pacing: self.pacing(),
            content_keywords: CONTENT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got {other:?}"),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds"))?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ScraperConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.webdriver_url, DEFAULT_WEBDRIVER_URL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.headless);
        assert!(config.human_pacing);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.results_timeout, Duration::from_secs(20));
        assert!(config.debug_dir.is_none());
        assert_eq!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_overrides() {
        let config = ScraperConfig::from_lookup(lookup(&[
            ("WEBDRIVER_URL", "http://chrome:4444"),
            ("FARE_BASE_URL", "http://localhost:8080/"),
            ("HEADLESS", "false"),
            ("HUMAN_PACING", "0"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("DEBUG_DIR", "/tmp/debug"),
        ]))
        .unwrap();

        assert_eq!(config.webdriver_url, "http://chrome:4444");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(!config.headless);
        assert!(!config.human_pacing);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.debug_dir, Some(PathBuf::from("/tmp/debug")));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config =
            ScraperConfig::from_lookup(lookup(&[("HEADLESS", ""), ("DEBUG_DIR", "  ")])).unwrap();
        assert!(config.headless);
        assert!(config.debug_dir.is_none());
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert!(ScraperConfig::from_lookup(lookup(&[("HEADLESS", "maybe")])).is_err());
        assert!(ScraperConfig::from_lookup(lookup(&[("REQUEST_TIMEOUT_SECS", "soon")])).is_err());
        assert!(ScraperConfig::from_lookup(lookup(&[("RESULTS_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_webdriver_config() {
        let config = ScraperConfig::default();
        let wd = config.webdriver();
        assert_eq!(wd.endpoint, DEFAULT_WEBDRIVER_URL);
        assert!(wd.headless);
        assert_eq!(wd.results_timeout, Duration::from_secs(20));
        assert!(wd.page_timeout > wd.results_timeout);
        assert!(wd.content_keywords.iter().any(|k| k == "flight"));
    }
}
