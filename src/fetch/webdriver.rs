//! Browser page source driving a W3C WebDriver endpoint (chromedriver).
//!
//! Each acquisition opens its own session and always ends it before
//! returning, whether the page was obtained or not.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::pacing::{self, Pacing};
use super::{PageContent, PageSource};
use crate::error::AcquisitionError;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Phrases that show up on interstitial or bot-check pages.
pub const BLOCK_MARKERS: &[&str] = &[
    "sorry",
    "unable to complete",
    "blocked",
    "access denied",
    "please try again",
    "security",
    "robot",
    "captcha",
];

/// Selectors whose presence means the results list has rendered.
pub const RESULT_SELECTORS: &[&str] = &[
    ".flight-results",
    "[data-testid*='flight']",
    ".search-results",
    ".flights-container",
    ".flight-card",
    ".flight-list",
    ".results-container",
    "[class*='result']",
    "[class*='flight']",
    ".flight-option",
    ".trip-option",
];

const POPUP_LOCATORS: &[Locator] = &[
    Locator::XPath("//button[contains(text(), 'Accept')]"),
    Locator::XPath("//button[contains(text(), 'OK')]"),
    Locator::XPath("//button[contains(text(), 'Close')]"),
    Locator::XPath("//button[contains(text(), 'Dismiss')]"),
    Locator::XPath("//button[contains(text(), 'Continue')]"),
    Locator::Css(".cookie-accept"),
    Locator::Css(".modal-close"),
    Locator::Css("[data-testid*='close']"),
    Locator::Css(".close-button"),
    Locator::Css(".dismiss-button"),
    Locator::Css("[aria-label*='close']"),
    Locator::Css(".overlay-close"),
];

const STEALTH_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = { runtime: {} };
"#;

const CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-images",
    "--no-first-run",
    "--disable-default-apps",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
];

#[derive(Debug, Clone, Copy)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl Locator {
    fn strategy(&self) -> (&'static str, &'static str) {
        match self {
            Locator::Css(value) => ("css selector", *value),
            Locator::XPath(value) => ("xpath", *value),
        }
    }
}

/// True when the page text contains any bot-check phrase.
pub fn looks_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Chrome capabilities for a new session.
pub fn chrome_capabilities(headless: bool, user_agent: &str, window: (u32, u32)) -> Value {
    let mut args: Vec<String> = CHROME_ARGS.iter().map(|a| a.to_string()).collect();
    if headless {
        args.insert(0, "--headless=new".to_string());
    }
    args.push(format!("--window-size={},{}", window.0, window.1));
    args.push(format!("--user-agent={user_agent}"));

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": args,
                    "excludeSwitches": ["enable-automation"],
                    "useAutomationExtension": false,
                    "prefs": {
                        "profile.default_content_setting_values.notifications": 2,
                        "profile.default_content_settings.popups": 0,
                        "profile.managed_default_content_settings.images": 2
                    }
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Deserialize)]
struct CommandError {
    error: String,
    #[serde(default)]
    message: String,
}

/// A live WebDriver session. Call [`WebDriverSession::end`] when done.
pub struct WebDriverSession {
    http: reqwest::Client,
    base: String,
    id: String,
    ended: bool,
}

impl WebDriverSession {
    pub async fn start(
        http: reqwest::Client,
        endpoint: &str,
        capabilities: Value,
    ) -> Result<Self, AcquisitionError> {
        let url = format!("{}/session", endpoint.trim_end_matches('/'));
        let value = send(&http, Method::POST, &url, Some(capabilities)).await?;
        let created: NewSession = serde_json::from_value(value)
            .map_err(|e| AcquisitionError::WebDriver(format!("bad new-session reply: {e}")))?;

        info!(session_id = %created.session_id, "WebDriver session started");
        Ok(WebDriverSession {
            base: format!("{url}/{}", created.session_id),
            id: created.session_id,
            http,
            ended: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AcquisitionError> {
        let url = format!("{}{}", self.base, path);
        send(&self.http, method, &url, body).await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), AcquisitionError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    pub async fn refresh(&self) -> Result<(), AcquisitionError> {
        self.command(Method::POST, "/refresh", Some(json!({})))
            .await
            .map(|_| ())
    }

    pub async fn source(&self) -> Result<String, AcquisitionError> {
        let value = self.command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AcquisitionError::WebDriver("page source was not a string".into()))
    }

    pub async fn execute(&self, script: &str) -> Result<Value, AcquisitionError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    /// Chrome DevTools command through chromedriver's vendor endpoint.
    pub async fn cdp(&self, cmd: &str, params: Value) -> Result<Value, AcquisitionError> {
        self.command(
            Method::POST,
            "/goog/cdp/execute",
            Some(json!({ "cmd": cmd, "params": params })),
        )
        .await
    }

    pub async fn find_elements(&self, locator: Locator) -> Result<Vec<String>, AcquisitionError> {
        let (using, value) = locator.strategy();
        let found = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;

        Ok(found
            .as_array()
            .map(|elements| {
                elements
                    .iter()
                    .filter_map(|e| e[ELEMENT_KEY].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn click_if_displayed(&self, element_id: &str) -> Result<bool, AcquisitionError> {
        let displayed = self
            .command(Method::GET, &format!("/element/{element_id}/displayed"), None)
            .await?;
        if displayed.as_bool() != Some(true) {
            return Ok(false);
        }
        self.command(
            Method::POST,
            &format!("/element/{element_id}/click"),
            Some(json!({})),
        )
        .await?;
        Ok(true)
    }

    pub async fn override_user_agent(&self, user_agent: &str) -> Result<(), AcquisitionError> {
        self.cdp(
            "Network.setUserAgentOverride",
            json!({
                "userAgent": user_agent,
                "acceptLanguage": "en-US,en;q=0.9",
                "platform": pacing::platform_for(user_agent),
            }),
        )
        .await
        .map(|_| ())
    }

    /// Deletes the session on the driver.
    pub async fn end(mut self) -> Result<(), AcquisitionError> {
        self.ended = true;
        self.command(Method::DELETE, "", None).await?;
        info!(session_id = %self.id, "WebDriver session ended");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.ended {
            warn!(session_id = %self.id, "WebDriver session dropped without being ended");
        }
    }
}

async fn send(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, AcquisitionError> {
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let mut payload: Value = response.json().await?;
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if !status.is_success() {
        let detail = serde_json::from_value::<CommandError>(value)
            .map(|e| format!("{}: {}", e.error, e.message))
            .unwrap_or_else(|_| format!("HTTP {status}"));
        return Err(AcquisitionError::WebDriver(detail));
    }
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub endpoint: String,
    pub headless: bool,
    /// Budget for the whole acquisition, session start to page source.
    pub page_timeout: Duration,
    /// How long to poll for a results container before giving up on it.
    pub results_timeout: Duration,
    pub pacing: Pacing,
    /// Lowercased words that indicate flight content on an unrecognized page.
    pub content_keywords: Vec<String>,
}

pub struct WebDriverPageSource {
    http: reqwest::Client,
    config: WebDriverConfig,
}

impl WebDriverPageSource {
    pub fn new(config: WebDriverConfig) -> Result<Self, AcquisitionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    async fn drive(
        &self,
        session: &WebDriverSession,
        url: &str,
        user_agent: &str,
    ) -> Result<String, AcquisitionError> {
        let pace = self.config.pacing;

        if let Err(e) = session
            .cdp("Page.addScriptToEvaluateOnNewDocument", json!({ "source": STEALTH_JS }))
            .await
        {
            debug!(error = %e, "Could not install stealth script");
        }
        if let Err(e) = session.override_user_agent(user_agent).await {
            debug!(error = %e, "Could not override user agent");
        }

        pace.pause(Duration::from_secs(2), Duration::from_secs(5), "before navigation").await;
        info!(url, "Navigating to search results");
        session.navigate(url).await?;
        pace.pause(Duration::from_secs(8), Duration::from_secs(15), "page load").await;

        session.execute("window.scrollTo(0, 300);").await?;
        pace.pause(Duration::from_secs(1), Duration::from_secs(3), "scroll").await;
        session.execute("window.scrollTo(0, 0);").await?;
        pace.pause(Duration::from_secs(1), Duration::from_secs(2), "scroll").await;

        let mut blocked = looks_blocked(&session.source().await?);
        if blocked {
            warn!("Page looks blocked, rotating user agent and refreshing once");
            let rotated = pacing::rotate_user_agent(user_agent);
            if let Err(e) = session.override_user_agent(rotated).await {
                warn!(error = %e, "Could not rotate user agent");
            }
            pace.pause(Duration::from_secs(5), Duration::from_secs(10), "before refresh").await;
            session.refresh().await?;
            pace.pause(Duration::from_secs(8), Duration::from_secs(12), "after refresh").await;
            blocked = looks_blocked(&session.source().await?);
        }

        self.dismiss_popups(session).await;

        if !self.wait_for_results(session).await {
            let html = session.source().await?;
            if blocked {
                return Err(AcquisitionError::Blocked);
            }
            let lower = html.to_lowercase();
            if self.config.content_keywords.iter().any(|k| lower.contains(k.as_str())) {
                info!("No results container, but page mentions flights; extracting anyway");
            } else {
                warn!("Page does not look like a results page");
            }
        }

        pace.pause(Duration::from_secs(5), Duration::from_secs(5), "render").await;
        session.source().await
    }

    /// Clicks the first visible cookie banner or modal close button, if any.
    async fn dismiss_popups(&self, session: &WebDriverSession) {
        self.config
            .pacing
            .pause(Duration::from_secs(3), Duration::from_secs(3), "popups")
            .await;

        for locator in POPUP_LOCATORS {
            let Ok(elements) = session.find_elements(*locator).await else {
                continue;
            };
            let Some(first) = elements.first() else {
                continue;
            };
            match session.click_if_displayed(first).await {
                Ok(true) => {
                    info!(?locator, "Closed popup");
                    self.config
                        .pacing
                        .pause(Duration::from_secs(1), Duration::from_secs(1), "after popup")
                        .await;
                    return;
                }
                Ok(false) => {}
                Err(e) => debug!(?locator, error = %e, "Popup click failed"),
            }
        }
    }

    /// Polls the result selectors until one matches or the timeout elapses.
    async fn wait_for_results(&self, session: &WebDriverSession) -> bool {
        let deadline = Instant::now() + self.config.results_timeout;
        loop {
            for &selector in RESULT_SELECTORS {
                if let Ok(found) = session.find_elements(Locator::Css(selector)).await {
                    if !found.is_empty() {
                        info!(selector, "Results detected");
                        return true;
                    }
                }
            }
            if Instant::now() >= deadline {
                warn!("Could not detect search results with standard selectors");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

#[async_trait]
impl PageSource for WebDriverPageSource {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    #[tracing::instrument(skip(self), fields(source = "webdriver"))]
    async fn acquire(&self, url: &str) -> Result<PageContent, AcquisitionError> {
        let user_agent = pacing::random_user_agent();
        let capabilities =
            chrome_capabilities(self.config.headless, user_agent, pacing::random_window_size());
        let session =
            WebDriverSession::start(self.http.clone(), &self.config.endpoint, capabilities).await?;
        debug!(session_id = session.id(), user_agent, "Driving browser session");

        let outcome = tokio::time::timeout(
            self.config.page_timeout,
            self.drive(&session, url, user_agent),
        )
        .await
        .unwrap_or(Err(AcquisitionError::Timeout));

        if let Err(e) = session.end().await {
            warn!(error = %e, "Failed to end WebDriver session");
        }

        outcome.map(|html| PageContent {
            html,
            source: self.name(),
        })
    }
}
