//! Non-interactive page source: a single GET with browser-like headers.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use super::client::{BasicClient, HttpClient};
use super::headers::BrowserHeaders;
use super::{PageContent, PageSource, fetch_text, pacing};
use crate::error::AcquisitionError;

/// Bounded retry for transient HTTP failures. The wait before attempt `n + 1`
/// is `backoff * n`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_secs(1),
            statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, err: &AcquisitionError) -> bool {
        match err {
            AcquisitionError::Status(code) => self.statuses.contains(code),
            AcquisitionError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub struct HttpPageSource<C> {
    client: C,
    retry: RetryPolicy,
}

impl HttpPageSource<BrowserHeaders<BasicClient>> {
    /// Page source with a rotating desktop user agent and default retries.
    pub fn browser_like(timeout: Duration) -> Result<Self, AcquisitionError> {
        let client = BrowserHeaders::new(BasicClient::new(timeout)?, pacing::random_user_agent());
        Ok(Self::new(client, RetryPolicy::default()))
    }
}

impl<C: HttpClient> HttpPageSource<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl<C: HttpClient> PageSource for HttpPageSource<C> {
    fn name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(skip(self), fields(source = "http"))]
    async fn acquire(&self, url: &str) -> Result<PageContent, AcquisitionError> {
        let mut attempt = 1;
        loop {
            match fetch_text(&self.client, url).await {
                Ok(html) => {
                    info!(attempt, bytes = html.len(), "Page fetched");
                    return Ok(PageContent {
                        html,
                        source: self.name(),
                    });
                }
                Err(e) if attempt < self.retry.attempts && self.retry.is_retryable(&e) => {
                    let wait = self.retry.backoff * attempt;
                    warn!(
                        attempt,
                        error = %e,
                        wait_ms = wait.as_millis() as u64,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
