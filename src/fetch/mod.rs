//! Page acquisition: plain HTTP, a WebDriver-controlled browser, and the
//! one-shot fallback between them.

mod client;
mod fallback;
mod headers;
mod http;
pub mod pacing;
pub mod webdriver;

pub use client::{BasicClient, HttpClient};
pub use fallback::acquire_with_fallback;
pub use headers::BrowserHeaders;
pub use http::{HttpPageSource, RetryPolicy};
pub use pacing::Pacing;
pub use webdriver::{WebDriverConfig, WebDriverPageSource};

use async_trait::async_trait;

use crate::error::AcquisitionError;

/// Raw markup of a results page and the source that produced it.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub html: String,
    pub source: &'static str,
}

/// Anything that can turn a URL into page markup.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(&self, url: &str) -> Result<PageContent, AcquisitionError>;
}

/// GETs `url` through `client` and returns the body as text. Non-success
/// statuses are errors.
pub async fn fetch_text<C: HttpClient>(client: &C, url: &str) -> Result<String, AcquisitionError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url::Url::parse(url)?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AcquisitionError::Status(status.as_u16()));
    }
    Ok(resp.text().await?)
}
