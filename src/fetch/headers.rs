use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, USER_AGENT};

/// Headers a desktop browser sends on a top-level navigation.
const NAVIGATION_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.5"),
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("cache-control", "max-age=0"),
];

/// An [`HttpClient`] wrapper that makes plain fetches look like a browser
/// navigation: a fixed user agent plus the usual navigation headers.
///
/// Headers already present on the request are left alone.
pub struct BrowserHeaders<C> {
    pub inner: C,
    user_agent: HeaderValue,
}

impl<C> BrowserHeaders<C> {
    pub fn new(inner: C, user_agent: &'static str) -> Self {
        Self {
            inner,
            user_agent: HeaderValue::from_static(user_agent),
        }
    }

    fn apply(&self, req: &mut reqwest::Request) {
        let headers = req.headers_mut();
        headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        for &(name, value) in NAVIGATION_HEADERS {
            headers
                .entry(HeaderName::from_static(name))
                .or_insert_with(|| HeaderValue::from_static(value));
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for BrowserHeaders<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.apply(&mut req);
        self.inner.execute(req).await
    }
}
