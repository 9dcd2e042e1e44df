use tracing::{info, warn};

use super::{PageContent, PageSource};
use crate::error::AcquisitionError;

/// Acquires `url` from `primary`. If that fails and a `fallback` is
/// configured, the fallback is tried exactly once and its outcome is final.
pub async fn acquire_with_fallback(
    primary: &dyn PageSource,
    fallback: Option<&dyn PageSource>,
    url: &str,
) -> Result<PageContent, AcquisitionError> {
    match primary.acquire(url).await {
        Ok(page) => Ok(page),
        Err(e) => match fallback {
            Some(fallback) => {
                warn!(
                    primary = primary.name(),
                    fallback = fallback.name(),
                    error = %e,
                    "Primary page source failed, falling back"
                );
                let page = fallback.acquire(url).await?;
                info!(source = page.source, "Fallback acquisition succeeded");
                Ok(page)
            }
            None => {
                warn!(primary = primary.name(), error = %e, "No fallback page source configured");
                Err(e)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        name: &'static str,
        succeed: bool,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(name: &'static str, succeed: bool) -> Self {
            Self {
                name,
                succeed,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn acquire(&self, _url: &str) -> Result<PageContent, AcquisitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(PageContent {
                    html: "<html></html>".to_string(),
                    source: self.name,
                })
            } else {
                Err(AcquisitionError::Blocked)
            }
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Scripted::new("primary", true);
        let fallback = Scripted::new("fallback", true);

        let page = acquire_with_fallback(&primary, Some(&fallback), "https://example.com")
            .await
            .unwrap();

        assert_eq!(page.source, "primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_tries_fallback_once() {
        let primary = Scripted::new("primary", false);
        let fallback = Scripted::new("fallback", true);

        let page = acquire_with_fallback(&primary, Some(&fallback), "https://example.com")
            .await
            .unwrap();

        assert_eq!(page.source, "fallback");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_failing_returns_error() {
        let primary = Scripted::new("primary", false);
        let fallback = Scripted::new("fallback", false);

        let result = acquire_with_fallback(&primary, Some(&fallback), "https://example.com").await;

        assert!(matches!(result, Err(AcquisitionError::Blocked)));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_returns_primary_error() {
        let primary = Scripted::new("primary", false);

        let result = acquire_with_fallback(&primary, None, "https://example.com").await;

        assert!(result.is_err());
        assert_eq!(primary.calls(), 1);
    }
}
