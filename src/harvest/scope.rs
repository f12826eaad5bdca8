//! Scoped ownership of a page session.

use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::traits::{PageSource, PageSourceFactory, SourceError};

/// A page session opened for one URL and owned by one caller.
///
/// Call [`release`](ScopedPage::release) on every path once the page is no
/// longer needed. The session is closed even if acquisition fails half-way
/// (opened but navigation failed). Dropping a `ScopedPage` without releasing
/// it is reported as a warning because the underlying browser session leaks.
pub struct ScopedPage<S: PageSource> {
    source: Option<S>,
    url: String,
}

impl<S: PageSource> ScopedPage<S> {
    /// Opens a session from `factory` and navigates it to `url`.
    ///
    /// Both steps are bounded by `navigation_timeout`.
    pub async fn acquire<F>(
        factory: &F,
        url: &str,
        navigation_timeout: Duration,
    ) -> Result<Self, SourceError>
    where
        F: PageSourceFactory<Source = S>,
    {
        let source = timeout(navigation_timeout, factory.open())
            .await
            .map_err(|_| SourceError::timeout("page source", navigation_timeout))??;

        let navigated = match timeout(navigation_timeout, source.navigate(url)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::timeout(
                format!("navigation to {url}"),
                navigation_timeout,
            )),
        };

        if let Err(e) = navigated {
            if let Err(close_err) = source.close().await {
                warn!(url, error = %close_err, "Failed to close page after navigation error");
            }
            return Err(e);
        }

        Ok(Self {
            source: Some(source),
            url: url.to_string(),
        })
    }

    pub fn page(&self) -> &S {
        match &self.source {
            Some(source) => source,
            None => unreachable!("page accessed after release"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Closes the session. Close failures are logged, never returned.
    pub async fn release(mut self) {
        if let Some(source) = self.source.take() {
            if let Err(e) = source.close().await {
                warn!(url = %self.url, error = %e, "Failed to close page source");
            }
        }
    }
}

impl<S: PageSource> Drop for ScopedPage<S> {
    fn drop(&mut self) {
        if self.source.is_some() {
            warn!(url = %self.url, "Page source dropped without release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::fake::{FakePage, FakeSite};

    #[tokio::test]
    async fn test_release_closes_session() {
        let site = FakeSite::new().with_page("https://shop.test/a", FakePage::default());

        let page = ScopedPage::acquire(&site, "https://shop.test/a", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(page.url(), "https://shop.test/a");
        page.release().await;

        assert_eq!(site.stats().opened(), 1);
        assert_eq!(site.stats().closed(), 1);
    }

    #[tokio::test]
    async fn test_failed_navigation_still_closes_session() {
        let site = FakeSite::new().with_failing_url("https://shop.test/broken");

        let result =
            ScopedPage::acquire(&site, "https://shop.test/broken", Duration::from_secs(1)).await;

        assert!(matches!(result, Err(SourceError::Navigation { .. })));
        assert_eq!(site.stats().opened(), 1);
        assert_eq!(site.stats().closed(), 1);
    }
}
