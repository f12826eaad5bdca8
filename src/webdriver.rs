//! Headless Chrome page source driven through a WebDriver server.
//!
//! Each [`PageSourceFactory::open`] starts a new browser session on the
//! configured server (e.g. a local `chromedriver`), so sessions never share
//! state. Sessions must be closed with [`PageSource::close`], which quits the
//! browser.

use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver, WebElement};
use tracing::debug;

use crate::config::BrowserConfig;
use crate::traits::{ItemHandle, PageSource, PageSourceFactory, SourceError};

const READY_POLL: Duration = Duration::from_millis(250);
const SCROLL_ONE_VIEWPORT: &str = "window.scrollBy(0, window.innerHeight);";

impl From<WebDriverError> for SourceError {
    fn from(e: WebDriverError) -> Self {
        SourceError::Driver(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    config: BrowserConfig,
}

impl WebDriverFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageSourceFactory for WebDriverFactory {
    type Source = BrowserPage;

    async fn open(&self) -> Result<BrowserPage, SourceError> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in &self.config.args {
            caps.add_arg(arg)?;
        }
        caps.add_arg(&format!("--user-agent={}", self.config.user_agent))?;

        let driver = WebDriver::new(self.config.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        debug!(server = %self.config.webdriver_url, "Browser session started");
        Ok(BrowserPage { driver })
    }
}

pub struct BrowserPage {
    driver: WebDriver,
}

impl BrowserPage {
    async fn is_ready(&self) -> Result<bool, SourceError> {
        let state = self
            .driver
            .execute("return document.readyState", Vec::new())
            .await
            .map_err(|e| SourceError::Script(e.to_string()))?;
        Ok(state.json().as_str() == Some("complete"))
    }

    async fn poll_ready(&self) -> Result<(), SourceError> {
        while !self.is_ready().await? {
            tokio::time::sleep(READY_POLL).await;
        }
        Ok(())
    }
}

#[async_trait]
impl PageSource for BrowserPage {
    type Item = BrowserItem;

    async fn navigate(&self, url: &str) -> Result<(), SourceError> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| SourceError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), SourceError> {
        tokio::time::timeout(timeout, self.poll_ready())
            .await
            .map_err(|_| SourceError::timeout("document ready state", timeout))?
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<BrowserItem>, SourceError> {
        let elements = self.driver.find_all(By::Css(selector)).await?;
        Ok(elements.into_iter().map(BrowserItem).collect())
    }

    async fn load_more(&self) -> Result<(), SourceError> {
        self.driver
            .execute(SCROLL_ONE_VIEWPORT, Vec::new())
            .await
            .map_err(|e| SourceError::Script(e.to_string()))?;
        Ok(())
    }

    async fn close(self) -> Result<(), SourceError> {
        self.driver.quit().await?;
        Ok(())
    }
}

/// One element inside a [`BrowserPage`].
pub struct BrowserItem(WebElement);

#[async_trait]
impl ItemHandle for BrowserItem {
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>, SourceError> {
        let elements = self.0.find_all(By::Css(selector)).await?;
        Ok(elements.into_iter().map(BrowserItem).collect())
    }

    async fn text(&self) -> Result<String, SourceError> {
        Ok(self.0.text().await?)
    }

    /// DOM property first (resolved URLs for `href`/`src`), then the raw
    /// attribute.
    async fn attr(&self, name: &str) -> Result<Option<String>, SourceError> {
        if let Some(value) = self.0.prop(name).await? {
            return Ok(Some(value));
        }
        Ok(self.0.attr(name).await?)
    }
}
