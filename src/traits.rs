use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open page source: {0}")]
    Unavailable(String),
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Timed out waiting for {what} after {timeout_secs}s")]
    Timeout { what: String, timeout_secs: u64 },
    #[error("Script execution failed: {0}")]
    Script(String),
    #[error("Driver error: {0}")]
    Driver(String),
}

impl SourceError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        SourceError::Timeout {
            what: what.into(),
            timeout_secs: after.as_secs(),
        }
    }
}

/// Creates independent browsing sessions.
///
/// Every session returned by [`open`](PageSourceFactory::open) is owned by
/// exactly one caller and must be handed back through
/// [`PageSource::close`] when that caller is done.
#[async_trait]
pub trait PageSourceFactory: Send + Sync + 'static {
    type Source: PageSource;

    async fn open(&self) -> Result<Self::Source, SourceError>;
}

/// A single page session: navigation, readiness, element queries and
/// incremental loading.
///
/// An element that is not on the page is reported as an empty result from
/// [`find_all`](PageSource::find_all), never as an error.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: ItemHandle;

    async fn navigate(&self, url: &str) -> Result<(), SourceError>;

    /// Blocks until the document reports itself loaded, or `timeout` elapses.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), SourceError>;

    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Item>, SourceError>;

    /// Triggers one incremental load, e.g. scrolling by one viewport.
    async fn load_more(&self) -> Result<(), SourceError>;

    async fn close(self) -> Result<(), SourceError>;
}

/// Read access to one rendered element.
#[async_trait]
pub trait ItemHandle: Send + Sync + Sized {
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>, SourceError>;

    async fn text(&self) -> Result<String, SourceError>;

    async fn attr(&self, name: &str) -> Result<Option<String>, SourceError>;

    /// First descendant matching `selector`, if any.
    async fn find_first(&self, selector: &str) -> Result<Option<Self>, SourceError> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }
}
