//! Scraping of one subcategory listing.

use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::config::HarvestConfig;
use crate::executor::TaskError;
use crate::harvest::extract::extract;
use crate::harvest::loader::{load_until, wait_for_presence, StopReason};
use crate::harvest::scope::ScopedPage;
use crate::model::{ProductRecord, SubcategoryLink};
use crate::traits::{PageSource, PageSourceFactory, SourceError};

/// Loads a subcategory page to completion and extracts every product on it.
///
/// Each run opens its own page session and releases it before returning,
/// including on timeout and error paths.
pub struct SubcategoryTask<F: PageSourceFactory> {
    factory: Arc<F>,
    config: Arc<HarvestConfig>,
}

impl<F: PageSourceFactory> Clone for SubcategoryTask<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            config: Arc::clone(&self.config),
        }
    }
}

impl<F: PageSourceFactory> SubcategoryTask<F> {
    pub fn new(factory: Arc<F>, config: Arc<HarvestConfig>) -> Self {
        Self { factory, config }
    }

    /// Returns the extracted products in page order. Tiles that could not be
    /// extracted are skipped.
    #[instrument(skip(self, link), fields(subcategory = %link.name, listed = link.listed_count))]
    pub async fn run(&self, link: &SubcategoryLink) -> Result<Vec<ProductRecord>, TaskError> {
        let timeouts = &self.config.timeouts;
        let page =
            ScopedPage::acquire(self.factory.as_ref(), &link.url, timeouts.navigation()).await?;

        let result = match timeout(timeouts.task(), self.scrape(page.page(), link)).await {
            Ok(result) => result,
            Err(_) => Err(TaskError::TimedOut {
                subcategory: link.name.clone(),
                timeout_secs: timeouts.task_secs,
            }),
        };

        page.release().await;
        result
    }

    async fn scrape(
        &self,
        page: &F::Source,
        link: &SubcategoryLink,
    ) -> Result<Vec<ProductRecord>, TaskError> {
        let selectors = &self.config.selectors.product;
        let convergence =
            load_until(page, &selectors.item, link.listed_count, &self.config.convergence).await?;
        if convergence.reason != StopReason::Reached && link.listed_count > 0 {
            warn!(
                loaded = convergence.loaded,
                "Partial listing for {}: {} of {} loaded",
                link.name,
                convergence.loaded,
                link.listed_count
            );
        }

        match wait_for_presence(
            page,
            &selectors.item,
            self.config.timeouts.product_presence(),
            self.config.convergence.poll_interval(),
        )
        .await
        {
            Ok(_) => {}
            Err(SourceError::Timeout { .. }) => {
                warn!("No products found in {}", link.name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        }

        let items = page.find_all(&selectors.item).await?;
        info!("Found {} products in {}", items.len(), link.name);

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            if let Some(record) = extract(item, &link.name, selectors).await {
                records.push(record);
            }
        }

        let skipped = items.len() - records.len();
        if skipped > 0 {
            warn!(skipped, "Skipped {} unreadable products in {}", skipped, link.name);
        }
        Ok(records)
    }
}
