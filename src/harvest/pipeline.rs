//! Harvest scheduler.
//!
//! This module provides the [`HarvestPipeline`] coordinator that runs a full
//! catalogue harvest:
//! 1. **Category enumeration** from the landing page
//! 2. **Subcategory enumeration**, one page per category, sequentially
//! 3. **Dispatch** of one [`SubcategoryTask`] per subcategory to a bounded
//!    [`HarvestExecutor`]
//! 4. **Merge** of task results in submission order into a [`HarvestReport`]
//!
//! Only an empty landing page aborts a run. Every other failure is logged and
//! confined to the category or subcategory it happened in.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::HarvestConfig;
use crate::executor::{HarvestExecutor, TaskOutcome};
use crate::harvest::loader::wait_for_presence;
use crate::harvest::scope::ScopedPage;
use crate::harvest::task::SubcategoryTask;
use crate::model::{parse_listed_count, CategoryLink, ProductRecord, SubcategoryLink, SummaryEntry};
use crate::traits::{ItemHandle, PageSource, PageSourceFactory, SourceError};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Everything a harvest run produced.
#[derive(Debug, Default)]
pub struct HarvestReport {
    /// Extracted products, grouped by subcategory in dispatch order
    pub records: Vec<ProductRecord>,

    /// One entry per dispatched subcategory, in dispatch order
    pub summary: Vec<SummaryEntry>,
}

impl HarvestReport {
    pub fn total_listed(&self) -> usize {
        self.summary.iter().map(|entry| entry.listed).sum()
    }

    pub fn total_scraped(&self) -> usize {
        self.summary.iter().map(|entry| entry.scraped).sum()
    }
}

/// Identity of one dispatched subcategory. Results are matched back to
/// their summary entry through this key, never by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub category: String,
    pub subcategory_url: String,
}

#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// The landing page yielded nothing to harvest
    #[error("No categories found at {url}")]
    NoCategories { url: String },
}

// ============================================================================
// Pipeline Executor
// ============================================================================

pub struct HarvestPipeline<F: PageSourceFactory> {
    factory: Arc<F>,
    config: Arc<HarvestConfig>,
    cancel: CancellationToken,
}

impl<F: PageSourceFactory> HarvestPipeline<F> {
    pub fn new(factory: F, config: HarvestConfig) -> Self {
        Self {
            factory: Arc::new(factory),
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops dispatching once `token` is cancelled. Subcategories already
    /// being scraped run to completion.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Harvests the first `category_limit` categories, or all of them when
    /// the limit is 0.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::NoCategories`] if the landing page could not
    /// be enumerated at all.
    #[instrument(skip(self))]
    pub async fn run(&self, category_limit: usize) -> Result<HarvestReport, HarvestError> {
        let mut categories = self.enumerate_categories().await;
        if categories.is_empty() {
            return Err(HarvestError::NoCategories {
                url: self.config.base_url.clone(),
            });
        }
        if category_limit > 0 {
            categories.truncate(category_limit);
        }
        info!(categories = categories.len(), "Harvesting {} categories", categories.len());

        let task = SubcategoryTask::new(Arc::clone(&self.factory), Arc::clone(&self.config));
        let mut summary = Vec::new();
        let mut slots: HashMap<DispatchKey, usize> = HashMap::new();
        let mut jobs = Vec::new();

        for category in &categories {
            if self.cancel.is_cancelled() {
                warn!(category = %category.name, "Cancelled before enumerating category");
                break;
            }

            let subcategories = self.enumerate_subcategories(category).await;
            info!(
                category = %category.name,
                subcategories = subcategories.len(),
                "Found {} subcategories in {}",
                subcategories.len(),
                category.name
            );

            for link in subcategories {
                let key = DispatchKey {
                    category: category.name.clone(),
                    subcategory_url: link.url.clone(),
                };
                if slots.contains_key(&key) {
                    debug!(subcategory = %link.name, "Duplicate subcategory link ignored");
                    continue;
                }
                slots.insert(key.clone(), summary.len());
                summary.push(SummaryEntry::pending(&category.name, &link));

                let task = task.clone();
                jobs.push((key, async move { task.run(&link).await }));
            }
        }

        let executor = HarvestExecutor::new(self.config.concurrency)
            .with_cancellation(self.cancel.clone());
        let outcomes = executor.run_ordered(jobs).await;

        let mut records = Vec::new();
        for (key, outcome) in outcomes {
            let Some(entry) = slots.get(&key).and_then(|&slot| summary.get_mut(slot)) else {
                continue;
            };
            match outcome {
                TaskOutcome::Completed(batch) => {
                    entry.scraped = batch.len();
                    records.extend(batch);
                }
                TaskOutcome::Failed(e) => {
                    error!(
                        category = %entry.category,
                        subcategory = %entry.subcategory,
                        error = %e,
                        "Subcategory task failed"
                    );
                }
                TaskOutcome::Skipped => {
                    warn!(
                        category = %entry.category,
                        subcategory = %entry.subcategory,
                        "Subcategory skipped after cancellation"
                    );
                }
            }
        }

        info!(records = records.len(), "Harvest finished");
        Ok(HarvestReport { records, summary })
    }

    async fn enumerate_categories(&self) -> Vec<CategoryLink> {
        let url = &self.config.base_url;
        let page = match ScopedPage::acquire(
            self.factory.as_ref(),
            url,
            self.config.timeouts.navigation(),
        )
        .await
        {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, "Error loading categories");
                return Vec::new();
            }
        };

        let result = read_categories(page.page(), &self.config).await;
        page.release().await;

        match result {
            Ok(categories) => {
                info!(categories = categories.len(), "Enumerated categories");
                categories
            }
            Err(e) => {
                error!(error = %e, "Error loading categories");
                Vec::new()
            }
        }
    }

    async fn enumerate_subcategories(&self, category: &CategoryLink) -> Vec<SubcategoryLink> {
        let page = match ScopedPage::acquire(
            self.factory.as_ref(),
            &category.url,
            self.config.timeouts.navigation(),
        )
        .await
        {
            Ok(page) => page,
            Err(e) => {
                error!(category = %category.name, error = %e, "Error loading subcategories");
                return Vec::new();
            }
        };

        let result = read_subcategories(page.page(), &self.config).await;
        page.release().await;

        result.unwrap_or_else(|e| {
            error!(category = %category.name, error = %e, "Error loading subcategories");
            Vec::new()
        })
    }
}

async fn read_categories<S: PageSource>(
    page: &S,
    config: &HarvestConfig,
) -> Result<Vec<CategoryLink>, SourceError> {
    let selectors = &config.selectors;
    page.wait_until_ready(config.timeouts.page_ready()).await?;
    wait_for_presence(
        page,
        &selectors.category_link,
        config.timeouts.landing_elements(),
        config.convergence.poll_interval(),
    )
    .await?;

    let mut categories: Vec<CategoryLink> = Vec::new();
    for element in page.find_all(&selectors.category_link).await? {
        let name = element
            .attr(&selectors.category_name_attr)
            .await?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let url = element.attr("href").await?.filter(|url| !url.is_empty());

        let (Some(name), Some(url)) = (name, url) else {
            debug!("Category link without name or href skipped");
            continue;
        };

        // Same name seen again: keep the first position, take the newer URL.
        match categories.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => existing.url = url,
            None => categories.push(CategoryLink { name, url }),
        }
    }
    Ok(categories)
}

async fn read_subcategories<S: PageSource>(
    page: &S,
    config: &HarvestConfig,
) -> Result<Vec<SubcategoryLink>, SourceError> {
    let selectors = &config.selectors;
    wait_for_presence(
        page,
        &selectors.subcategory_link,
        config.timeouts.category_elements(),
        config.convergence.poll_interval(),
    )
    .await?;

    let mut subcategories = Vec::new();
    for element in page.find_all(&selectors.subcategory_link).await? {
        let Some(url) = element.attr("href").await?.filter(|url| !url.is_empty()) else {
            continue;
        };
        let Some(label) = element.find_first(&selectors.subcategory_label).await? else {
            debug!(url = %url, "Subcategory link without label skipped");
            continue;
        };
        let name = match label.text().await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                debug!(url = %url, error = %e, "Unreadable subcategory label skipped");
                continue;
            }
        };

        let listed_count = match element.find_first(&selectors.subcategory_count).await {
            Ok(Some(count)) => count
                .text()
                .await
                .map(|text| parse_listed_count(&text))
                .unwrap_or(0),
            Ok(None) | Err(_) => 0,
        };

        subcategories.push(SubcategoryLink {
            name,
            url,
            listed_count,
        });
    }
    Ok(subcategories)
}

// ============================================================================
// Tests
// ============================================================================
