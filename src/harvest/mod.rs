//! Harvest module - catalogue scraping core.
//!
//! This module provides the building blocks of a harvest run:
//! - **Scope**: page sessions that are always released via [`ScopedPage`]
//! - **Loader**: the scroll-until-loaded convergence loop ([`load_until`])
//! - **Extract**: product tile → [`ProductRecord`](crate::model::ProductRecord)
//! - **Task**: one subcategory end to end via [`SubcategoryTask`]
//! - **Pipeline**: enumeration and bounded dispatch via [`HarvestPipeline`]

pub mod extract;
pub mod loader;
pub mod pipeline;
pub mod scope;
pub mod task;

#[cfg(test)]
pub(crate) mod fake;

// Re-export commonly used types
pub use extract::extract;
pub use loader::{load_until, wait_for_presence, Convergence, StopReason};
pub use pipeline::{DispatchKey, HarvestError, HarvestPipeline, HarvestReport};
pub use scope::ScopedPage;
pub use task::SubcategoryTask;
