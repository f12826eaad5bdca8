//! Mapping of one rendered product tile to a [`ProductRecord`].

use chrono::Utc;
use tracing::{debug, error};

use crate::config::ProductSelectors;
use crate::model::{ProductRecord, NOT_AVAILABLE, NO_RATING, UNKNOWN_BRAND};
use crate::traits::{ItemHandle, SourceError};

/// Extracts a product from `item`.
///
/// Returns `None` when the tile has no readable name or link, or when
/// reading them fails. Every other field falls back to its placeholder.
pub async fn extract<H: ItemHandle>(
    item: &H,
    category: &str,
    selectors: &ProductSelectors,
) -> Option<ProductRecord> {
    match try_extract(item, category, selectors).await {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            error!(category, "Error extracting product data: missing name or link");
            None
        }
        Err(e) => {
            error!(category, error = %e, "Error extracting product data");
            None
        }
    }
}

async fn try_extract<H: ItemHandle>(
    item: &H,
    category: &str,
    selectors: &ProductSelectors,
) -> Result<Option<ProductRecord>, SourceError> {
    let Some(product_name) = required_text(item, &selectors.name).await? else {
        return Ok(None);
    };
    let Some(product_url) = required_attr(item, &selectors.link, "href").await? else {
        return Ok(None);
    };

    let image_url = optional_attr(item, &selectors.image, "src", NOT_AVAILABLE).await;
    let price = optional_text(item, &selectors.price, NOT_AVAILABLE).await;
    let quantity = optional_text(item, &selectors.quantity, NOT_AVAILABLE).await;
    let promotions = optional_text(item, &selectors.promotions, NOT_AVAILABLE).await;
    let badges = optional_attr(item, &selectors.badge, "alt", NOT_AVAILABLE).await;
    let brand = optional_text(item, &selectors.brand, UNKNOWN_BRAND).await;
    let rating = optional_text(item, &selectors.rating, NO_RATING).await;

    Ok(Some(ProductRecord {
        product_name,
        brand,
        rating,
        product_url,
        image_url,
        quantity,
        price,
        promotions,
        badges,
        category: category.to_string(),
        scraped_at: Utc::now(),
    }))
}

async fn required_text<H: ItemHandle>(
    item: &H,
    selector: &str,
) -> Result<Option<String>, SourceError> {
    match item.find_first(selector).await? {
        Some(node) => Ok(Some(node.text().await?.trim().to_string())),
        None => Ok(None),
    }
}

async fn required_attr<H: ItemHandle>(
    item: &H,
    selector: &str,
    attr: &str,
) -> Result<Option<String>, SourceError> {
    match item.find_first(selector).await? {
        Some(node) => Ok(node.attr(attr).await?.filter(|value| !value.is_empty())),
        None => Ok(None),
    }
}

async fn optional_text<H: ItemHandle>(item: &H, selector: &str, fallback: &str) -> String {
    match required_text(item, selector).await {
        Ok(Some(text)) => text,
        Ok(None) => fallback.to_string(),
        Err(e) => {
            debug!(selector, error = %e, "Optional field unreadable");
            fallback.to_string()
        }
    }
}

async fn optional_attr<H: ItemHandle>(
    item: &H,
    selector: &str,
    attr: &str,
    fallback: &str,
) -> String {
    match required_attr(item, selector, attr).await {
        Ok(Some(value)) => value,
        Ok(None) => fallback.to_string(),
        Err(e) => {
            debug!(selector, attr, error = %e, "Optional attribute unreadable");
            fallback.to_string()
        }
    }
}
