use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for optional fields that have no better default.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder for a product without a brand label.
pub const UNKNOWN_BRAND: &str = "Unknown";
/// Placeholder for a product without a rating widget.
pub const NO_RATING: &str = "No rating";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryLink {
    pub name: String,
    pub url: String,
    /// Product count shown next to the link. Only a convergence hint.
    pub listed_count: usize,
}

/// One product as written to the output stream.
///
/// Field names are the on-disk names consumed downstream, so they must not
/// change. `scraped_at` is serialized as `date_scraped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_name: String,
    pub brand: String,
    pub rating: String,
    pub product_url: String,
    pub image_url: String,
    pub quantity: String,
    pub price: String,
    pub promotions: String,
    pub badges: String,
    pub category: String,
    #[serde(rename = "date_scraped")]
    pub scraped_at: DateTime<Utc>,
}

/// Per-subcategory line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub category: String,
    pub subcategory: String,
    pub listed: usize,
    pub scraped: usize,
}

impl SummaryEntry {
    pub fn pending(category: &str, link: &SubcategoryLink) -> Self {
        Self {
            category: category.to_string(),
            subcategory: link.name.clone(),
            listed: link.listed_count,
            scraped: 0,
        }
    }
}

/// Best-effort parse of a displayed product count such as `"1,234"` or `"(87)"`.
///
/// Anything that is not a plain unsigned number after stripping separators
/// yields 0.
pub fn parse_listed_count(raw: &str) -> usize {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return 0;
    }
    cleaned.parse().unwrap_or(0)
}
