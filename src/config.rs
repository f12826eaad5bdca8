//! Runtime configuration for a harvest run.
//!
//! Everything site-specific (URLs, CSS selectors, timeouts) lives here so the
//! harvest core only ever sees a [`HarvestConfig`]. Defaults match the live
//! catalogue; a JSON file can override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "TOPS_HARVESTER_CONFIG";
/// Environment variable overriding the WebDriver server URL.
pub const WEBDRIVER_URL_ENV: &str = "TOPS_HARVESTER_WEBDRIVER_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Landing page listing the top-level categories
    pub base_url: String,

    /// JSONL file records are appended to
    pub output_path: PathBuf,

    /// Maximum number of subcategory tasks running at once
    pub concurrency: usize,

    pub convergence: ConvergencePolicy,
    pub timeouts: Timeouts,
    pub selectors: SiteSelectors,
    pub browser: BrowserConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.tops.co.th/en".to_string(),
            output_path: PathBuf::from("tops_products.jsonl"),
            concurrency: 3,
            convergence: ConvergencePolicy::default(),
            timeouts: Timeouts::default(),
            selectors: SiteSelectors::default(),
            browser: BrowserConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Builds the process configuration from defaults, the optional file
    /// named by [`CONFIG_ENV`], and the [`WEBDRIVER_URL_ENV`] override.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_json_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(WEBDRIVER_URL_ENV) {
            config.browser.webdriver_url = url;
        }
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the worker limit. Zero is clamped to one.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_convergence(mut self, policy: ConvergencePolicy) -> Self {
        self.convergence = policy;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Bounds for the scroll-until-loaded loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergencePolicy {
    /// Consecutive rounds without growth before giving up
    pub max_stall_rounds: u32,

    /// Hard ceiling on total rounds
    pub max_rounds: u32,

    /// How long to wait for the count to grow after each load-more action
    pub growth_wait_ms: u64,

    /// Interval between count checks while waiting
    pub poll_interval_ms: u64,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            max_stall_rounds: 5,
            max_rounds: 50,
            growth_wait_ms: 10_000,
            poll_interval_ms: 250,
        }
    }
}

impl ConvergencePolicy {
    pub fn growth_wait(&self) -> Duration {
        Duration::from_millis(self.growth_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Upper bounds for every blocking page interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_secs: u64,
    pub page_ready_secs: u64,
    pub landing_elements_secs: u64,
    pub category_elements_secs: u64,
    pub product_presence_secs: u64,
    /// Whole subcategory task, including convergence and extraction
    pub task_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_secs: 30,
            page_ready_secs: 15,
            landing_elements_secs: 20,
            category_elements_secs: 10,
            product_presence_secs: 10,
            task_secs: 600,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn page_ready(&self) -> Duration {
        Duration::from_secs(self.page_ready_secs)
    }

    pub fn landing_elements(&self) -> Duration {
        Duration::from_secs(self.landing_elements_secs)
    }

    pub fn category_elements(&self) -> Duration {
        Duration::from_secs(self.category_elements_secs)
    }

    pub fn product_presence(&self) -> Duration {
        Duration::from_secs(self.product_presence_secs)
    }

    pub fn task(&self) -> Duration {
        Duration::from_secs(self.task_secs)
    }
}

/// CSS selectors for the catalogue markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    pub category_link: String,
    pub category_name_attr: String,
    pub subcategory_link: String,
    pub subcategory_label: String,
    pub subcategory_count: String,
    pub product: ProductSelectors,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            category_link: ".shop-by-category__card a".to_string(),
            category_name_attr: "aria-label".to_string(),
            subcategory_link: ".ais-RefinementList-item a".to_string(),
            subcategory_label: ".ais-RefinementList-label".to_string(),
            subcategory_count: ".ais-RefinementList-count".to_string(),
            product: ProductSelectors::default(),
        }
    }
}

/// Selectors evaluated relative to one product tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSelectors {
    pub item: String,
    pub name: String,
    pub link: String,
    pub image: String,
    pub price: String,
    pub quantity: String,
    pub promotions: String,
    pub badge: String,
    pub brand: String,
    pub rating: String,
}

impl Default for ProductSelectors {
    fn default() -> Self {
        Self {
            item: ".product-item".to_string(),
            name: ".product-tile__name".to_string(),
            link: "a".to_string(),
            image: "img".to_string(),
            price: ".price-number".to_string(),
            quantity: ".price-label".to_string(),
            promotions: ".product-item-promo-name".to_string(),
            badge: ".product-item-badge".to_string(),
            brand: ".brand-name".to_string(),
            rating: ".product-rating".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub user_agent: String,
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/110.0.5481.77 Safari/537.36"
                .to_string(),
            args: [
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--window-size=1920x1080",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,

    /// Log file; `None` logs to stderr
    pub log_file: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_file: Some(PathBuf::from("scraper.log")),
        }
    }
}
