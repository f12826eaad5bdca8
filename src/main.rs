use dialoguer::Input;
use std::future::Future;
use std::io;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tops_harvester::sink::{self, JsonlSink};
use tops_harvester::telemetry;
use tops_harvester::webdriver::WebDriverFactory;
use tops_harvester::{HarvestConfig, HarvestPipeline};

#[derive(Error, Debug)]
enum PromptError {
    #[error("Failed to read answer: {0}")]
    Input(#[from] dialoguer::Error),
    #[error("Expected a non-negative whole number, got '{0}'")]
    Invalid(String),
}

/// Empty input means "all categories" (0).
fn parse_category_limit(answer: &str) -> Result<usize, PromptError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(0);
    }
    answer
        .parse()
        .map_err(|_| PromptError::Invalid(answer.to_string()))
}

fn prompt_category_limit() -> Result<usize, PromptError> {
    let answer: String = Input::new()
        .with_prompt("Enter number of categories to scrape (0 for all)")
        .allow_empty(true)
        .interact_text()?;
    parse_category_limit(&answer)
}

/// Counts interrupts from `next_interrupt`. The first cancels `cancel` so no
/// new subcategories are dispatched; the second returns `true` to request an
/// immediate exit. Returns `false` if interrupts can no longer be received.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut interrupts = 0;
    while next_interrupt().await.is_ok() {
        interrupts += 1;
        if interrupts > 1 {
            warn!("Interrupted again; exiting immediately");
            return true;
        }
        warn!("Interrupted; finishing subcategories already in progress (Ctrl-C again to force quit)");
        cancel.cancel();
    }
    false
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = HarvestConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let category_limit = prompt_category_limit()?;
    info!(category_limit, "Starting harvest of {}", config.base_url);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, interrupt).await {
            std::process::exit(130);
        }
    });

    let sink = JsonlSink::new(&config.output_path);
    let factory = WebDriverFactory::new(config.browser.clone());
    let pipeline = HarvestPipeline::new(factory, config).with_cancellation(cancel);

    let report = pipeline.run(category_limit).await?;
    sink::deliver(&sink, &report.records, &report.summary);
    Ok(())
}
