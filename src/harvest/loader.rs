//! Scroll-until-loaded convergence and bounded element waits.

use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ConvergencePolicy;
use crate::traits::{PageSource, SourceError};

/// Why the convergence loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The visible count reached the expected target.
    Reached,
    /// The count stopped growing for `max_stall_rounds` consecutive rounds.
    Stalled,
    /// `max_rounds` was exhausted.
    RoundLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    /// Visible items at the last count
    pub loaded: usize,
    pub rounds: u32,
    pub load_more_calls: u32,
    pub reason: StopReason,
}

pub async fn count_visible<S: PageSource>(page: &S, selector: &str) -> Result<usize, SourceError> {
    Ok(page.find_all(selector).await?.len())
}

/// Keeps triggering incremental loads until `expected` items matching
/// `selector` are visible, progress stalls, or the round ceiling is hit.
///
/// An `expected` of 0 means there is no target: the loop runs until the
/// count stops growing. Stalls and round exhaustion are not errors; only a
/// failing page interaction is.
pub async fn load_until<S: PageSource>(
    page: &S,
    selector: &str,
    expected: usize,
    policy: &ConvergencePolicy,
) -> Result<Convergence, SourceError> {
    let mut previous = 0;
    let mut loaded = 0;
    let mut stalls = 0;
    let mut rounds = 0;
    let mut load_more_calls = 0;

    let finish = |loaded, rounds, load_more_calls, reason| Convergence {
        loaded,
        rounds,
        load_more_calls,
        reason,
    };

    while rounds < policy.max_rounds {
        rounds += 1;
        loaded = count_visible(page, selector).await?;
        info!(loaded, expected, round = rounds, "Scrolling... Loaded {loaded}/{expected}");

        if expected > 0 && loaded >= expected {
            return Ok(finish(loaded, rounds, load_more_calls, StopReason::Reached));
        }

        if loaded == previous {
            stalls += 1;
            if stalls >= policy.max_stall_rounds {
                warn!(
                    loaded,
                    expected, "Stopping scroll early: Expected {expected}, Got {loaded}"
                );
                return Ok(finish(loaded, rounds, load_more_calls, StopReason::Stalled));
            }
        } else {
            stalls = 0;
        }
        previous = loaded;

        page.load_more().await?;
        load_more_calls += 1;

        match wait_for_growth(page, selector, loaded, policy).await {
            Ok(grown) => debug!(grown, "Page grew after load-more"),
            Err(SourceError::Timeout { .. }) => {
                warn!("Timeout while waiting for more products. Trying again...")
            }
            Err(e) => return Err(e),
        }
    }

    warn!(loaded, expected, rounds, "Round limit reached before convergence");
    Ok(finish(loaded, rounds, load_more_calls, StopReason::RoundLimit))
}

/// Waits until more than `current` items are visible.
pub async fn wait_for_growth<S: PageSource>(
    page: &S,
    selector: &str,
    current: usize,
    policy: &ConvergencePolicy,
) -> Result<usize, SourceError> {
    wait_for_count(
        page,
        selector,
        policy.growth_wait(),
        policy.poll_interval(),
        |count| count > current,
    )
    .await
}

/// Waits until at least one element matches `selector`.
pub async fn wait_for_presence<S: PageSource>(
    page: &S,
    selector: &str,
    limit: Duration,
    poll_interval: Duration,
) -> Result<usize, SourceError> {
    wait_for_count(page, selector, limit, poll_interval, |count| count > 0).await
}

async fn wait_for_count<S, P>(
    page: &S,
    selector: &str,
    limit: Duration,
    poll_interval: Duration,
    satisfied: P,
) -> Result<usize, SourceError>
where
    S: PageSource,
    P: Fn(usize) -> bool,
{
    let poll = async {
        loop {
            let count = count_visible(page, selector).await?;
            if satisfied(count) {
                return Ok::<usize, SourceError>(count);
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    match timeout(limit, poll).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::timeout(format!("elements '{selector}'"), limit)),
    }
}
