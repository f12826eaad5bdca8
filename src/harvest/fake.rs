//! Deterministic in-memory page source for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{ConvergencePolicy, HarvestConfig, Timeouts};
use crate::traits::{ItemHandle, PageSource, PageSourceFactory, SourceError};

/// Config with tiny waits pointed at the fake landing page.
pub fn fast_config() -> HarvestConfig {
    HarvestConfig::default()
        .with_base_url("https://shop.test/en")
        .with_convergence(ConvergencePolicy {
            max_stall_rounds: 5,
            max_rounds: 50,
            growth_wait_ms: 5,
            poll_interval_ms: 1,
        })
        .with_timeouts(Timeouts {
            navigation_secs: 5,
            page_ready_secs: 1,
            landing_elements_secs: 1,
            category_elements_secs: 1,
            product_presence_secs: 1,
            task_secs: 30,
        })
}

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    text: Option<String>,
    attrs: HashMap<String, String>,
    children: HashMap<String, Vec<FakeNode>>,
    broken: bool,
}

impl FakeNode {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// A node whose every read fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    /// A product tile with a name, link and price.
    pub fn product(name: &str, url: &str) -> Self {
        Self::default()
            .with_child(".product-tile__name", Self::text(name))
            .with_child("a", Self::default().with_attr("href", url))
            .with_child(".price-number", Self::text("10.00"))
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, selector: &str, child: FakeNode) -> Self {
        self.children
            .entry(selector.to_string())
            .or_default()
            .push(child);
        self
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.broken {
            return Err(SourceError::Driver("stale element reference".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemHandle for FakeNode {
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>, SourceError> {
        self.check()?;
        Ok(self.children.get(selector).cloned().unwrap_or_default())
    }

    async fn text(&self) -> Result<String, SourceError> {
        self.check()?;
        Ok(self.text.clone().unwrap_or_default())
    }

    async fn attr(&self, name: &str) -> Result<Option<String>, SourceError> {
        self.check()?;
        Ok(self.attrs.get(name).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, Vec<FakeNode>>,
    /// Visible count of one selector after N load-more calls.
    script: Option<(String, Vec<usize>)>,
    never_ready: bool,
    failing_load_more: bool,
}

impl FakePage {
    /// A listing whose visible `selector` count follows `counts`, one entry
    /// per load-more call; the last entry repeats forever.
    pub fn scripted(selector: &str, counts: Vec<usize>) -> Self {
        Self {
            script: Some((selector.to_string(), counts)),
            ..Self::default()
        }
    }

    pub fn with_elements(mut self, selector: &str, nodes: Vec<FakeNode>) -> Self {
        self.elements.insert(selector.to_string(), nodes);
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn with_failing_load_more(mut self) -> Self {
        self.failing_load_more = true;
        self
    }

    fn visible(&self, selector: &str, loads: usize) -> Vec<FakeNode> {
        let nodes = self.elements.get(selector).cloned().unwrap_or_default();
        let Some((scripted, counts)) = &self.script else {
            return nodes;
        };
        if scripted != selector {
            return nodes;
        }

        let count = counts
            .get(loads)
            .or_else(|| counts.last())
            .copied()
            .unwrap_or(0);
        if nodes.is_empty() {
            (0..count)
                .map(|i| FakeNode::product(&format!("Product {i}"), &format!("https://shop.test/p/{i}")))
                .collect()
        } else {
            nodes.into_iter().take(count).collect()
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    load_more_calls: AtomicUsize,
    visited: Mutex<Vec<String>>,
}

impl FakeStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    pub fn load_more_calls(&self) -> usize {
        self.load_more_calls.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

/// A fake site: URL → page, with URLs that fail to load.
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pages: HashMap<String, FakePage>,
    failing: HashSet<String>,
    navigation_delay: Duration,
    stats: Arc<FakeStats>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn with_failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn with_navigation_delay_ms(mut self, millis: u64) -> Self {
        self.navigation_delay = Duration::from_millis(millis);
        self
    }

    pub fn stats(&self) -> &FakeStats {
        &self.stats
    }
}

#[async_trait]
impl PageSourceFactory for FakeSite {
    type Source = FakeSession;

    async fn open(&self) -> Result<FakeSession, SourceError> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_active.fetch_max(active, Ordering::SeqCst);

        Ok(FakeSession {
            site: self.clone(),
            page: Mutex::new(FakePage::default()),
            loads: AtomicUsize::new(0),
        })
    }
}

pub struct FakeSession {
    site: FakeSite,
    page: Mutex<FakePage>,
    loads: AtomicUsize,
}

impl FakeSession {
    fn current(&self) -> Result<FakePage, SourceError> {
        self.page
            .lock()
            .map(|page| page.clone())
            .map_err(|e| SourceError::Driver(e.to_string()))
    }
}

#[async_trait]
impl PageSource for FakeSession {
    type Item = FakeNode;

    async fn navigate(&self, url: &str) -> Result<(), SourceError> {
        if let Ok(mut visited) = self.site.stats.visited.lock() {
            visited.push(url.to_string());
        }
        if !self.site.navigation_delay.is_zero() {
            tokio::time::sleep(self.site.navigation_delay).await;
        }
        if self.site.failing.contains(url) {
            return Err(SourceError::Navigation {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let page = self.site.pages.get(url).cloned().unwrap_or_default();
        let mut current = self
            .page
            .lock()
            .map_err(|e| SourceError::Driver(e.to_string()))?;
        *current = page;
        self.loads.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), SourceError> {
        if self.current()?.never_ready {
            return Err(SourceError::timeout("document ready state", timeout));
        }
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<FakeNode>, SourceError> {
        let loads = self.loads.load(Ordering::SeqCst);
        Ok(self.current()?.visible(selector, loads))
    }

    async fn load_more(&self) -> Result<(), SourceError> {
        if self.current()?.failing_load_more {
            return Err(SourceError::Driver("javascript error".into()));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.site.stats.load_more_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self) -> Result<(), SourceError> {
        self.site.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.site.stats.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
