//! In-process browser used by tests to observe session and page lifecycles.
//!
//! Like a WebDriver session, every page command of one browser runs under a
//! shared command lock, so tests can see when one page starves another.

use super::{Browser, Launcher, LoadProgress, Page, ReadyState, ScrollPosition};
use crate::error::ScrapeError;
use crate::options::Viewport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock browser responds
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub html: String,
    /// Reported final URL; defaults to the navigated URL
    pub final_url: Option<String>,
    pub launch_delay: Duration,
    pub launch_fails: bool,
    pub new_page_delay: Duration,
    pub goto_delay: Duration,
    pub goto_fails: bool,
    pub selector_present: bool,
    pub page_height: u64,
    pub viewport_height: u64,
    pub screenshot: Vec<u8>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            html: "<html><head><title>Rendered</title></head><body><p>rendered body</p></body></html>"
                .to_string(),
            final_url: None,
            launch_delay: Duration::ZERO,
            launch_fails: false,
            new_page_delay: Duration::ZERO,
            goto_delay: Duration::ZERO,
            goto_fails: false,
            selector_present: true,
            page_height: 1080,
            viewport_height: 1080,
            screenshot: vec![0x89, b'P', b'N', b'G'],
        }
    }
}

#[derive(Debug, Default)]
pub struct MockStats {
    launches: AtomicUsize,
    browser_closes: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    double_closes: AtomicUsize,
    scroll_steps: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

impl MockStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn browser_closes(&self) -> usize {
        self.browser_closes.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn double_closes(&self) -> usize {
        self.double_closes.load(Ordering::SeqCst)
    }

    pub fn scroll_steps(&self) -> usize {
        self.scroll_steps.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

pub struct MockLauncher {
    behavior: Arc<MockBehavior>,
    stats: Arc<MockStats>,
}

impl MockLauncher {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(behavior),
            stats: Arc::new(MockStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, ScrapeError> {
        tokio::time::sleep(self.behavior.launch_delay).await;
        if self.behavior.launch_fails {
            return Err(ScrapeError::Browser("mock launch failure".into()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBrowser {
            behavior: Arc::clone(&self.behavior),
            stats: Arc::clone(&self.stats),
            commands: Arc::new(tokio::sync::Mutex::new(())),
        }))
    }
}

struct MockBrowser {
    behavior: Arc<MockBehavior>,
    stats: Arc<MockStats>,
    commands: Arc<tokio::sync::Mutex<()>>,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, ScrapeError> {
        tokio::time::sleep(self.behavior.new_page_delay).await;
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPage {
            behavior: Arc::clone(&self.behavior),
            stats: Arc::clone(&self.stats),
            commands: Arc::clone(&self.commands),
            url: Mutex::new(String::from("about:blank")),
            scrolled: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        self.stats.browser_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockPage {
    behavior: Arc<MockBehavior>,
    stats: Arc<MockStats>,
    commands: Arc<tokio::sync::Mutex<()>>,
    url: Mutex<String>,
    scrolled: AtomicU64,
    closed: AtomicBool,
}

#[async_trait]
impl Page for MockPage {
    async fn set_viewport(&self, _viewport: Viewport) -> Result<(), ScrapeError> {
        let _command = self.commands.lock().await;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<(), ScrapeError> {
        let _command = self.commands.lock().await;
        self.stats.navigations.lock().unwrap().push(url.to_string());
        tokio::time::sleep(self.behavior.goto_delay).await;
        if self.behavior.goto_fails {
            return Err(ScrapeError::Browser("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn load_progress(&self) -> Result<LoadProgress, ScrapeError> {
        let _command = self.commands.lock().await;
        Ok(LoadProgress {
            ready_state: ReadyState::Complete,
            resources: 3,
        })
    }

    async fn has_selector(&self, _selector: &str) -> Result<bool, ScrapeError> {
        let _command = self.commands.lock().await;
        Ok(self.behavior.selector_present)
    }

    async fn scroll_by(&self, distance: u32) -> Result<ScrollPosition, ScrapeError> {
        let _command = self.commands.lock().await;
        self.stats.scroll_steps.fetch_add(1, Ordering::SeqCst);
        let scrolled = self.scrolled.fetch_add(distance as u64, Ordering::SeqCst) + distance as u64;
        Ok(ScrollPosition {
            reached: scrolled.min(self.behavior.page_height) + self.behavior.viewport_height,
            height: self.behavior.page_height,
        })
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        let _command = self.commands.lock().await;
        Ok(self.behavior.html.clone())
    }

    async fn current_url(&self) -> Result<String, ScrapeError> {
        let _command = self.commands.lock().await;
        Ok(self
            .behavior
            .final_url
            .clone()
            .unwrap_or_else(|| self.url.lock().unwrap().clone()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScrapeError> {
        let _command = self.commands.lock().await;
        Ok(self.behavior.screenshot.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
        let _command = self.commands.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            self.stats.double_closes.fetch_add(1, Ordering::SeqCst);
        }
        self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
