//! Browser session management.
//!
//! A [`BrowserSession`] owns at most one running browser. The browser is
//! launched lazily on the first rendered fetch and torn down by an explicit
//! [`BrowserSession::shutdown`]. Each fetch opens its own page through
//! [`BrowserSession::open_page`] and hands it back with [`PageGuard::release`].

pub mod webdriver;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::ScrapeError;
use crate::options::Viewport;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// `document.readyState` as reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn parse(state: &str) -> Self {
        match state {
            "complete" => ReadyState::Complete,
            "interactive" => ReadyState::Interactive,
            _ => ReadyState::Loading,
        }
    }
}

/// Snapshot of how far a navigation has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub ready_state: ReadyState,
    /// Number of subresources the page has fetched so far
    pub resources: usize,
}

/// Scroll position after a scroll step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPosition {
    /// Bottom edge of the viewport in document pixels
    pub reached: u64,
    /// Total scrollable height of the document
    pub height: u64,
}

impl ScrollPosition {
    pub fn at_end(&self) -> bool {
        self.reached >= self.height
    }
}

/// Starts browser processes
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Browser>, ScrapeError>;
}

/// A running browser that can open isolated pages
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>, ScrapeError>;
    async fn close(&self) -> Result<(), ScrapeError>;
}

/// A single page context, exclusively owned by one fetch
#[async_trait]
pub trait Page: Send + Sync {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), ScrapeError>;
    async fn goto(&self, url: &str) -> Result<(), ScrapeError>;
    async fn load_progress(&self) -> Result<LoadProgress, ScrapeError>;
    /// One check for an element matching `selector`; callers poll for waits
    async fn has_selector(&self, selector: &str) -> Result<bool, ScrapeError>;
    async fn scroll_by(&self, distance: u32) -> Result<ScrollPosition, ScrapeError>;
    async fn content(&self) -> Result<String, ScrapeError>;
    async fn current_url(&self) -> Result<String, ScrapeError>;
    /// PNG bytes of the whole document, not just the viewport
    async fn screenshot(&self) -> Result<Vec<u8>, ScrapeError>;
    async fn close(self: Box<Self>) -> Result<(), ScrapeError>;
}

/// Lifecycle of a [`BrowserSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Running,
    Closed,
}

enum SessionState {
    Uninitialized,
    Running(Arc<dyn Browser>),
    Closed,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        match self {
            SessionState::Uninitialized => SessionStatus::Uninitialized,
            SessionState::Running(_) => SessionStatus::Running,
            SessionState::Closed => SessionStatus::Closed,
        }
    }
}

/// Owner of the shared browser process
pub struct BrowserSession {
    launcher: Arc<dyn Launcher>,
    state: Mutex<SessionState>,
    open_pages: Arc<AtomicUsize>,
}

impl BrowserSession {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            state: Mutex::new(SessionState::Uninitialized),
            open_pages: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return the running browser, launching it if needed.
    ///
    /// The state lock is held across the launch, so concurrent callers during
    /// a cold start wait for the single launch instead of starting their own.
    pub async fn acquire(&self) -> Result<Arc<dyn Browser>, ScrapeError> {
        let mut state = self.state.lock().await;
        if let SessionState::Running(browser) = &*state {
            return Ok(Arc::clone(browser));
        }

        if matches!(*state, SessionState::Closed) {
            ::log::info!("Relaunching browser after shutdown");
        }
        let browser = self.launcher.launch().await?;
        ::log::info!("Browser session started");
        *state = SessionState::Running(Arc::clone(&browser));
        Ok(browser)
    }

    /// Open a fresh page; never reuses a page from an earlier call.
    ///
    /// The page is created on its own task. If the caller gives up while the
    /// browser is still creating it, the finished page lands in a guard that
    /// nobody awaits, and the guard's drop closes it.
    pub async fn open_page(&self) -> Result<PageGuard, ScrapeError> {
        let browser = self.acquire().await?;
        let open_pages = Arc::clone(&self.open_pages);
        tokio::spawn(async move {
            let page = browser.new_page().await?;
            let open = open_pages.fetch_add(1, Ordering::SeqCst) + 1;
            ::log::trace!("Opened page, {} now open", open);
            Ok::<_, ScrapeError>(PageGuard {
                page: Some(page),
                open_pages,
            })
        })
        .await
        .map_err(|e| ScrapeError::Browser(format!("page creation task failed: {}", e)))?
    }

    /// Close the browser. A no-op when nothing is running.
    pub async fn shutdown(&self) -> Result<(), ScrapeError> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SessionState::Closed) {
            SessionState::Running(browser) => {
                let open = self.open_pages.load(Ordering::SeqCst);
                if open > 0 {
                    ::log::warn!("Shutting down browser with {} page(s) still open", open);
                }
                browser.close().await?;
                ::log::info!("Browser session closed");
                Ok(())
            }
            previous => {
                *state = previous;
                ::log::debug!("Browser shutdown requested with no running session");
                Ok(())
            }
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status()
    }

    /// Pages opened through this session and not yet released
    pub fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::SeqCst)
    }
}

/// Scoped ownership of a page.
///
/// Call [`PageGuard::release`] on every exit path. If the guard is dropped
/// without it (the owning future was cancelled), the page is closed on a
/// spawned task instead.
pub struct PageGuard {
    page: Option<Box<dyn Page>>,
    open_pages: Arc<AtomicUsize>,
}

impl PageGuard {
    pub fn page(&self) -> &dyn Page {
        self.page
            .as_deref()
            .expect("page is present until the guard is released")
    }

    pub async fn release(mut self) {
        if let Some(page) = self.page.take() {
            close_page(page, &self.open_pages).await;
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let open_pages = Arc::clone(&self.open_pages);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                ::log::debug!("Page dropped without release, closing in background");
                handle.spawn(async move {
                    close_page(page, &open_pages).await;
                });
            }
            Err(_) => {
                open_pages.fetch_sub(1, Ordering::SeqCst);
                ::log::warn!("Page dropped outside a runtime; it could not be closed");
            }
        }
    }
}

async fn close_page(page: Box<dyn Page>, open_pages: &AtomicUsize) {
    if let Err(e) = page.close().await {
        ::log::warn!("Failed to close page: {}", e);
    }
    open_pages.fetch_sub(1, Ordering::SeqCst);
}
