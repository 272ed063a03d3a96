use crate::browser::{Browser, Launcher, LoadProgress, Page, ReadyState, ScrollPosition};
use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::options::Viewport;
use async_trait::async_trait;
use fantoccini::wd::WindowHandle;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Ports WebDriver servers commonly listen on
const FALLBACK_WEBDRIVER_URLS: [&str; 2] = [
    "http://localhost:9515", // ChromeDriver default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

const LOAD_PROGRESS_SCRIPT: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";

const PAGE_METRICS_SCRIPT: &str = "var d = document.documentElement, b = document.body; \
     return [Math.max(d ? d.scrollHeight : 0, b ? b.scrollHeight : 0), \
     Math.max(0, window.outerHeight - window.innerHeight)];";

/// Tallest window Chrome renders into a single capture
const MAX_CAPTURE_HEIGHT: u32 = 16_384;

const SCROLL_SCRIPT: &str = "window.scrollBy(0, arguments[0]); \
     var body = document.body; \
     return [Math.ceil(window.scrollY + window.innerHeight), body ? body.scrollHeight : 0];";

/// Starts a Chrome session through a WebDriver server
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    webdriver_url: String,
    headless: bool,
    browser_args: Vec<String>,
    user_agent: String,
}

impl WebDriverLauncher {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            browser_args: config.browser_args.clone(),
            user_agent: config.default_options.user_agent().to_string(),
        }
    }

    /// Session capabilities; `eager` loading lets the fetcher apply its own wait policy
    pub fn capabilities(&self) -> serde_json::Map<String, Value> {
        let mut args = self.browser_args.clone();
        if self.headless && !args.iter().any(|a| a.starts_with("--headless")) {
            args.push("--headless=new".to_string());
        }
        args.push(format!("--user-agent={}", self.user_agent));

        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("pageLoadStrategy".to_string(), json!("eager"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }

    async fn connect(&self, url: &str) -> Result<Client, ScrapeError> {
        let client = ClientBuilder::native()
            .capabilities(self.capabilities())
            .connect(url)
            .await?;
        Ok(client)
    }
}

#[async_trait]
impl Launcher for WebDriverLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, ScrapeError> {
        let first_error = match self.connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(Arc::new(WebDriverBrowser::new(client)));
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
                e
            }
        };

        for url in FALLBACK_WEBDRIVER_URLS {
            if url == self.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = self.connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(Arc::new(WebDriverBrowser::new(client)));
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(first_error)
    }
}

/// One WebDriver session; each page is a separate tab.
///
/// WebDriver addresses commands to a single "current window", and all tabs
/// share one OS window. Every page command therefore takes the focus lock,
/// switches to its own tab and resizes the window to its own viewport first.
pub struct WebDriverBrowser {
    client: Client,
    focus: Arc<Mutex<Focus>>,
}

/// State of the shared window, guarded by the focus lock
#[derive(Debug, Default)]
struct Focus {
    /// Size the window currently has, if known
    applied: Option<Viewport>,
}

impl WebDriverBrowser {
    fn new(client: Client) -> Self {
        Self {
            client,
            focus: Arc::new(Mutex::new(Focus::default())),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, ScrapeError> {
        let _focus = self.focus.lock().await;
        let window = self.client.new_window(true).await?;
        Ok(Box::new(WebDriverPage {
            client: self.client.clone(),
            handle: window.handle,
            focus: Arc::clone(&self.focus),
            viewport: Mutex::new(Viewport::default()),
        }))
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        let _focus = self.focus.lock().await;
        self.client.clone().close().await?;
        Ok(())
    }
}

struct WebDriverPage {
    client: Client,
    handle: WindowHandle,
    focus: Arc<Mutex<Focus>>,
    viewport: Mutex<Viewport>,
}

impl WebDriverPage {
    /// Take the focus lock and make this page's tab current
    async fn switched(&self) -> Result<MutexGuard<'_, Focus>, ScrapeError> {
        let focus = self.focus.lock().await;
        self.client.switch_to_window(self.handle.clone()).await?;
        Ok(focus)
    }

    /// Like [`Self::switched`], and also size the shared window to this page's viewport
    async fn focused(&self) -> Result<MutexGuard<'_, Focus>, ScrapeError> {
        let mut focus = self.switched().await?;
        let viewport = *self.viewport.lock().await;
        if focus.applied != Some(viewport) {
            focus.applied = None;
            self.client
                .set_window_size(viewport.width, viewport.height)
                .await?;
            focus.applied = Some(viewport);
        }
        Ok(focus)
    }

    async fn run_script(&self, script: &str, args: Vec<Value>) -> Result<Value, ScrapeError> {
        let _focus = self.focused().await?;
        Ok(self.client.execute(script, args).await?)
    }
}

fn as_count(value: Option<&Value>) -> u64 {
    value.and_then(Value::as_f64).unwrap_or(0.0).max(0.0) as u64
}

/// Window size that shows the whole document.
///
/// `chrome` is the height the browser UI takes from the window. The result is
/// never shorter than the viewport and never taller than Chrome can capture.
fn full_page_size(viewport: Viewport, document_height: u64, chrome: u64) -> Viewport {
    let wanted = document_height.saturating_add(chrome);
    let height = wanted
        .max(u64::from(viewport.height))
        .min(u64::from(MAX_CAPTURE_HEIGHT));
    Viewport {
        width: viewport.width,
        height: height as u32,
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), ScrapeError> {
        *self.viewport.lock().await = viewport;
        let _focus = self.focused().await?;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<(), ScrapeError> {
        let _focus = self.focused().await?;
        self.client.goto(url).await?;
        Ok(())
    }

    async fn load_progress(&self) -> Result<LoadProgress, ScrapeError> {
        let value = self.run_script(LOAD_PROGRESS_SCRIPT, Vec::new()).await?;
        let state = value.get(0).and_then(Value::as_str).unwrap_or("loading");
        Ok(LoadProgress {
            ready_state: ReadyState::parse(state),
            resources: as_count(value.get(1)) as usize,
        })
    }

    async fn has_selector(&self, selector: &str) -> Result<bool, ScrapeError> {
        let _focus = self.switched().await?;
        let found = self.client.find_all(Locator::Css(selector)).await?;
        Ok(!found.is_empty())
    }

    async fn scroll_by(&self, distance: u32) -> Result<ScrollPosition, ScrapeError> {
        let value = self.run_script(SCROLL_SCRIPT, vec![json!(distance)]).await?;
        Ok(ScrollPosition {
            reached: as_count(value.get(0)),
            height: as_count(value.get(1)),
        })
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        let _focus = self.focused().await?;
        Ok(self.client.source().await?)
    }

    async fn current_url(&self) -> Result<String, ScrapeError> {
        let _focus = self.switched().await?;
        Ok(self.client.current_url().await?.to_string())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScrapeError> {
        let mut focus = self.focused().await?;
        let viewport = *self.viewport.lock().await;
        let metrics = self.client.execute(PAGE_METRICS_SCRIPT, Vec::new()).await?;
        let full = full_page_size(viewport, as_count(metrics.get(0)), as_count(metrics.get(1)));

        if full != viewport {
            focus.applied = None;
            self.client.set_window_size(full.width, full.height).await?;
            focus.applied = Some(full);
        }
        let png = self.client.screenshot().await;

        if full != viewport {
            match self
                .client
                .set_window_size(viewport.width, viewport.height)
                .await
            {
                Ok(()) => focus.applied = Some(viewport),
                Err(e) => ::log::warn!("Failed to restore window size after screenshot: {}", e),
            }
        }
        Ok(png?)
    }

    async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
        let _focus = self.switched().await?;
        self.client.close_window().await?;
        Ok(())
    }
}
