//! Fetch web pages and extract structured content from them.
//!
//! A [`Scraper`] tries a plain HTTP request first and moves to a headless
//! browser only when the response looks like bot mitigation, or when the
//! caller asks for rendering. The same extraction runs on either document.

pub mod batch;
pub mod browser;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fetchers;
pub mod options;
pub mod results;
pub mod urls;

// Re-export commonly used types for convenience
pub use config::ScraperConfig;
pub use error::{ErrorKind, ScrapeError};
pub use extractors::ExtractionProfile;
pub use fetchers::FetchSource;
pub use options::{FetchMode, FetchOptions, WaitUntil};
pub use results::{BatchError, BatchReport, ScrapeResult};

use browser::webdriver::WebDriverLauncher;
use browser::{BrowserSession, Launcher};
use fetchers::block::BlockDetector;
use fetchers::http::StaticFetcher;
use fetchers::{FetchOrchestrator, rendered};
use std::sync::Arc;

/// Entry point for single and batch scrapes.
///
/// Clones share one browser session; call [`Scraper::shutdown`] when done.
#[derive(Clone)]
pub struct Scraper {
    orchestrator: Arc<FetchOrchestrator>,
    config: Arc<ScraperConfig>,
}

impl Scraper {
    /// Create a scraper that renders through the configured WebDriver server
    pub fn new(config: ScraperConfig) -> Result<Self, ScrapeError> {
        let launcher = Arc::new(WebDriverLauncher::new(&config));
        Self::with_launcher(config, launcher)
    }

    /// Create a scraper with a custom browser launcher
    pub fn with_launcher(
        config: ScraperConfig,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self, ScrapeError> {
        let detector = BlockDetector::new(config.block_detection.clone())
            .map_err(|e| ScrapeError::Config(format!("invalid challenge marker: {}", e)))?;
        let session = Arc::new(BrowserSession::new(launcher));
        let orchestrator = FetchOrchestrator::new(StaticFetcher::new()?, detector, session);
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        })
    }

    /// Set the maximum number of URLs a batch processes at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        Arc::make_mut(&mut self.config).max_concurrency = max_concurrency;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        self.orchestrator.session()
    }

    /// Fetch one URL and apply `profile` to the document.
    ///
    /// Invalid URLs fail before any network access.
    pub async fn fetch_and_extract(
        &self,
        url: &str,
        options: &FetchOptions,
        profile: &ExtractionProfile,
    ) -> Result<ScrapeResult, ScrapeError> {
        let target = urls::parse_target(url)?;
        let options = profile.tune(&options.merged_with(&self.config.default_options));

        ::log::info!("Scraping {} ({:?} mode)", target, options.mode);
        let fetched = self.orchestrator.fetch(&target, &options).await?;
        let data = extractors::extract(&fetched.html, &fetched.final_url, profile)?;

        Ok(ScrapeResult {
            url: target.to_string(),
            fetched_with: fetched.source,
            status: fetched.status,
            data,
            screenshot: fetched.screenshot,
        })
    }

    /// Run [`Scraper::fetch_and_extract`] over every URL.
    ///
    /// Individual failures land in the report's `errors`; this never fails as a whole.
    pub async fn fetch_and_extract_batch(
        &self,
        urls: &[String],
        options: &FetchOptions,
        profile: &ExtractionProfile,
    ) -> BatchReport {
        let scraper = self.clone();
        let options = Arc::new(options.clone());
        let profile = Arc::new(profile.clone());

        batch::run_batch(urls, self.config.max_concurrency, move |url| {
            let scraper = scraper.clone();
            let options = Arc::clone(&options);
            let profile = Arc::clone(&profile);
            async move { scraper.fetch_and_extract(&url, &options, &profile).await }
        })
        .await
    }

    /// Render `url` in the browser and return a base64 PNG of the whole page
    pub async fn capture_screenshot(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<String, ScrapeError> {
        let target = urls::parse_target(url)?;
        let options = options.merged_with(&self.config.default_options);
        rendered::capture_screenshot(self.session(), &target, &options).await
    }

    /// Close the browser if it was started. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), ScrapeError> {
        self.session().shutdown().await
    }
}
