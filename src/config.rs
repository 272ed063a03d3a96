use crate::error::ScrapeError;
use crate::fetchers::block::BlockDetectorConfig;
use crate::options::FetchOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for the scraper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Maximum number of URLs a batch processes at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Extra command-line flags for the browser process
    #[serde(default = "default_browser_args")]
    pub browser_args: Vec<String>,

    /// Rules for deciding when a static response needs the browser
    #[serde(default)]
    pub block_detection: BlockDetectorConfig,

    /// Options applied wherever a request leaves a field unset
    #[serde(default)]
    pub default_options: FetchOptions,
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

/// Default value for max_concurrency
fn default_max_concurrency() -> usize {
    4
}

fn default_headless() -> bool {
    true
}

/// Flags that let Chrome start inside containers and other constrained environments
fn default_browser_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-accelerated-2d-canvas",
        "--no-first-run",
        "--no-zygote",
        "--disable-gpu",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            max_concurrency: default_max_concurrency(),
            headless: default_headless(),
            browser_args: default_browser_args(),
            block_detection: BlockDetectorConfig::default(),
            default_options: FetchOptions::default(),
        }
    }
}

impl ScraperConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScrapeError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ScrapeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ScrapeError> {
        serde_json::from_str(json).map_err(|e| ScrapeError::Config(e.to_string()))
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if provided
    pub fn with_env_overrides(self) -> Self {
        self.with_webdriver_override(std::env::var("WEBDRIVER_URL").ok())
    }

    fn with_webdriver_override(mut self, webdriver_url: Option<String>) -> Self {
        if let Some(url) = webdriver_url {
            if !url.is_empty() {
                self.webdriver_url = url;
            }
        }
        self
    }
}
