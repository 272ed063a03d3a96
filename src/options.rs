use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Browser-like user agent sent when the caller does not supply one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_STATIC_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SELECTOR_WAIT_MS: u64 = 10_000;

/// Which fetch paths the orchestrator may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchMode {
    /// Static first, escalate to the browser on a block signal
    #[default]
    Auto,
    /// Static fetch only, never escalate
    Static,
    /// Skip the static attempt and render in the browser
    Rendered,
}

/// Navigation-completion policy for the rendered path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitUntil {
    /// `DOMContentLoaded` has fired
    #[serde(alias = "domcontentloaded")]
    DomContentLoaded,
    /// The `load` event has fired
    Load,
    /// Load fired and no new resources for 500ms
    #[serde(alias = "networkidle0")]
    NetworkIdle,
    /// Load fired and at most two resources still arriving
    #[default]
    #[serde(alias = "networkidle2")]
    NetworkAlmostIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Per-request fetch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchOptions {
    /// Timeout for each suspension point; defaults differ for static and rendered fetches
    pub timeout_ms: Option<u64>,

    /// Maximum redirects followed by the static fetcher
    pub max_redirects: Option<usize>,

    pub user_agent: Option<String>,

    /// Extra headers merged over the browser-like defaults (static path only)
    pub headers: BTreeMap<String, String>,

    pub viewport: Option<Viewport>,

    pub wait_until: Option<WaitUntil>,

    /// CSS selector to await after navigation; absence is not fatal
    pub wait_for_selector: Option<String>,

    /// Bound for `wait_for_selector`
    pub selector_timeout_ms: Option<u64>,

    /// Fixed delay after load
    pub wait_time_ms: Option<u64>,

    pub scroll_to_load: bool,

    pub include_screenshot: bool,

    pub mode: FetchMode,
}

impl FetchOptions {
    pub fn static_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_STATIC_TIMEOUT_MS))
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_RENDER_TIMEOUT_MS))
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms.unwrap_or(DEFAULT_SELECTOR_WAIT_MS))
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects.unwrap_or(5)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.unwrap_or_default()
    }

    pub fn wait_until(&self) -> WaitUntil {
        self.wait_until.unwrap_or_default()
    }

    /// Fill every unset field from `defaults`
    pub fn merged_with(&self, defaults: &FetchOptions) -> FetchOptions {
        let mut headers = defaults.headers.clone();
        headers.extend(self.headers.clone());
        FetchOptions {
            timeout_ms: self.timeout_ms.or(defaults.timeout_ms),
            max_redirects: self.max_redirects.or(defaults.max_redirects),
            user_agent: self.user_agent.clone().or_else(|| defaults.user_agent.clone()),
            headers,
            viewport: self.viewport.or(defaults.viewport),
            wait_until: self.wait_until.or(defaults.wait_until),
            wait_for_selector: self
                .wait_for_selector
                .clone()
                .or_else(|| defaults.wait_for_selector.clone()),
            selector_timeout_ms: self.selector_timeout_ms.or(defaults.selector_timeout_ms),
            wait_time_ms: self.wait_time_ms.or(defaults.wait_time_ms),
            scroll_to_load: self.scroll_to_load || defaults.scroll_to_load,
            include_screenshot: self.include_screenshot || defaults.include_screenshot,
            mode: if self.mode == FetchMode::Auto {
                defaults.mode
            } else {
                self.mode
            },
        }
    }
}
