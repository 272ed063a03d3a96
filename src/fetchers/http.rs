use crate::error::{ScrapeError, TimeoutStage};
use crate::options::FetchOptions;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Instant;
use url::Url;

/// Headers a desktop browser sends on a top-level navigation
const BROWSER_HEADERS: [(&str, &str); 7] = [
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.5"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
];

const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Raw result of a static GET
#[derive(Debug, Clone)]
pub struct StaticResponse {
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    /// Response headers with lowercased names
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StaticResponse {
    /// Get a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Performs single HTTP GETs that look like a browser navigation
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            client: build_client(DEFAULT_MAX_REDIRECTS)?,
        })
    }

    /// Fetch `url`; HTTP error statuses are returned as responses, not errors
    pub async fn fetch(
        &self,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<StaticResponse, ScrapeError> {
        let start = Instant::now();
        let timeout = options.static_timeout();

        // The redirect policy lives on the client, so a custom limit needs its own
        let client = if options.max_redirects() == DEFAULT_MAX_REDIRECTS {
            self.client.clone()
        } else {
            build_client(options.max_redirects())?
        };

        let request = client
            .get(url.as_str())
            .headers(request_headers(options))
            .timeout(timeout);

        let response = request.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.text().await.map_err(|e| classify(e, timeout))?;

        ::log::debug!(
            "Static fetch of {} returned {} ({} bytes) in {:.2} seconds",
            url,
            status,
            body.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(StaticResponse {
            final_url,
            status,
            headers,
            body,
        })
    }
}

fn build_client(max_redirects: usize) -> Result<reqwest::Client, ScrapeError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| ScrapeError::Config(format!("failed to build HTTP client: {}", e)))
}

fn request_headers(options: &FetchOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in BROWSER_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if let Ok(agent) = HeaderValue::from_str(options.user_agent()) {
        headers.insert(reqwest::header::USER_AGENT, agent);
    }
    for (name, value) in &options.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => ::log::warn!("Ignoring malformed request header: {}", name),
        }
    }
    headers
}

fn classify(error: reqwest::Error, timeout: std::time::Duration) -> ScrapeError {
    if error.is_timeout() {
        ScrapeError::timeout(TimeoutStage::StaticRequest, timeout)
    } else {
        ScrapeError::from(error)
    }
}
