//! Adaptive fetching.
//!
//! A fetch starts with a static HTTP request. If the [`block::BlockDetector`]
//! sees bot mitigation in the response, the URL is loaded once more in the
//! browser. Network failures on the static attempt are terminal: a browser
//! cannot fix DNS or a refused connection.

pub mod block;
pub mod http;
pub mod rendered;

use crate::browser::BrowserSession;
use crate::error::ScrapeError;
use crate::options::{FetchMode, FetchOptions};
use block::{BlockDetector, Verdict};
use http::{StaticFetcher, StaticResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Which path served a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchSource {
    Static,
    Rendered,
}

/// A fetched document, ready for extraction
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub final_url: Url,
    pub source: FetchSource,
    /// HTTP status of the static response; unknown for rendered pages
    pub status: Option<u16>,
    pub html: String,
    pub screenshot: Option<String>,
}

impl FetchResult {
    fn from_static(response: StaticResponse) -> Self {
        Self {
            final_url: response.final_url,
            source: FetchSource::Static,
            status: Some(response.status),
            html: response.body,
            screenshot: None,
        }
    }

    fn from_rendered(
        requested: &Url,
        document: rendered::RenderedDocument,
    ) -> Self {
        let final_url = Url::parse(&document.final_url).unwrap_or_else(|_| requested.clone());
        Self {
            final_url,
            source: FetchSource::Rendered,
            status: None,
            html: document.html,
            screenshot: document.screenshot,
        }
    }
}

/// Chooses between the static and rendered paths for each URL
pub struct FetchOrchestrator {
    http: StaticFetcher,
    detector: BlockDetector,
    session: Arc<BrowserSession>,
}

impl FetchOrchestrator {
    pub fn new(http: StaticFetcher, detector: BlockDetector, session: Arc<BrowserSession>) -> Self {
        Self {
            http,
            detector,
            session,
        }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// Fetch an already validated URL.
    ///
    /// The static attempt always precedes the rendered one, and the rendered
    /// path runs at most once per call.
    pub async fn fetch(
        &self,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<FetchResult, ScrapeError> {
        if options.mode == FetchMode::Rendered {
            ::log::debug!("Rendering {} without a static attempt", url);
            return self.render(url, options).await;
        }

        let response = self.http.fetch(url, options).await?;

        match self.detector.inspect(&response) {
            Verdict::Pass => Ok(FetchResult::from_static(response)),
            Verdict::Escalate(reason) if options.mode == FetchMode::Auto => {
                ::log::warn!(
                    "Static fetch of {} looks blocked ({:?}), retrying in the browser",
                    url,
                    reason
                );
                self.render(url, options).await
            }
            Verdict::Escalate(reason) => {
                ::log::info!(
                    "Static fetch of {} looks blocked ({:?}) but static mode forbids escalation",
                    url,
                    reason
                );
                Ok(FetchResult::from_static(response))
            }
        }
    }

    async fn render(
        &self,
        url: &Url,
        options: &FetchOptions,
    ) -> Result<FetchResult, ScrapeError> {
        let document = rendered::render(&self.session, url, options).await?;
        Ok(FetchResult::from_rendered(url, document))
    }
}
