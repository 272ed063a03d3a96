use crate::error::{ErrorKind, ScrapeError};
use crate::extractors::Extracted;
use crate::fetchers::FetchSource;
use serde::Serialize;

/// Extracted fields of one URL together with how it was fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    /// The normalized request URL
    pub url: String,

    pub fetched_with: FetchSource,

    /// Status of the static response, absent when the page was rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(flatten)]
    pub data: Extracted,

    /// Base64 PNG of the rendered page; `null` when served statically
    pub screenshot: Option<String>,
}

/// A URL the batch could not process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchError {
    pub url: String,
    pub error: String,
    pub kind: ErrorKind,
}

impl BatchError {
    pub fn new(url: impl Into<String>, error: &ScrapeError) -> Self {
        Self {
            url: url.into(),
            error: error.to_string(),
            kind: error.kind(),
        }
    }
}

/// Outcome of a batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<ScrapeResult>,
    pub errors: Vec<BatchError>,
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
}

impl BatchReport {
    pub fn push(&mut self, outcome: Result<ScrapeResult, BatchError>) {
        match outcome {
            Ok(result) => self.results.push(result),
            Err(error) => self.errors.push(error),
        }
        self.success_count = self.results.len();
        self.error_count = self.errors.len();
        self.total_processed = self.success_count + self.error_count;
    }
}
