use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed static request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkErrorKind {
    /// Host not found or connection refused
    Connect,
    /// Redirect chain exceeded `maxRedirects`
    TooManyRedirects,
    /// Response body could not be read or decoded
    Body,
    /// Anything else reported by the HTTP client
    Other,
}

/// Where in the pipeline a timeout fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeoutStage {
    StaticRequest,
    BrowserLaunch,
    Navigation,
    Scroll,
    Screenshot,
    PageRead,
}

/// Errors surfaced by the fetch-and-extract pipeline
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid URL provided: {0}")]
    InvalidUrl(String),

    #[error("Network error ({kind:?}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("Timeout during {stage:?} after {after:?}")]
    Timeout { stage: TimeoutStage, after: Duration },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Serializable tag for a [`ScrapeError`], reported in batch error entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidUrl,
    Network,
    Timeout,
    Browser,
    Extraction,
    Config,
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            ScrapeError::Network { .. } => ErrorKind::Network,
            ScrapeError::Timeout { .. } => ErrorKind::Timeout,
            ScrapeError::Browser(_) => ErrorKind::Browser,
            ScrapeError::Extraction(_) => ErrorKind::Extraction,
            ScrapeError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn timeout(stage: TimeoutStage, after: Duration) -> Self {
        ScrapeError::Timeout { stage, after }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_redirect() {
            NetworkErrorKind::TooManyRedirects
        } else if error.is_connect() {
            NetworkErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            NetworkErrorKind::Body
        } else {
            NetworkErrorKind::Other
        };
        ScrapeError::Network {
            kind,
            message: error.to_string(),
        }
    }
}

impl From<fantoccini::error::CmdError> for ScrapeError {
    fn from(error: fantoccini::error::CmdError) -> Self {
        ScrapeError::Browser(error.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for ScrapeError {
    fn from(error: fantoccini::error::NewSessionError) -> Self {
        ScrapeError::Browser(format!("failed to start WebDriver session: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            ScrapeError::InvalidUrl("x".into()).kind(),
            ErrorKind::InvalidUrl
        );
        assert_eq!(
            ScrapeError::timeout(TimeoutStage::Navigation, Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidUrl).unwrap(),
            "\"invalidUrl\""
        );
    }

    #[test]
    fn test_display_mentions_invalid_url() {
        let err = ScrapeError::InvalidUrl("ftp://example.com".into());
        assert!(err.to_string().contains("Invalid URL"));
    }
}
