use crate::fetchers::http::StaticResponse;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// Rules for recognising a bot-mitigation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDetectorConfig {
    /// Statuses that signal a block (only 403 by default; 429 is an opt-in)
    #[serde(default = "default_block_statuses")]
    pub block_statuses: Vec<u16>,

    /// Header names whose presence signals a block
    #[serde(default = "default_block_headers")]
    pub block_headers: Vec<String>,

    /// Regex patterns matched against the response body
    #[serde(default = "default_challenge_markers")]
    pub challenge_markers: Vec<String>,
}

fn default_block_statuses() -> Vec<u16> {
    vec![403]
}

fn default_block_headers() -> Vec<String> {
    vec!["cf-mitigated".to_string()]
}

fn default_challenge_markers() -> Vec<String> {
    vec![
        r"Just a moment\.\.\.".to_string(),
        r"cf-browser-verification".to_string(),
        r"(?i)checking your browser before accessing".to_string(),
        r"cdn-cgi/challenge-platform".to_string(),
    ]
}

impl Default for BlockDetectorConfig {
    fn default() -> Self {
        Self {
            block_statuses: default_block_statuses(),
            block_headers: default_block_headers(),
            challenge_markers: default_challenge_markers(),
        }
    }
}

/// Why a static response was judged blocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Status(u16),
    Header(String),
    ChallengeMarker(String),
}

/// Escalation signal consumed by the fetch orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The static response is usable as-is, whatever its status
    Pass,
    /// Retry through the browser
    Escalate(BlockReason),
}

impl Verdict {
    pub fn should_escalate(&self) -> bool {
        matches!(self, Verdict::Escalate(_))
    }
}

/// Inspects static responses for signs of bot mitigation
#[derive(Debug)]
pub struct BlockDetector {
    config: BlockDetectorConfig,
    markers: RegexSet,
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::new(BlockDetectorConfig::default()).expect("Default challenge markers should be valid")
    }
}

impl BlockDetector {
    pub fn new(mut config: BlockDetectorConfig) -> Result<Self, regex::Error> {
        let markers = RegexSet::new(&config.challenge_markers)?;
        for name in config.block_headers.iter_mut() {
            *name = name.to_ascii_lowercase();
        }
        Ok(Self { config, markers })
    }

    /// Any single condition is enough to escalate
    pub fn inspect(&self, response: &StaticResponse) -> Verdict {
        if self.config.block_statuses.contains(&response.status) {
            return Verdict::Escalate(BlockReason::Status(response.status));
        }

        for name in &self.config.block_headers {
            if response.header(name).is_some() {
                return Verdict::Escalate(BlockReason::Header(name.clone()));
            }
        }

        if let Some(index) = self.markers.matches(&response.body).iter().next() {
            return Verdict::Escalate(BlockReason::ChallengeMarker(
                self.config.challenge_markers[index].clone(),
            ));
        }

        Verdict::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> StaticResponse {
        StaticResponse {
            final_url: Url::parse("https://example.com/").unwrap(),
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_plain_page_passes() {
        let detector = BlockDetector::default();
        assert_eq!(
            detector.inspect(&response(200, &[], "<html>hello</html>")),
            Verdict::Pass
        );
    }

    #[test]
    fn test_forbidden_escalates() {
        let detector = BlockDetector::default();
        assert_eq!(
            detector.inspect(&response(403, &[], "")),
            Verdict::Escalate(BlockReason::Status(403))
        );
    }

    #[test]
    fn test_other_error_statuses_pass_through() {
        let detector = BlockDetector::default();
        for status in [404, 429, 500, 503] {
            assert_eq!(
                detector.inspect(&response(status, &[], "error page")),
                Verdict::Pass,
                "status {} should not escalate",
                status
            );
        }
    }

    #[test]
    fn test_block_header_escalates() {
        let detector = BlockDetector::default();
        let verdict = detector.inspect(&response(200, &[("cf-mitigated", "challenge")], ""));
        assert_eq!(
            verdict,
            Verdict::Escalate(BlockReason::Header("cf-mitigated".into()))
        );
    }

    #[test]
    fn test_challenge_marker_escalates() {
        let detector = BlockDetector::default();
        let verdict = detector.inspect(&response(
            200,
            &[],
            "<title>Just a moment...</title><p>Checking</p>",
        ));
        assert!(verdict.should_escalate());
    }

    #[test]
    fn test_custom_statuses() {
        let config = BlockDetectorConfig {
            block_statuses: vec![403, 429],
            ..BlockDetectorConfig::default()
        };
        let detector = BlockDetector::new(config).unwrap();
        assert!(detector.inspect(&response(429, &[], "")).should_escalate());
    }

    #[test]
    fn test_invalid_marker_is_rejected() {
        let config = BlockDetectorConfig {
            challenge_markers: vec!["(unclosed".to_string()],
            ..BlockDetectorConfig::default()
        };
        assert!(BlockDetector::new(config).is_err());
    }
}
