use crate::error::ScrapeError;
use url::Url;

/// Schemes the scraper is willing to fetch
const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// True if the string parses as an absolute http/https URL
pub fn validate(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => ALLOWED_SCHEMES.contains(&parsed.scheme()),
        Err(_) => false,
    }
}

/// Parse a URL and return its canonical string form with trailing slashes
/// removed from any non-root path.
///
/// Only parse failures are rejected here; scheme checks belong to [`validate`].
pub fn normalize(url: &str) -> Result<String, ScrapeError> {
    let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;
    Ok(normalize_parsed(parsed).to_string())
}

/// Validate and normalize in one step, returning the parsed URL
pub fn parse_target(url: &str) -> Result<Url, ScrapeError> {
    if !validate(url) {
        return Err(ScrapeError::InvalidUrl(url.to_string()));
    }
    let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;
    Ok(normalize_parsed(parsed))
}

fn normalize_parsed(mut url: Url) -> Url {
    if url.cannot_be_a_base() {
        return url;
    }
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }
    url
}

/// Resolve a possibly relative reference against a base URL.
///
/// Returns `None` instead of failing so a single malformed `href` never
/// aborts extraction of a whole document.
pub fn resolve(reference: &str, base: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    resolve_against(reference, &base).map(|u| u.to_string())
}

pub(crate) fn resolve_against(reference: &str, base: &Url) -> Option<Url> {
    base.join(reference.trim()).ok()
}

/// True when `url` is served from a different origin than `base`
pub fn is_external(url: &Url, base: &Url) -> bool {
    url.origin() != base.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_schemes() {
        assert!(validate("https://example.com"));
        assert!(validate("http://example.com/a?b=c"));
        assert!(!validate("ftp://example.com/file"));
        assert!(!validate("javascript:alert(1)"));
        assert!(!validate("file:///etc/passwd"));
        assert!(!validate("not a url"));
        assert!(!validate("/relative/path"));
    }

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(
            normalize("https://example.com/docs/").unwrap(),
            "https://example.com/docs"
        );
        assert_eq!(
            normalize("https://example.com/docs//").unwrap(),
            "https://example.com/docs"
        );
        // Root path keeps its slash
        assert_eq!(
            normalize("https://example.com").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize("https://example.com/?q=1").unwrap(),
            "https://example.com/?q=1"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "https://example.com",
            "https://example.com/",
            "https://example.com/a/b/",
            "https://example.com/a//",
            "http://EXAMPLE.com:80/x/?y=1#frag",
            "https://example.com/%7Euser/",
        ];
        for input in inputs {
            let once = normalize(input).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalize should be idempotent for {}", input);
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize("not a url").unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidUrl(_)));
    }

    #[test]
    fn test_parse_target_rejects_disallowed_scheme() {
        assert!(matches!(
            parse_target("ftp://example.com/"),
            Err(ScrapeError::InvalidUrl(_))
        ));
        assert_eq!(
            parse_target("https://example.com/a/").unwrap().as_str(),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_resolve() {
        assert_eq!(
            resolve("/b", "https://example.com/a").as_deref(),
            Some("https://example.com/b")
        );
        assert_eq!(
            resolve("c.png", "https://example.com/dir/page").as_deref(),
            Some("https://example.com/dir/c.png")
        );
        assert_eq!(
            resolve("https://other.com/x", "https://example.com/a").as_deref(),
            Some("https://other.com/x")
        );
        assert_eq!(resolve("/b", "not a base"), None);
        assert_eq!(resolve("http://[::1", "https://example.com/"), None);
    }

    #[test]
    fn test_is_external_compares_origins() {
        let base = Url::parse("https://example.com/a").unwrap();
        let same = Url::parse("https://example.com/b").unwrap();
        let other_host = Url::parse("https://other.com/x").unwrap();
        let other_scheme = Url::parse("http://example.com/b").unwrap();
        assert!(!is_external(&same, &base));
        assert!(is_external(&other_host, &base));
        assert!(is_external(&other_scheme, &base));
    }
}
