//! URL normalization for consistent cache identity.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Normalize a parsed URL for use as a cache identity.
///
/// Lowercases the host and drops the fragment. The query string is kept
/// verbatim (not reordered), so `?a=1&b=2` and `?b=2&a=1` are different
/// entries.
pub fn normalize(mut url: Url) -> Url {
    if let Some(host) = url.host_str() {
        let lower = host.to_lowercase();
        if lower != host {
            // only fails for cannot-be-a-base URLs, which have no host
            let _ = url.set_host(Some(&lower));
        }
    }
    url.set_fragment(None);
    url
}

/// Resolve a page-supplied path or absolute URL against the application origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Join relative paths onto `origin`
/// 3. Reject anything but http and https
/// 4. Lowercase the host and remove the fragment
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = if trimmed.contains("://") { Url::parse(trimmed) } else { origin.join(trimmed) }
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    Ok(normalize(parsed))
}

/// Parse the configured application origin.
pub fn parse_origin(input: &str) -> Result<Url, UrlError> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(normalize(url)),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.test/").unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&origin(), "/static/css/main.css").unwrap();
        assert_eq!(url.as_str(), "https://app.test/static/css/main.css");
    }

    #[test]
    fn test_resolve_absolute_url() {
        let url = resolve(&origin(), "https://cdn.test/logo.png").unwrap();
        assert_eq!(url.host_str(), Some("cdn.test"));
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve(&origin(), "https://EXAMPLE.COM/Path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve(&origin(), "/admin#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/admin");
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve(&origin(), "/api/forms?b=2&a=1").unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve(&origin(), "  /offline  ").unwrap();
        assert_eq!(url.as_str(), "https://app.test/offline");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&origin(), "chrome-extension://abc/script.js");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&origin(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&origin(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_parse_origin() {
        assert!(parse_origin("http://localhost:8000").is_ok());
        assert!(matches!(parse_origin("file:///tmp"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(parse_origin("not a url"), Err(UrlError::InvalidUrl(_))));
    }
}
