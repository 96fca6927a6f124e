//! URL canonicalization shared by the crawler, indexer, and tool layer.
//!
//! Every URL crossing a component boundary goes through [`canonicalize`]:
//! query and fragment dropped, trailing slash stripped. The `url` crate
//! already lowercases scheme and host during parsing.

use url::Url;

use crate::error::{KbError, Result};

/// Parse an absolute URL, mapping failures to a validation error.
pub fn parse(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|e| KbError::validation(format!("invalid URL '{raw}': {e}")))
}

/// Canonical string form of a URL: no query, no fragment, no trailing slash.
pub fn canonicalize(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.set_query(None);
    let mut s = u.to_string();
    while s.ends_with('/') {
        s.pop();
    }
    s
}

/// Resolve an href against the referring page's URL and canonicalize it.
///
/// Anchor-only and non-HTTP(S) hrefs (`#…`, `mailto:`, `javascript:`,
/// `tel:`) yield `None`.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("javascript:") || lower.starts_with("tel:")
    {
        return None;
    }

    let joined = base.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(canonicalize(&joined)),
        _ => None,
    }
}

/// The network-location part of a URL (host, plus port when present).
pub fn host_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_drops_fragment_and_query() {
        let url = Url::parse("https://docs.example.com/guide/intro?ref=nav#section-2").unwrap();
        assert_eq!(canonicalize(&url), "https://docs.example.com/guide/intro");
    }

    #[test]
    fn canonical_strips_trailing_slash() {
        let a = Url::parse("https://docs.example.com/guide/").unwrap();
        let b = Url::parse("https://docs.example.com/guide").unwrap();
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn canonical_equivalence_for_fragment_variants() {
        let a = Url::parse("https://docs.example.com/page#top").unwrap();
        let b = Url::parse("https://docs.example.com/page").unwrap();
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn canonical_lowercases_host() {
        let url = Url::parse("https://Docs.Example.COM/Guide").unwrap();
        assert_eq!(canonicalize(&url), "https://docs.example.com/Guide");
    }

    #[test]
    fn resolve_relative_href() {
        let base = Url::parse("https://docs.example.com/guide/intro").unwrap();
        assert_eq!(
            resolve(&base, "../api/reference"),
            Some("https://docs.example.com/api/reference".to_string())
        );
        assert_eq!(
            resolve(&base, "/switch"),
            Some("https://docs.example.com/switch".to_string())
        );
    }

    #[test]
    fn resolve_discards_anchors_and_schemes() {
        let base = Url::parse("https://docs.example.com/guide").unwrap();
        assert_eq!(resolve(&base, "#section"), None);
        assert_eq!(resolve(&base, "mailto:help@example.com"), None);
        assert_eq!(resolve(&base, "javascript:void(0)"), None);
        assert_eq!(resolve(&base, "tel:+1-555-0100"), None);
        assert_eq!(resolve(&base, "ftp://files.example.com/a"), None);
    }

    #[test]
    fn resolve_strips_fragment_from_absolute_href() {
        let base = Url::parse("https://docs.example.com/guide").unwrap();
        assert_eq!(
            resolve(&base, "https://docs.example.com/api#auth"),
            Some("https://docs.example.com/api".to_string())
        );
    }

    #[test]
    fn host_includes_port() {
        let url = Url::parse("http://localhost:3000/docs").unwrap();
        assert_eq!(host_of(&url), "localhost:3000");

        let url = Url::parse("https://docs.example.com/docs").unwrap();
        assert_eq!(host_of(&url), "docs.example.com");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("not a url").is_err());
        assert!(parse("https://docs.example.com/ok").is_ok());
    }
}
