//! Link resolution and URL canonicalisation for extracted results.

use url::Url;

/// Tracking query parameters dropped when comparing URLs.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

/// Resolve `href` against `base` into an absolute http(s) URL.
///
/// Returns `None` for empty links, fragment-only links, `javascript:` and
/// `mailto:` targets, and anything that does not resolve to http(s).
pub fn resolve(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Canonical form used to spot duplicate links.
///
/// Drops the fragment, default ports, tracking parameters, and a trailing
/// slash; scheme and host are lower-cased by the parser. Unparseable input
/// is returned unchanged.
pub fn canonical(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_owned();
    };
    parsed.set_fragment(None);
    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.tga.gov.au/resources/";

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            resolve(BASE, "/products/methotrexate").as_deref(),
            Some("https://www.tga.gov.au/products/methotrexate")
        );
        assert_eq!(
            resolve(BASE, "cmi/123").as_deref(),
            Some("https://www.tga.gov.au/resources/cmi/123")
        );
    }

    #[test]
    fn keeps_absolute_links() {
        assert_eq!(
            resolve(BASE, "https://pubmed.ncbi.nlm.nih.gov/123/").as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/123/")
        );
    }

    #[test]
    fn skips_empty_fragment_and_script_links() {
        assert!(resolve(BASE, "").is_none());
        assert!(resolve(BASE, "  ").is_none());
        assert!(resolve(BASE, "#").is_none());
        assert!(resolve(BASE, "#results").is_none());
        assert!(resolve(BASE, "javascript:void(0)").is_none());
        assert!(resolve(BASE, "JavaScript:alert(1)").is_none());
        assert!(resolve(BASE, "mailto:info@tga.gov.au").is_none());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(resolve(BASE, "ftp://files.example.com/a").is_none());
    }

    #[test]
    fn bad_base_with_relative_link_is_none() {
        assert!(resolve("not a url", "/a").is_none());
    }

    #[test]
    fn canonical_ignores_fragment_and_trailing_slash() {
        assert_eq!(
            canonical("https://Example.com/path/#top"),
            canonical("https://example.com/path")
        );
    }

    #[test]
    fn canonical_strips_tracking_params() {
        assert_eq!(
            canonical("https://example.com/a?id=3&utm_source=x"),
            "https://example.com/a?id=3"
        );
    }

    #[test]
    fn canonical_removes_default_port() {
        assert_eq!(canonical("https://example.com:443/a"), "https://example.com/a");
    }

    #[test]
    fn canonical_passes_through_garbage() {
        assert_eq!(canonical("not a url"), "not a url");
    }
}
