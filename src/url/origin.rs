use crate::{UrlError, UrlResult};
use url::Url;

/// Well-known manifest file served at a site's origin
pub const MANIFEST_FILE: &str = "llms.txt";

/// Returns the origin (`scheme://host[:port]`) of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ingestion_worker::url::origin_of;
///
/// let url = Url::parse("https://example.com/docs/intro?x=1").unwrap();
/// assert_eq!(origin_of(&url).unwrap(), "https://example.com");
/// ```
pub fn origin_of(url: &Url) -> UrlResult<String> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(UrlError::MissingDomain);
    }
    Ok(origin.ascii_serialization())
}

/// Derives the manifest URL for the site hosting `url`
///
/// The manifest always lives at the root of the origin, regardless of how deep
/// the target page is.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ingestion_worker::url::manifest_url;
///
/// let url = Url::parse("https://example.com/docs/intro").unwrap();
/// assert_eq!(manifest_url(&url).unwrap().as_str(), "https://example.com/llms.txt");
/// ```
pub fn manifest_url(url: &Url) -> UrlResult<Url> {
    let origin = origin_of(url)?;
    Url::parse(&format!("{}/{}", origin, MANIFEST_FILE)).map_err(|e| UrlError::Parse(e.to_string()))
}

/// Returns true if the URL itself is a site manifest
pub fn is_manifest_url(url: &str) -> bool {
    url.ends_with(MANIFEST_FILE)
}

/// Returns true if the URL names a plain-text resource (`.txt`, manifests included)
pub fn is_text_resource(url: &str) -> bool {
    url.ends_with(".txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_keeps_non_default_port() {
        let url = Url::parse("http://127.0.0.1:8080/home").unwrap();
        assert_eq!(origin_of(&url).unwrap(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_origin_drops_default_port() {
        let url = Url::parse("https://example.com:443/home").unwrap();
        assert_eq!(origin_of(&url).unwrap(), "https://example.com");
    }

    #[test]
    fn test_manifest_url_from_deep_page() {
        let url = Url::parse("https://example.com/a/b/c?query=1#frag").unwrap();
        assert_eq!(
            manifest_url(&url).unwrap().as_str(),
            "https://example.com/llms.txt"
        );
    }

    #[test]
    fn test_is_manifest_url() {
        assert!(is_manifest_url("https://example.com/llms.txt"));
        assert!(!is_manifest_url("https://example.com/doc.txt"));
        assert!(!is_manifest_url("https://example.com/llms.txt/page"));
    }

    #[test]
    fn test_is_text_resource() {
        assert!(is_text_resource("https://example.com/llms.txt"));
        assert!(is_text_resource("https://example.com/doc.txt"));
        assert!(!is_text_resource("https://example.com/docs/page"));
        assert!(!is_text_resource("https://example.com/notes.txt.html"));
    }
}
