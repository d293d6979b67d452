//! URL handling module
//!
//! This module provides the small set of URL operations the worker relies on:
//! validating task URLs, deriving a site's origin and manifest location,
//! comparing hosts for internal-link filtering, and building breadcrumb paths.

mod domain;
mod origin;
mod path;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, same_host};
pub use origin::{is_manifest_url, is_text_resource, manifest_url, origin_of, MANIFEST_FILE};
pub use path::breadcrumb_path;

/// Parses a task URL and checks that it is crawlable
///
/// Only absolute `http`/`https` URLs with a host are accepted.
///
/// # Arguments
///
/// * `raw` - The URL string from the task envelope
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The URL is malformed, uses another scheme, or has no host
///
/// # Examples
///
/// ```
/// use ingestion_worker::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/docs").is_ok());
/// assert!(parse_http_url("ftp://example.com/file").is_err());
/// ```
pub fn parse_http_url(raw: &str) -> UrlResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
