use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ingestion_worker::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether two URLs point at the same host
///
/// Hosts are compared case-insensitively together with any explicit port, so
/// `http://127.0.0.1:8080` and `http://127.0.0.1:9090` are different sites while
/// `http://example.com` and `https://example.com` are the same one. Subdomains are
/// not considered internal.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ingestion_worker::url::same_host;
///
/// let origin = Url::parse("https://example.com/docs").unwrap();
/// assert!(same_host(&origin, &Url::parse("https://Example.com/other").unwrap()));
/// assert!(!same_host(&origin, &Url::parse("https://blog.example.com/").unwrap()));
/// ```
pub fn same_host(origin: &Url, candidate: &Url) -> bool {
    match (extract_domain(origin), extract_domain(candidate)) {
        (Some(a), Some(b)) => a == b && origin.port() == candidate.port(),
        _ => false,
    }
}
