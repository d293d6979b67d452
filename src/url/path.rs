use url::Url;

/// Separator placed between breadcrumb segments
const BREADCRUMB_SEPARATOR: &str = " > ";

/// Builds a breadcrumb from a URL's path
///
/// The path is split on `/`, empty segments are discarded, and the remaining
/// segments are joined with `" > "`. Query and fragment are ignored.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ingestion_worker::url::breadcrumb_path;
///
/// let url = Url::parse("https://example.com/docs/guide/install/").unwrap();
/// assert_eq!(breadcrumb_path(&url), "docs > guide > install");
/// ```
pub fn breadcrumb_path(url: &Url) -> String {
    url.path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(BREADCRUMB_SEPARATOR)
}
