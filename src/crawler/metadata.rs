//! Page metadata extraction
//!
//! Pure functions deriving a page's title, breadcrumb path, and internal links
//! from its rendered markdown.

use crate::crawler::engine::Link;
use crate::url::{breadcrumb_path, same_host};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

/// Metadata derived from one rendered page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub path: String,
    pub links: BTreeSet<String>,
}

fn markdown_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*?\]\(([^)]*?)\)").expect("valid markdown link regex"))
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#[ \t]+(.+)$").expect("valid heading regex"))
}

/// Extracts title, path, and internal links
///
/// # Arguments
///
/// * `markdown` - Rendered page content
/// * `page_url` - URL the page was fetched from; relative links resolve against it
/// * `structural_links` - Internal links the engine found in the page structure
///
/// # Returns
///
/// The page metadata. Links are restricted to `page_url`'s host and deduplicated.
pub fn extract(markdown: &str, page_url: &Url, structural_links: &[Link]) -> PageMetadata {
    PageMetadata {
        title: extract_title(markdown),
        path: breadcrumb_path(page_url),
        links: extract_links(markdown, page_url, structural_links),
    }
}

/// Returns the first top-level heading, trimmed, or an empty string
pub fn extract_title(markdown: &str) -> String {
    title_regex()
        .captures(markdown)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Collects internal links from the page structure and from markdown link syntax
pub fn extract_links(markdown: &str, page_url: &Url, structural_links: &[Link]) -> BTreeSet<String> {
    let structural = structural_links.iter().map(|link| link.href.as_str());
    let inline = markdown_link_regex()
        .captures_iter(markdown)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str());

    structural
        .chain(inline)
        .filter_map(|href| resolve_internal(href.trim(), page_url))
        .collect()
}

/// Resolves `href` against `base`, keeping it only if it stays on the same host
fn resolve_internal(href: &str, base: &Url) -> Option<String> {
    // Markdown titles: [text](url "title")
    let href = href.split_whitespace().next()?;
    let href = href.trim_start_matches('<').trim_end_matches('>');

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") || !same_host(base, &resolved) {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
