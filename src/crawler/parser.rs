//! HTML rendering for the built-in crawling engine
//!
//! This module turns a fetched HTML page into:
//! - Markdown content (headings, paragraphs, lists, tables, fenced code, links)
//! - The structural link set, split into internal and external links
//! - The page title, when the document has one

use crate::crawler::engine::{Link, PageLinks};
use crate::url::same_host;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Page body rendered as markdown
    pub markdown: String,

    /// Links found in `<a>` tags, resolved to absolute URLs
    pub links: PageLinks,
}

/// Parses an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// When `exclude_external_links` is set, links leaving the site are dropped from
/// the link set and rendered as plain text in the markdown.
///
/// # Example
///
/// ```
/// use ingestion_worker::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><h1>Hi</h1><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, true);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert!(parsed.markdown.starts_with("# Hi"));
/// assert_eq!(parsed.links.internal[0].href, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url, exclude_external_links: bool) -> ParsedPage {
    let document = Html::parse_document(html);

    let renderer = MarkdownRenderer {
        base_url,
        exclude_external_links,
    };

    ParsedPage {
        title: extract_title(&document),
        markdown: renderer.render_document(&document),
        links: extract_links(&document, base_url, exclude_external_links),
    }
}

/// Renders an HTML document to markdown
pub fn html_to_markdown(html: &str, base_url: &Url) -> String {
    let document = Html::parse_document(html);
    MarkdownRenderer {
        base_url,
        exclude_external_links: false,
    }
    .render_document(&document)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts and classifies all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url, exclude_external_links: bool) -> PageLinks {
    let mut links = PageLinks::default();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(absolute) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            else {
                continue;
            };

            if same_host(base_url, &absolute) {
                links.internal.push(Link::new(absolute.as_str()));
            } else if !exclude_external_links {
                links.external.push(Link::new(absolute.as_str()));
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only and invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

struct MarkdownRenderer<'a> {
    base_url: &'a Url,
    exclude_external_links: bool,
}

impl MarkdownRenderer<'_> {
    fn render_document(&self, document: &Html) -> String {
        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next())
            .unwrap_or_else(|| document.root_element());

        let mut out = String::new();
        self.render_children(body, &mut out);
        out
    }

    /// Renders block-level content, grouping runs of inline content into paragraphs
    fn render_children(&self, element: ElementRef, out: &mut String) {
        let mut paragraph = String::new();

        for child in element.children() {
            if let Some(el) = ElementRef::wrap(child) {
                if is_block(el.value().name()) {
                    push_block(out, &tidy(&paragraph));
                    paragraph.clear();
                    self.render_block(el, out);
                } else {
                    paragraph.push_str(&self.render_inline(el));
                }
            } else if let Node::Text(text) = child.value() {
                paragraph.push_str(&collapse_whitespace(text));
            }
        }

        push_block(out, &tidy(&paragraph));
    }

    fn render_block(&self, el: ElementRef, out: &mut String) {
        match el.value().name() {
            "script" | "style" | "noscript" | "template" | "svg" | "iframe" | "head" | "form" => {}
            name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = tidy(&self.inline_children(el));
                if !text.is_empty() {
                    push_block(out, &format!("{} {}", "#".repeat(level), text));
                }
            }
            "p" => push_block(out, &tidy(&self.inline_children(el))),
            "pre" => {
                let code: String = el.text().collect();
                push_block(
                    out,
                    &format!("```{}\n{}\n```", code_language(el), code.trim_matches('\n')),
                );
            }
            name @ ("ul" | "ol") => push_block(out, &self.render_list(el, name == "ol", 0)),
            "blockquote" => {
                let mut inner = String::new();
                self.render_children(el, &mut inner);
                let quoted: Vec<String> = inner
                    .lines()
                    .map(|line| format!("> {}", line).trim_end().to_string())
                    .collect();
                push_block(out, &quoted.join("\n"));
            }
            "hr" => push_block(out, "---"),
            "table" => push_block(out, &self.render_table(el)),
            _ => self.render_children(el, out),
        }
    }

    fn render_list(&self, list: ElementRef, ordered: bool, depth: usize) -> String {
        let mut lines = Vec::new();
        let items = list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "li");

        for (index, item) in items.enumerate() {
            let marker = if ordered {
                format!("{}.", index + 1)
            } else {
                "-".to_string()
            };

            let mut text = String::new();
            let mut nested = Vec::new();
            for child in item.children() {
                if let Some(el) = ElementRef::wrap(child) {
                    match el.value().name() {
                        name @ ("ul" | "ol") => {
                            nested.push(self.render_list(el, name == "ol", depth + 1))
                        }
                        _ => text.push_str(&self.render_inline(el)),
                    }
                } else if let Node::Text(t) = child.value() {
                    text.push_str(&collapse_whitespace(t));
                }
            }

            lines.push(format!("{}{} {}", "  ".repeat(depth), marker, tidy(&text)));
            lines.extend(nested);
        }

        lines.join("\n")
    }

    fn render_table(&self, table: ElementRef) -> String {
        let Ok(row_selector) = Selector::parse("tr") else {
            return String::new();
        };

        let mut lines = Vec::new();
        for (index, row) in table.select(&row_selector).enumerate() {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|c| tidy(&self.inline_children(c)).replace('|', "\\|"))
                .collect();
            if cells.is_empty() {
                continue;
            }

            lines.push(format!("| {} |", cells.join(" | ")));
            if index == 0 {
                lines.push(format!("|{}", " --- |".repeat(cells.len())));
            }
        }

        lines.join("\n")
    }

    fn inline_children(&self, el: ElementRef) -> String {
        let mut text = String::new();
        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                text.push_str(&self.render_inline(child_el));
            } else if let Node::Text(t) = child.value() {
                text.push_str(&collapse_whitespace(t));
            }
        }
        text
    }

    fn render_inline(&self, el: ElementRef) -> String {
        match el.value().name() {
            "script" | "style" | "noscript" | "template" | "svg" | "img" => String::new(),
            "br" => " ".to_string(),
            "code" => {
                let code: String = el.text().collect();
                let code = code.trim();
                if code.is_empty() {
                    String::new()
                } else {
                    format!("`{}`", code)
                }
            }
            "strong" | "b" => wrap_inline(&self.inline_children(el), "**"),
            "em" | "i" => wrap_inline(&self.inline_children(el), "*"),
            "a" => self.render_anchor(el),
            _ => self.inline_children(el),
        }
    }

    fn render_anchor(&self, el: ElementRef) -> String {
        let text = tidy(&self.inline_children(el));
        let target = el
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, self.base_url));

        match target {
            Some(url) if !(self.exclude_external_links && !same_host(self.base_url, &url)) => {
                let label = if text.is_empty() { url.to_string() } else { text };
                format!(" [{}]({}) ", label, url)
            }
            _ => format!(" {} ", text),
        }
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "body"
            | "dd"
            | "details"
            | "div"
            | "dl"
            | "dt"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "head"
            | "header"
            | "hr"
            | "html"
            | "iframe"
            | "li"
            | "main"
            | "nav"
            | "noscript"
            | "ol"
            | "p"
            | "pre"
            | "script"
            | "section"
            | "style"
            | "summary"
            | "svg"
            | "table"
            | "template"
            | "ul"
    )
}

/// Reads the fence language from `class="language-x"` or `class="lang-x"`
fn code_language(pre: ElementRef) -> String {
    let code_child = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "code");

    let classes = pre
        .value()
        .classes()
        .chain(code_child.into_iter().flat_map(|c| c.value().classes()));

    for class in classes {
        if let Some(lang) = class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
        {
            return lang.to_string();
        }
    }
    String::new()
}

fn wrap_inline(text: &str, marker: &str) -> String {
    let inner = tidy(text);
    if inner.is_empty() {
        String::new()
    } else {
        format!(" {}{}{} ", marker, inner, marker)
    }
}

/// Collapses whitespace runs to one space, keeping a single leading/trailing space
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Trims inline content and removes doubled spaces left by element boundaries
fn tidy(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_block(out: &mut String, block: &str) {
    let block = block.trim_matches('\n');
    if block.trim().is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(block);
}
