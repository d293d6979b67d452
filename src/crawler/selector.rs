use crate::url::is_text_resource;

/// Instruction handed to the LLM content filter for documentation pages
pub const EXTRACTION_INSTRUCTION: &str = "\
Extract technical content from this software documentation page.

KEEP:
- All code examples with their comments
- Function/method signatures and parameters
- Configuration examples and syntax
- Technical explanations and concepts
- Error messages and troubleshooting steps
- Links to related API documentation

REMOVE:
- Navigation menus and sidebars
- Copyright and legal notices
- Unrelated marketing content
- \"Edit this page\" links
- Cookie banners and consent forms

PRESERVE:
- Code block language annotations (```go, etc.)
- Heading hierarchy for context
- Inline code references
- Numbered lists for sequential steps
";

/// Default chunk size for the LLM filter, in estimated tokens
pub const DEFAULT_CHUNK_TOKEN_THRESHOLD: usize = 8000;

/// Settings for LLM-assisted content filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmFilterSpec {
    pub instruction: String,
    pub chunk_token_threshold: usize,
}

/// How the engine turns a fetched page into content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Render the page as-is
    PassThrough,
    /// Render, then keep only what the LLM filter extracts
    LlmFiltered(LlmFilterSpec),
}

impl Strategy {
    pub fn requires_credential(&self) -> bool {
        matches!(self, Strategy::LlmFiltered(_))
    }
}

/// Chooses a rendering strategy per URL
#[derive(Debug, Clone)]
pub struct ContentFilterSelector {
    chunk_token_threshold: usize,
}

impl Default for ContentFilterSelector {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_TOKEN_THRESHOLD)
    }
}

impl ContentFilterSelector {
    pub fn new(chunk_token_threshold: usize) -> Self {
        Self {
            chunk_token_threshold,
        }
    }

    /// Selects the strategy for `url`
    ///
    /// Plain-text resources (manifests included) are already structured and
    /// pass through untouched; everything else is LLM-filtered.
    ///
    /// # Examples
    ///
    /// ```
    /// use ingestion_worker::crawler::{ContentFilterSelector, Strategy};
    ///
    /// let selector = ContentFilterSelector::default();
    /// assert_eq!(selector.select("https://x/llms.txt"), Strategy::PassThrough);
    /// assert!(selector.select("https://x/docs/page").requires_credential());
    /// ```
    pub fn select(&self, url: &str) -> Strategy {
        if is_text_resource(url) {
            tracing::debug!("Bypassing content filter for text resource {}", url);
            return Strategy::PassThrough;
        }

        Strategy::LlmFiltered(LlmFilterSpec {
            instruction: EXTRACTION_INSTRUCTION.to_string(),
            chunk_token_threshold: self.chunk_token_threshold,
        })
    }
}
