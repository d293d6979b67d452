//! LLM content filtering
//!
//! Long documentation pages carry navigation, legal text, and banners around
//! the content worth indexing. A [`ContentFilter`] asks a language model to keep
//! only the technical content, chunk by chunk, following an instruction.

use crate::config::LlmConfig;
use crate::crawler::LlmFilterSpec;
use crate::security::Credential;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rough characters-per-token ratio used to size chunks
const CHARS_PER_TOKEN: usize = 4;

/// Errors raised by a content filter
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned no content for chunk {chunk}")]
    EmptyResponse { chunk: usize },
}

/// Filters rendered markdown down to the content worth keeping
#[async_trait]
pub trait ContentFilter: Send + Sync {
    async fn filter(
        &self,
        markdown: &str,
        spec: &LlmFilterSpec,
        credential: &Credential,
    ) -> Result<String, FilterError>;
}

/// Splits markdown into chunks of at most `max_tokens` estimated tokens
///
/// Chunks break on paragraph boundaries. A single paragraph larger than the
/// limit is split on character boundaries.
pub fn chunk_markdown(markdown: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in markdown.split("\n\n").filter(|p| !p.trim().is_empty()) {
        let separator = if current.is_empty() { 0 } else { 2 };
        if current.len() + separator + paragraph.len() > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if paragraph.len() > max_chars {
            let mut piece = String::new();
            for c in paragraph.chars() {
                if piece.len() + c.len_utf8() > max_chars {
                    chunks.push(std::mem::take(&mut piece));
                }
                piece.push(c);
            }
            current = piece;
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Content filter backed by the Gemini `generateContent` API
#[derive(Clone)]
pub struct GeminiContentFilter {
    http_client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiContentFilter {
    pub fn new(http_client: Client, config: &LlmConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    async fn filter_chunk(
        &self,
        index: usize,
        chunk: &str,
        instruction: &str,
        credential: &Credential,
    ) -> Result<String, FilterError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: instruction }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: chunk }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", credential.expose())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FilterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(FilterError::EmptyResponse { chunk: index });
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ContentFilter for GeminiContentFilter {
    async fn filter(
        &self,
        markdown: &str,
        spec: &LlmFilterSpec,
        credential: &Credential,
    ) -> Result<String, FilterError> {
        let chunks = chunk_markdown(markdown, spec.chunk_token_threshold);
        tracing::debug!(
            "Filtering {} chars in {} chunk(s) with {}",
            markdown.len(),
            chunks.len(),
            self.model
        );

        let mut filtered = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            filtered.push(
                self.filter_chunk(index, chunk, &spec.instruction, credential)
                    .await?,
            );
        }

        Ok(filtered.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::EXTRACTION_INSTRUCTION;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_filter(base_url: &str) -> GeminiContentFilter {
        let config = LlmConfig {
            base_url: base_url.to_string(),
            ..LlmConfig::default()
        };
        GeminiContentFilter::new(Client::new(), &config)
    }

    fn spec(threshold: usize) -> LlmFilterSpec {
        LlmFilterSpec {
            instruction: EXTRACTION_INSTRUCTION.to_string(),
            chunk_token_threshold: threshold,
        }
    }

    fn gemini_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[test]
    fn test_chunk_small_document_is_single_chunk() {
        let chunks = chunk_markdown("# Title\n\nBody", 8000);
        assert_eq!(chunks, vec!["# Title\n\nBody".to_string()]);
    }

    #[test]
    fn test_chunk_breaks_on_paragraphs() {
        let para = "a".repeat(30);
        let md = format!("{}\n\n{}\n\n{}", para, para, para);
        // 10 tokens = 40 chars: one paragraph per chunk
        let chunks = chunk_markdown(&md, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c == &para));
    }

    #[test]
    fn test_chunk_splits_oversized_paragraph() {
        let md = "b".repeat(100);
        let chunks = chunk_markdown(&md, 10);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![40, 40, 20]);
    }

    #[test]
    fn test_chunk_empty_document() {
        assert!(chunk_markdown("\n\n  \n\n", 100).is_empty());
    }

    #[tokio::test]
    async fn test_filter_sends_instruction_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(gemini_reply("# Kept"))
            .expect(1)
            .mount(&server)
            .await;

        let filter = create_test_filter(&server.uri());
        let out = filter
            .filter("# Kept\n\nCookie banner", &spec(8000), &Credential::from("test-key"))
            .await
            .unwrap();

        assert_eq!(out, "# Kept");
    }

    #[tokio::test]
    async fn test_filter_joins_chunks_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(gemini_reply("part"))
            .expect(2)
            .mount(&server)
            .await;

        let filter = create_test_filter(&server.uri());
        let md = format!("{}\n\n{}", "x".repeat(400), "y".repeat(400));
        let out = filter
            .filter(&md, &spec(100), &Credential::from("k"))
            .await
            .unwrap();

        assert_eq!(out, "part\n\npart");
    }

    #[tokio::test]
    async fn test_filter_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let filter = create_test_filter(&server.uri());
        let err = filter
            .filter("content", &spec(8000), &Credential::from("bad"))
            .await
            .unwrap_err();

        assert!(matches!(err, FilterError::Api { status: 403, .. }));
    }
}
