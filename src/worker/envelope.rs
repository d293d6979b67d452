//! Task envelope decoding

use crate::security::Credential;
use serde::Deserialize;
use thiserror::Error;

/// Deepest crawl the worker performs
pub const MAX_DEPTH: u32 = 1;

/// Errors raised while decoding a message body
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Message body is empty")]
    Empty,

    #[error("Malformed task envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Task envelope has an empty id")]
    MissingId,
}

/// Kind of work a task asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Web,
    File,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Web => "web",
            TaskKind::File => "file",
        }
    }
}

/// A unit of work received from the queue
///
/// Unknown fields are ignored so producers can add fields without breaking
/// older workers.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEnvelope {
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: Option<TaskKind>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub depth: Option<u32>,

    /// Per-task LLM credential, preferred over the configured one
    #[serde(default)]
    pub api_key: Option<Credential>,

    #[serde(default)]
    pub correlation_id: Option<String>,

    /// Regex patterns; matching links are dropped from the results
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl TaskEnvelope {
    /// Decodes a message body
    ///
    /// # Returns
    ///
    /// * `Ok(TaskEnvelope)` - The decoded envelope
    /// * `Err(DecodeError)` - The body is empty, not a JSON object of the expected shape, or has no id
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(DecodeError::Empty);
        }

        let envelope: TaskEnvelope = serde_json::from_slice(body)?;
        if envelope.id.trim().is_empty() {
            return Err(DecodeError::MissingId);
        }
        Ok(envelope)
    }

    /// Kind of work to perform
    ///
    /// Producers that omit `type` are routed by which locator they set: a `url`
    /// means a web task, otherwise a `path` means a file task.
    pub fn resolved_kind(&self) -> Option<TaskKind> {
        self.kind.or_else(|| {
            if self.url.is_some() {
                Some(TaskKind::Web)
            } else if self.path.is_some() {
                Some(TaskKind::File)
            } else {
                None
            }
        })
    }

    /// Requested crawl depth, defaulting to 1 and capped at [`MAX_DEPTH`]
    pub fn effective_depth(&self) -> u32 {
        self.depth.unwrap_or(1).min(MAX_DEPTH)
    }

    /// The locator echoed back in result payloads
    ///
    /// File tasks fall back to their path when no URL was supplied.
    pub fn result_url(&self) -> String {
        match (self.resolved_kind(), &self.url, &self.path) {
            (Some(TaskKind::File), None, Some(path)) => path.clone(),
            (_, Some(url), _) => url.clone(),
            (_, None, Some(path)) => path.clone(),
            _ => String::new(),
        }
    }
}
