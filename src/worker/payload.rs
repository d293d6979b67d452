//! Payloads published to the result subject

use crate::crawler::CrawlResult;
use crate::worker::TaskEnvelope;
use serde::{Deserialize, Serialize};

/// Output of a successful handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultContent {
    /// Extracted document text
    Text(String),
    /// Crawl results, manifest first
    Pages(Vec<CrawlResult>),
}

/// Published once a task completed successfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub source_id: String,
    pub content: ResultContent,
    pub url: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<String>,
}

impl ResultPayload {
    pub fn new(task: &TaskEnvelope, content: ResultContent) -> Self {
        Self {
            source_id: task.id.clone(),
            content,
            url: task.result_url(),
            status: "success".to_string(),
            correlation_id: task.correlation_id.clone(),
        }
    }
}

/// Published when a task ends without a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePayload {
    pub source_id: String,
    pub error: String,
    pub url: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<String>,
}

impl FailurePayload {
    pub fn new(task: &TaskEnvelope, error: impl Into<String>) -> Self {
        Self {
            source_id: task.id.clone(),
            error: error.into(),
            url: task.result_url(),
            status: "failed".to_string(),
            correlation_id: task.correlation_id.clone(),
        }
    }
}
