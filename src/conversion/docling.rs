use crate::conversion::{ConversionError, Document, DocumentEngine};
use reqwest::blocking::{multipart::Form, Client};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize)]
struct ProcessResponse {
    text: String,
}

/// Converts documents through a docling-serve `/process` endpoint
///
/// Each conversion builds its own blocking client so that the client is
/// created and dropped on the pool thread running the conversion.
#[derive(Debug, Clone)]
pub struct DoclingServeEngine {
    base_url: String,
    timeout: Duration,
}

impl DoclingServeEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl DocumentEngine for DoclingServeEngine {
    fn convert(&self, path: &Path) -> Result<Document, ConversionError> {
        let form = Form::new().file("file", path)?;
        let client = Client::builder().timeout(self.timeout).build()?;

        let response = client
            .post(format!("{}/process", self.base_url))
            .multipart(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::Engine(format!(
                "docling-serve returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: ProcessResponse = response.json()?;
        Ok(Document::new(body.text))
    }
}
