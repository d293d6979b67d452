use crate::conversion::{ConversionError, Document, DocumentEngine};
use crate::crawler::html_to_markdown;
use std::path::Path;
use url::Url;

/// Converts documents that need no external service
///
/// Markdown and plain text pass through; HTML is rendered to markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDocumentEngine;

impl DocumentEngine for LocalDocumentEngine {
    fn convert(&self, path: &Path) -> Result<Document, ConversionError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "md" | "markdown" | "txt" => Ok(Document::new(std::fs::read_to_string(path)?)),
            "html" | "htm" => {
                let html = std::fs::read_to_string(path)?;
                let base = file_url(path)?;
                Ok(Document::new(html_to_markdown(&html, &base)))
            }
            "" => Err(ConversionError::Unsupported(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(ConversionError::Unsupported(format!(
                ".{} files need a document conversion service",
                other
            ))),
        }
    }
}

fn file_url(path: &Path) -> Result<Url, ConversionError> {
    let absolute = std::fs::canonicalize(path)?;
    Url::from_file_path(&absolute).map_err(|_| {
        ConversionError::Unsupported(format!("{} has no file URL", absolute.display()))
    })
}
