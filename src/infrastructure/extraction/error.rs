//! Extraction error types
//!
//! Errors at the whole-document level. Per-talent and per-entry problems are
//! logged and skipped by the extractors, not surfaced here.

use thiserror::Error;

pub type ExtractionResult<T> = Result<T, ExtractionError>;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Empty response from {url}")]
    EmptyResponse { url: String },

    #[error("Data island '{marker}' not found in page")]
    DataIslandMissing { marker: String },

    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed parsing failed: {0}")]
    Feed(#[from] quick_xml::DeError),
}

impl ExtractionError {
    pub(crate) fn invalid_selector(selector: &str, e: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        }
    }
}
