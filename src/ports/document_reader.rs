//! Reference Document Reader Port.
//!
//! Generator stages usually work from the cached document summary supplied
//! with the request; this port lets the application fetch the full text by
//! id when the summary is not enough.

use async_trait::async_trait;
use thiserror::Error;

/// Port for reading reference documents.
#[async_trait]
pub trait ReferenceDocumentReader: Send + Sync {
    /// Fetch the full text of a reference document.
    ///
    /// Returns `Ok(None)` when no document with the given id exists.
    async fn fetch_full_text(&self, document_id: &str) -> Result<Option<String>, DocumentReadError>;
}

/// Errors that can occur while reading reference documents.
#[derive(Debug, Clone, Error)]
pub enum DocumentReadError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document {0} is corrupted")]
    Corrupted(String),
}
