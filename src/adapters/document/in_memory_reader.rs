//! In-memory reference document reader.
//!
//! Single-process implementation of the document reader port; a persistent
//! store can replace it behind the same trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::ports::{DocumentReadError, ReferenceDocumentReader};

/// Mutex-guarded map of document id to full text.
#[derive(Default)]
pub struct InMemoryDocumentReader {
    documents: Mutex<HashMap<String, String>>,
}

impl InMemoryDocumentReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document.
    pub fn insert(&self, document_id: impl Into<String>, full_text: impl Into<String>) {
        self.documents
            .lock()
            .expect("document lock poisoned")
            .insert(document_id.into(), full_text.into());
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.lock().expect("document lock poisoned").len()
    }

    /// True when no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReferenceDocumentReader for InMemoryDocumentReader {
    async fn fetch_full_text(
        &self,
        document_id: &str,
    ) -> Result<Option<String>, DocumentReadError> {
        Ok(self
            .documents
            .lock()
            .expect("document lock poisoned")
            .get(document_id)
            .cloned())
    }
}
