//! Storage for workflow results, used to make processing idempotent: a
//! document with an already-seen `(document_id, checksum)` pair is skipped.

use async_trait::async_trait;
use idp_core::CanonicalDocument;
use std::collections::HashSet;
use std::sync::Mutex;

#[async_trait]
pub trait DocumentResultStore: Send + Sync {
    async fn has_record(&self, document_id: &str, checksum: &str) -> bool;
    async fn save(&self, document: &CanonicalDocument) -> Result<(), String>;
}

/// In-memory store keyed on `(document_id, checksum)`, useful for tests and
/// for a single-process deployment where durability is handled elsewhere.
#[derive(Default)]
pub struct InMemoryDocumentResultStore {
    seen: Mutex<HashSet<(String, String)>>,
    saved: Mutex<Vec<CanonicalDocument>>,
}

impl InMemoryDocumentResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_documents(&self) -> Vec<CanonicalDocument> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentResultStore for InMemoryDocumentResultStore {
    async fn has_record(&self, document_id: &str, checksum: &str) -> bool {
        self.seen.lock().unwrap().contains(&(document_id.to_string(), checksum.to_string()))
    }

    async fn save(&self, document: &CanonicalDocument) -> Result<(), String> {
        self.seen
            .lock()
            .unwrap()
            .insert((document.document_id.clone(), document.checksum.clone()));
        self.saved.lock().unwrap().push(document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idp_core::CanonicalDocument;
    use std::collections::HashMap;

    fn document(id: &str, checksum: &str) -> CanonicalDocument {
        CanonicalDocument {
            document_id: id.to_string(),
            source_uri: "s3://bucket/key".to_string(),
            checksum: checksum.to_string(),
            text_spans: vec![],
            tables: vec![],
            fields: vec![],
            visual_descriptions: vec![],
            page_segments: vec![],
            attachments: vec![],
            summaries: vec![],
            enrichments: vec![],
            document_type: None,
            mime_type: None,
            schema_version: idp_core::SCHEMA_VERSION.to_string(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn records_and_detects_duplicates() {
        let store = InMemoryDocumentResultStore::new();
        assert!(!store.has_record("doc-1", "abc").await);
        store.save(&document("doc-1", "abc")).await.unwrap();
        assert!(store.has_record("doc-1", "abc").await);
        assert!(!store.has_record("doc-1", "different").await);
    }
}
