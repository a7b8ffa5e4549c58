//! Enrichment dispatch: coordinates calls to named enrichment providers and
//! normalises their responses into [`DocumentEnrichment`] records, tolerating
//! unknown providers, timeouts, and malformed entries without failing the
//! whole batch.

use async_trait::async_trait;
use idp_core::{CanonicalDocument, DocumentEnrichment};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// A single request to an enrichment provider, carrying the document it was
/// derived from so providers can run against its full canonical content.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub document_id: String,
    pub document: CanonicalDocument,
}

/// One raw enrichment entry as returned by a provider, before normalisation.
#[derive(Debug, Clone, Default)]
pub struct RawEnrichmentEntry {
    pub enrichment_type: Option<String>,
    pub content: Option<Value>,
    pub model: Option<String>,
    pub confidence: Option<f64>,
    pub metadata: Option<Value>,
}

/// A provider's response for one document in a batch.
#[derive(Debug, Clone)]
pub struct EnrichmentResponse {
    pub document_id: String,
    pub enrichments: Vec<RawEnrichmentEntry>,
}

#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn name(&self) -> &str;
    fn max_batch_size(&self) -> usize {
        1
    }
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
    async fn enrich(&self, requests: &[EnrichmentRequest]) -> Vec<EnrichmentResponse>;
}

pub struct EnrichmentDispatcher {
    providers: HashMap<String, Box<dyn EnrichmentProvider>>,
}

impl EnrichmentDispatcher {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn EnrichmentProvider>>) -> Self {
        let providers = providers.into_iter().map(|p| (p.name().to_string(), p)).collect();
        Self { providers }
    }

    /// Dispatches enrichment calls for `documents` against the named
    /// providers. Unknown provider names are logged and skipped; a provider
    /// that times out or fails contributes no enrichments rather than
    /// failing the whole dispatch.
    pub async fn dispatch(
        &self,
        documents: &[CanonicalDocument],
        provider_names: &[String],
    ) -> HashMap<String, Vec<DocumentEnrichment>> {
        let mut results: HashMap<String, Vec<DocumentEnrichment>> =
            documents.iter().map(|d| (d.document_id.clone(), Vec::new())).collect();
        if documents.is_empty() {
            return results;
        }

        for provider_name in provider_names {
            let Some(provider) = self.providers.get(provider_name) else {
                log::warn!("requested enrichment provider {provider_name} is not configured");
                continue;
            };

            let requests: Vec<EnrichmentRequest> = documents
                .iter()
                .map(|d| EnrichmentRequest {
                    document_id: d.document_id.clone(),
                    document: d.clone(),
                })
                .collect();

            let batch_size = provider.max_batch_size().max(1);
            for batch in requests.chunks(batch_size) {
                let responses = invoke_provider(provider.as_ref(), batch).await;
                for response in responses {
                    let Some(target) = results.get_mut(&response.document_id) else {
                        log::warn!(
                            "provider {} returned enrichment for unknown document {}",
                            provider.name(),
                            response.document_id
                        );
                        continue;
                    };
                    target.extend(normalise_entries(provider_name, response.enrichments));
                }
            }
        }

        results
    }
}

async fn invoke_provider(provider: &dyn EnrichmentProvider, batch: &[EnrichmentRequest]) -> Vec<EnrichmentResponse> {
    if batch.is_empty() {
        return Vec::new();
    }
    match tokio::time::timeout(provider.timeout(), provider.enrich(batch)).await {
        Ok(responses) => responses,
        Err(_) => {
            log::warn!("enrichment provider {} timed out after {:?}", provider.name(), provider.timeout());
            Vec::new()
        }
    }
}

fn normalise_entries(provider_name: &str, entries: Vec<RawEnrichmentEntry>) -> Vec<DocumentEnrichment> {
    entries.into_iter().filter_map(|entry| normalise_entry(provider_name, entry)).collect()
}

fn normalise_entry(provider_name: &str, entry: RawEnrichmentEntry) -> Option<DocumentEnrichment> {
    let enrichment_type = entry.enrichment_type.filter(|s| !s.is_empty()).or_else(|| {
        log::warn!("enrichment entry from provider {provider_name} missing enrichment_type");
        None
    })?;

    let content = match entry.content {
        Some(Value::Object(map)) => map.into_iter().collect::<HashMap<_, _>>(),
        Some(_) => {
            log::warn!("enrichment entry from provider {provider_name} has non-object content");
            return None;
        }
        None => HashMap::new(),
    };

    let metadata = match entry.metadata {
        Some(Value::Object(map)) => map.into_iter().collect::<HashMap<_, _>>(),
        Some(_) => {
            log::warn!("enrichment entry from provider {provider_name} has non-object metadata");
            HashMap::new()
        }
        None => HashMap::new(),
    };

    Some(DocumentEnrichment {
        enrichment_type,
        provider: provider_name.to_string(),
        content,
        confidence: entry.confidence,
        model: entry.model,
        duration_ms: None,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn document(id: &str) -> CanonicalDocument {
        CanonicalDocument {
            document_id: id.to_string(),
            source_uri: "s3://bucket/key".to_string(),
            checksum: "abc".to_string(),
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
            metadata: StdHashMap::new(),
        }
    }

    struct FixedProvider;
    #[async_trait]
    impl EnrichmentProvider for FixedProvider {
        fn name(&self) -> &str {
            "classifier"
        }
        async fn enrich(&self, requests: &[EnrichmentRequest]) -> Vec<EnrichmentResponse> {
            requests
                .iter()
                .map(|r| EnrichmentResponse {
                    document_id: r.document_id.clone(),
                    enrichments: vec![RawEnrichmentEntry {
                        enrichment_type: Some("classification".to_string()),
                        content: Some(json!({"label": "invoice"})),
                        model: Some("classifier-v1".to_string()),
                        confidence: Some(0.95),
                        metadata: None,
                    }],
                })
                .collect()
        }
    }

    struct SlowProvider;
    #[async_trait]
    impl EnrichmentProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(1)
        }
        async fn enrich(&self, _requests: &[EnrichmentRequest]) -> Vec<EnrichmentResponse> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Vec::new()
        }
    }

    #[tokio::test]
    async fn dispatches_and_normalises_enrichments() {
        let dispatcher = EnrichmentDispatcher::new(vec![Box::new(FixedProvider)]);
        let docs = vec![document("doc-1")];
        let results = dispatcher.dispatch(&docs, &["classifier".to_string()]).await;
        let enrichments = &results["doc-1"];
        assert_eq!(enrichments.len(), 1);
        assert_eq!(enrichments[0].enrichment_type, "classification");
    }

    #[tokio::test]
    async fn unknown_provider_is_skipped_without_error() {
        let dispatcher = EnrichmentDispatcher::new(vec![Box::new(FixedProvider)]);
        let docs = vec![document("doc-1")];
        let results = dispatcher.dispatch(&docs, &["nonexistent".to_string()]).await;
        assert!(results["doc-1"].is_empty());
    }

    #[tokio::test]
    async fn timed_out_provider_contributes_no_enrichments() {
        let dispatcher = EnrichmentDispatcher::new(vec![Box::new(SlowProvider)]);
        let docs = vec![document("doc-1")];
        let results = dispatcher.dispatch(&docs, &["slow".to_string()]).await;
        assert!(results["doc-1"].is_empty());
    }

    #[tokio::test]
    async fn empty_document_list_returns_empty_map() {
        let dispatcher = EnrichmentDispatcher::new(vec![Box::new(FixedProvider)]);
        let results = dispatcher.dispatch(&[], &["classifier".to_string()]).await;
        assert!(results.is_empty());
    }
}
