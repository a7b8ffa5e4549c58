//! The document-intelligence workflow: submits a document for vendor
//! analysis, transforms the result into the canonical schema, recursively
//! attaches parsed email children, summarises, dispatches enrichment, and
//! persists the result idempotently.

use crate::enrichment::EnrichmentDispatcher;
use crate::error::WorkflowError;
use crate::store::DocumentResultStore;
use crate::summarizer::DocumentSummarizer;
use crate::vendor::VendorAnalysisService;
use idp_adapters::ParserAdapter;
use idp_core::{canonical_to_denorm_records, CanonicalDocument, DenormRecord, DocumentAttachment};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

/// Bound on recursive email-attachment unpacking, matching the reference
/// workflow's hard depth limit.
const MAX_ATTACHMENT_DEPTH: u32 = 3;

pub struct WorkflowConfig {
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkflowResult {
    pub document: Option<CanonicalDocument>,
    pub skipped: bool,
    pub records: Vec<DenormRecord>,
}

pub struct ProcessRequest<'a> {
    pub document_id: &'a str,
    pub document_bytes: &'a [u8],
    pub source_uri: &'a str,
    pub metadata: HashMap<String, serde_json::Value>,
    pub content_type: Option<&'a str>,
    pub force: bool,
    pub enrich_with: Vec<String>,
}

pub struct DocumentIntelligenceWorkflow {
    service: VendorAnalysisService,
    store: Box<dyn DocumentResultStore>,
    adapter: Box<dyn ParserAdapter>,
    summarizer: Box<dyn DocumentSummarizer>,
    enrichment_dispatcher: Option<EnrichmentDispatcher>,
}

impl DocumentIntelligenceWorkflow {
    #[must_use]
    pub fn new(
        service: VendorAnalysisService,
        store: Box<dyn DocumentResultStore>,
        adapter: Box<dyn ParserAdapter>,
        summarizer: Box<dyn DocumentSummarizer>,
        enrichment_dispatcher: Option<EnrichmentDispatcher>,
    ) -> Self {
        Self {
            service,
            store,
            adapter,
            summarizer,
            enrichment_dispatcher,
        }
    }

    pub async fn process(&self, request: ProcessRequest<'_>) -> Result<WorkflowResult, WorkflowError> {
        let checksum = checksum_of(request.document_bytes);

        if !request.force && self.store.has_record(request.document_id, &checksum).await {
            log::info!("skipping {}: identical payload already processed", request.document_id);
            return Ok(WorkflowResult {
                document: None,
                skipped: true,
                records: Vec::new(),
            });
        }

        let analyze_result = self
            .service
            .analyze(request.document_bytes, request.content_type)
            .await
            .map_err(WorkflowError::VendorAnalysisFailed)?;

        let mut canonical = self.adapter.transform(
            &analyze_result,
            request.document_id,
            request.source_uri,
            &checksum,
            &request.metadata,
        )?;

        canonical = self
            .attach_email_children(canonical, request.document_bytes, request.source_uri, &request.metadata, 0)
            .await?;

        let summaries = self.summarizer.summarise(&canonical).await;
        if !summaries.is_empty() {
            canonical = canonical.with_additional_summaries(summaries);
        }

        if let Some(dispatcher) = &self.enrichment_dispatcher {
            if !request.enrich_with.is_empty() {
                let results = dispatcher.dispatch(std::slice::from_ref(&canonical), &request.enrich_with).await;
                if let Some(enrichments) = results.get(&canonical.document_id) {
                    if !enrichments.is_empty() {
                        canonical = canonical.with_additional_enrichments(enrichments.clone());
                    }
                }
            }
        }

        self.store
            .save(&canonical)
            .await
            .map_err(WorkflowError::Store)?;

        let request_id = request
            .metadata
            .get("request_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(request.document_id)
            .to_string();
        let records = canonical_to_denorm_records(&canonical, &request_id, now_utc());

        Ok(WorkflowResult {
            document: Some(canonical),
            skipped: false,
            records,
        })
    }

    async fn attach_email_children(
        &self,
        canonical: CanonicalDocument,
        document_bytes: &[u8],
        source_uri: &str,
        metadata: &HashMap<String, serde_json::Value>,
        depth: u32,
    ) -> Result<CanonicalDocument, WorkflowError> {
        if !canonical.attachments.is_empty() || depth > MAX_ATTACHMENT_DEPTH {
            return Ok(canonical);
        }

        let mime_type = metadata
            .get("mime_type")
            .and_then(serde_json::Value::as_str)
            .or(canonical.mime_type.as_deref())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !mime_type.starts_with("message/") {
            return Ok(canonical);
        }

        let Some(message) = mail_parser::MessageParser::default().parse(document_bytes) else {
            log::warn!("unable to parse email payload for attachments on {}", canonical.document_id);
            return Ok(canonical);
        };

        let mut attachments = Vec::new();
        for (index, attachment) in message.attachments().enumerate() {
            let payload = attachment.contents();
            if payload.is_empty() {
                continue;
            }

            let attachment_filename = attachment
                .attachment_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("attachment-{}", index + 1));
            let attachment_mime = attachment
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{subtype}", ct.ctype()),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let attachment_checksum = checksum_of(payload);
            let attachment_document_id = format!("{}::attachment-{}", canonical.document_id, index + 1);
            let attachment_source = format!("{source_uri}#attachment/{attachment_filename}");

            let mut attachment_metadata = HashMap::new();
            attachment_metadata.insert("mime_type".to_string(), serde_json::json!(attachment_mime));
            attachment_metadata.insert("parent_document_id".to_string(), serde_json::json!(canonical.document_id));
            attachment_metadata.insert("attachment_file_name".to_string(), serde_json::json!(attachment_filename));

            let analyze_result = self
                .service
                .analyze(payload, Some(&attachment_mime))
                .await
                .map_err(WorkflowError::VendorAnalysisFailed)?;

            let attachment_document = self.adapter.transform(
                &analyze_result,
                &attachment_document_id,
                &attachment_source,
                &attachment_checksum,
                &attachment_metadata,
            )?;

            let attachment_document = if attachment_mime.starts_with("message/") {
                Box::pin(self.attach_email_children(
                    attachment_document,
                    payload,
                    &attachment_source,
                    &attachment_metadata,
                    depth + 1,
                ))
                .await?
            } else {
                attachment_document
            };

            let mut size_metadata = HashMap::new();
            size_metadata.insert("size_bytes".to_string(), serde_json::json!(payload.len()));

            attachments.push(DocumentAttachment {
                attachment_id: (index + 1).to_string(),
                file_name: attachment_filename,
                mime_type: attachment_mime,
                checksum: Some(attachment_checksum),
                source_uri: Some(attachment_source),
                document: Some(Box::new(attachment_document)),
                metadata: size_metadata,
            });
        }

        if attachments.is_empty() {
            Ok(canonical)
        } else {
            Ok(canonical.with_additional_attachments(attachments))
        }
    }
}

fn checksum_of(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

fn now_utc() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
