//! Document summarisation: a model-backed summary when a [`SummaryModelClient`]
//! is configured, falling back to a deterministic leading-sentence heuristic.
//! No LLM client ships with this crate (per Non-goals); model summarisation is
//! a capability trait with a null-object default.

use async_trait::async_trait;
use idp_core::{CanonicalDocument, CanonicalTextSpan, DocumentSummary};
use std::collections::HashMap;

#[async_trait]
pub trait DocumentSummarizer: Send + Sync {
    async fn summarise(&self, document: &CanonicalDocument) -> Vec<DocumentSummary>;
}

/// Capability trait for an LLM-backed summariser (e.g. Azure OpenAI chat
/// completions). Returns `None` on any failure so the caller can fall back.
#[async_trait]
pub trait SummaryModelClient: Send + Sync {
    async fn summarise(&self, text: &str) -> Option<ModelSummary>;
}

pub struct ModelSummary {
    pub summary: String,
    pub title: Option<String>,
    pub confidence: f64,
    pub model: Option<String>,
    pub justification: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Null-object default: no model client wired, always declines.
#[derive(Debug, Default)]
pub struct NullSummaryModelClient;

#[async_trait]
impl SummaryModelClient for NullSummaryModelClient {
    async fn summarise(&self, _text: &str) -> Option<ModelSummary> {
        None
    }
}

const MAX_INPUT_CHARACTERS: usize = 6000;
const MAX_SUMMARY_CHARACTERS: usize = 512;

pub struct DefaultDocumentSummarizer {
    model_client: Box<dyn SummaryModelClient>,
}

impl DefaultDocumentSummarizer {
    #[must_use]
    pub fn new(model_client: Box<dyn SummaryModelClient>) -> Self {
        Self { model_client }
    }

    #[must_use]
    pub fn heuristic_only() -> Self {
        Self::new(Box::new(NullSummaryModelClient))
    }
}

#[async_trait]
impl DocumentSummarizer for DefaultDocumentSummarizer {
    async fn summarise(&self, document: &CanonicalDocument) -> Vec<DocumentSummary> {
        let text = normalised_text(&document.text_spans);
        if text.is_empty() {
            return Vec::new();
        }

        if let Some(model_summary) = self.model_client.summarise(&text).await {
            return vec![DocumentSummary {
                summary: model_summary.summary,
                confidence: model_summary.confidence,
                method: "model_backed".to_string(),
                title: model_summary.title,
                model: model_summary.model,
                justification: model_summary.justification,
                metadata: model_summary.metadata,
            }];
        }

        heuristic_summary(document, &text).into_iter().collect()
    }
}

fn normalised_text(spans: &[CanonicalTextSpan]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut contents = Vec::new();
    for span in spans {
        let content = span.content.trim();
        if content.is_empty() || !seen.insert(content.to_string()) {
            continue;
        }
        contents.push(content.to_string());
    }
    if contents.is_empty() {
        return String::new();
    }
    let joined = contents.join("\n");
    if joined.len() > MAX_INPUT_CHARACTERS {
        joined.chars().take(MAX_INPUT_CHARACTERS).collect()
    } else {
        joined
    }
}

fn heuristic_summary(document: &CanonicalDocument, text: &str) -> Option<DocumentSummary> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return None;
    }
    let mut summary_text = sentences.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
    if summary_text.len() > MAX_SUMMARY_CHARACTERS {
        let truncated: String = summary_text.chars().take(MAX_SUMMARY_CHARACTERS).collect();
        summary_text = match truncated.rsplit_once(' ') {
            Some((head, _)) => head.to_string(),
            None => truncated,
        };
    }

    Some(DocumentSummary {
        summary: summary_text,
        confidence: 0.3,
        method: "heuristic_leading_sentences".to_string(),
        title: infer_title(&document.text_spans),
        model: None,
        justification: Some("Generated via deterministic leading-sentence heuristic fallback.".to_string()),
        metadata: HashMap::new(),
    })
}

fn split_sentences(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?');
        let next_is_space = chars.get(i + 1).is_some_and(|n| n.is_whitespace());
        if at_boundary && (next_is_space || i + 1 == chars.len()) {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
        }
    }
    let trailing = current.trim().to_string();
    if !trailing.is_empty() {
        sentences.push(trailing);
    }
    if sentences.is_empty() {
        sentences.push(text.trim().to_string());
    }
    sentences
}

fn infer_title(spans: &[CanonicalTextSpan]) -> Option<String> {
    spans.iter().find_map(|span| {
        let content = span.content.trim();
        if content.is_empty() {
            return None;
        }
        if content.len() <= 120 && content.matches(' ').count() <= 15 {
            Some(content.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(content: &str) -> CanonicalTextSpan {
        CanonicalTextSpan {
            content: content.to_string(),
            confidence: 0.9,
            region: None,
            span_id: None,
            provenance: None,
            confidence_signals: vec![],
        }
    }

    fn document(spans: Vec<CanonicalTextSpan>) -> CanonicalDocument {
        CanonicalDocument {
            document_id: "doc-1".into(),
            source_uri: "s3://bucket/doc-1".into(),
            checksum: "abc".into(),
            text_spans: spans,
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
    async fn empty_document_yields_no_summary() {
        let summarizer = DefaultDocumentSummarizer::heuristic_only();
        let summaries = summarizer.summarise(&document(vec![])).await;
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_leading_sentences() {
        let summarizer = DefaultDocumentSummarizer::heuristic_only();
        let doc = document(vec![span("Invoice Summary"), span("Total due is $420. Payment is due in 30 days. Thanks.")]);
        let summaries = summarizer.summarise(&doc).await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].method, "heuristic_leading_sentences");
        assert_eq!(summaries[0].title.as_deref(), Some("Invoice Summary"));
    }

    struct FixedModelClient;
    #[async_trait]
    impl SummaryModelClient for FixedModelClient {
        async fn summarise(&self, _text: &str) -> Option<ModelSummary> {
            Some(ModelSummary {
                summary: "model summary".to_string(),
                title: Some("Title".to_string()),
                confidence: 0.9,
                model: Some("gpt".to_string()),
                justification: None,
                metadata: HashMap::new(),
            })
        }
    }

    #[tokio::test]
    async fn prefers_model_summary_when_available() {
        let summarizer = DefaultDocumentSummarizer::new(Box::new(FixedModelClient));
        let doc = document(vec![span("Some body text.")]);
        let summaries = summarizer.summarise(&doc).await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].method, "model_backed");
    }
}
