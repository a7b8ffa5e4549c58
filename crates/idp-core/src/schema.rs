//! The canonical document schema: a provider-agnostic value-type tree that every
//! parser adapter normalises into and every downstream consumer reads from.
//!
//! Every type here is a plain, immutable value: construction happens once (usually
//! inside an adapter), after which nodes are only ever read or cloned, never mutated
//! in place. Optional fields that are `None` are omitted from the serialised JSON
//! rather than emitted as `null` — persisted records must not carry nulls for
//! unspecified optional fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema version stamped on every [`CanonicalDocument`].
pub const SCHEMA_VERSION: &str = "1.1";

/// A rectangular or polygonal region on a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<Vec<f64>>,
}

impl BoundingRegion {
    #[must_use]
    pub fn new(page: u32) -> Self {
        Self {
            page,
            polygon: None,
            bounding_box: None,
        }
    }

    #[must_use]
    pub fn with_polygon(mut self, polygon: Vec<f64>) -> Self {
        self.polygon = Some(polygon);
        self
    }

    #[must_use]
    pub fn with_bounding_box(mut self, bounding_box: Vec<f64>) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

/// One confidence reading contributed by an extraction source, kept alongside the
/// authoritative confidence on the parent node so multiple opinions can be audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSignal {
    pub source: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ConfidenceSignal {
    #[must_use]
    pub fn new(source: impl Into<String>, confidence: f64) -> Self {
        Self {
            source: source.into(),
            confidence,
            method: None,
            model: None,
            weight: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// Records which parser produced a node, by what method, and (for multi-page spans)
/// which pages it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionProvenance {
    pub parser: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_span: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExtractionProvenance {
    #[must_use]
    pub fn new(parser: impl Into<String>) -> Self {
        Self {
            parser: parser.into(),
            method: None,
            model: None,
            source: None,
            page_span: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_page_span(mut self, pages: Vec<u32>) -> Self {
        self.page_span = Some(pages);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTextSpan {
    pub content: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<BoundingRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ExtractionProvenance>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub confidence_signals: Vec<ConfidenceSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDescription {
    pub description: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<BoundingRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ExtractionProvenance>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub confidence_signals: Vec<ConfidenceSignal>,
}

/// A single table cell. Unlike spans and fields, a cell's region is required: a cell
/// with no known position on the page is not a meaningful table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTableCell {
    pub row_index: u32,
    pub column_index: u32,
    pub content: String,
    pub confidence: f64,
    pub region: BoundingRegion,
    #[serde(default = "one")]
    pub row_span: u32,
    #[serde(default = "one")]
    pub column_span: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ExtractionProvenance>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub confidence_signals: Vec<ConfidenceSignal>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    pub table_id: String,
    pub confidence: f64,
    #[serde(default)]
    pub cells: Vec<CanonicalTableCell>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footnotes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ExtractionProvenance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredField {
    pub name: String,
    pub value: Option<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<BoundingRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ExtractionProvenance>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub confidence_signals: Vec<ConfidenceSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSegment {
    pub page_number: u32,
    pub parser: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A recursive attachment: a file that traveled alongside the parent document
/// (an email attachment, an embedded object) which may itself have been parsed
/// into a child [`CanonicalDocument`]. The attachment tree is finite; callers are
/// responsible for bounding recursion depth when constructing one (see the
/// document workflow, which stops at depth 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAttachment {
    pub attachment_id: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Box<CanonicalDocument>>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub summary: String,
    pub confidence: f64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnrichment {
    pub enrichment_type: String,
    pub provider: String,
    pub content: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The root of the canonical schema tree. Immutable once constructed: every field
/// that a caller wants to change (attaching summaries, enrichments, attachments
/// after the fact) is produced via [`CanonicalDocument::with_*`] builders that
/// return a new value rather than mutating in place, mirroring the
/// copy-on-write update pattern of the source system's frozen models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDocument {
    pub document_id: String,
    pub source_uri: String,
    pub checksum: String,
    pub text_spans: Vec<CanonicalTextSpan>,
    pub tables: Vec<CanonicalTable>,
    pub fields: Vec<StructuredField>,
    #[serde(default)]
    pub visual_descriptions: Vec<VisualDescription>,
    #[serde(default)]
    pub page_segments: Vec<PageSegment>,
    #[serde(default)]
    pub attachments: Vec<DocumentAttachment>,
    #[serde(default)]
    pub summaries: Vec<DocumentSummary>,
    #[serde(default)]
    pub enrichments: Vec<DocumentEnrichment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default = "schema_version")]
    pub schema_version: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl CanonicalDocument {
    /// Returns a copy with `summaries` replaced by `self.summaries` plus `extra`.
    #[must_use]
    pub fn with_additional_summaries(mut self, extra: Vec<DocumentSummary>) -> Self {
        self.summaries.extend(extra);
        self
    }

    /// Returns a copy with `enrichments` replaced by `self.enrichments` plus `extra`.
    #[must_use]
    pub fn with_additional_enrichments(mut self, extra: Vec<DocumentEnrichment>) -> Self {
        self.enrichments.extend(extra);
        self
    }

    /// Returns a copy with `attachments` replaced by `self.attachments` plus `extra`.
    #[must_use]
    pub fn with_additional_attachments(mut self, extra: Vec<DocumentAttachment>) -> Self {
        self.attachments.extend(extra);
        self
    }

    /// The idempotency key this document is stored under: `(document_id, checksum)`.
    #[must_use]
    pub fn idempotency_key(&self) -> (&str, &str) {
        (&self.document_id, &self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> CanonicalDocument {
        CanonicalDocument {
            document_id: "doc-1".into(),
            source_uri: "s3://bucket/doc-1.pdf".into(),
            checksum: "abc123".into(),
            text_spans: vec![CanonicalTextSpan {
                content: "hello".into(),
                confidence: 0.9,
                region: None,
                span_id: Some("span-0".into()),
                provenance: None,
                confidence_signals: vec![],
            }],
            tables: vec![],
            fields: vec![],
            visual_descriptions: vec![],
            page_segments: vec![],
            attachments: vec![],
            summaries: vec![],
            enrichments: vec![],
            document_type: None,
            mime_type: Some("application/pdf".into()),
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn omits_null_optional_fields_on_serialise() {
        let doc = sample_document();
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("document_type").is_none());
        let span = &value["text_spans"][0];
        assert!(span.get("region").is_none());
        assert!(span.get("provenance").is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let doc = sample_document();
        let serialised = serde_json::to_string(&doc).unwrap();
        let restored: CanonicalDocument = serde_json::from_str(&serialised).unwrap();
        assert_eq!(doc, restored);
    }

    #[test]
    fn stamps_schema_version_by_default() {
        let value = serde_json::json!({
            "document_id": "doc-2",
            "source_uri": "s3://bucket/doc-2.pdf",
            "checksum": "def456",
            "text_spans": [],
            "tables": [],
            "fields": []
        });
        let doc: CanonicalDocument = serde_json::from_value(value).unwrap();
        assert_eq!(doc.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn idempotency_key_pairs_id_and_checksum() {
        let doc = sample_document();
        assert_eq!(doc.idempotency_key(), ("doc-1", "abc123"));
    }

    #[test]
    fn with_additional_summaries_appends_without_losing_existing() {
        let doc = sample_document().with_additional_summaries(vec![DocumentSummary {
            summary: "s".into(),
            confidence: 0.3,
            method: "heuristic_leading_sentences".into(),
            title: None,
            model: None,
            justification: None,
            metadata: HashMap::new(),
        }]);
        assert_eq!(doc.summaries.len(), 1);
    }
}
