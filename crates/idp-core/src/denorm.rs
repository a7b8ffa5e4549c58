//! Flattens a [`CanonicalDocument`] tree into row-shaped records for tabular sinks.
//!
//! This is a pure function of its inputs: no I/O, no clock access beyond the
//! `generated_at` timestamp the caller supplies. It never attempts to reconstruct
//! a [`CanonicalDocument`] from records; the flattening is one-directional.

use crate::schema::CanonicalDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of canonical-schema node a [`DenormRecord`] was flattened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenormRecordType {
    TextSpan,
    TableCell,
    Field,
    VisualDescription,
    Summary,
    Enrichment,
}

/// One flattened row. `content` carries the record's primary text/value payload;
/// `parent_id` links table cells back to their owning table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenormRecord {
    pub document_id: String,
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    pub record_type: DenormRecordType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Flattens every text span, table cell, field, visual description, summary and
/// enrichment on `document` into one [`DenormRecord`] per leaf fact.
#[must_use]
pub fn canonical_to_denorm_records(
    document: &CanonicalDocument,
    request_id: &str,
    generated_at: DateTime<Utc>,
) -> Vec<DenormRecord> {
    let mut records = Vec::new();

    for span in &document.text_spans {
        records.push(DenormRecord {
            document_id: document.document_id.clone(),
            request_id: request_id.to_string(),
            generated_at,
            record_type: DenormRecordType::TextSpan,
            parent_id: None,
            record_id: span.span_id.clone(),
            content: span.content.clone(),
            confidence: Some(span.confidence),
            page: span.region.as_ref().map(|r| r.page),
            parser: span.provenance.as_ref().map(|p| p.parser.clone()),
            metadata: HashMap::new(),
        });
    }

    for table in &document.tables {
        for cell in &table.cells {
            records.push(DenormRecord {
                document_id: document.document_id.clone(),
                request_id: request_id.to_string(),
                generated_at,
                record_type: DenormRecordType::TableCell,
                parent_id: Some(table.table_id.clone()),
                record_id: Some(format!("{}:{}:{}", table.table_id, cell.row_index, cell.column_index)),
                content: cell.content.clone(),
                confidence: Some(cell.confidence),
                page: Some(cell.region.page),
                parser: cell.provenance.as_ref().map(|p| p.parser.clone()),
                metadata: HashMap::new(),
            });
        }
    }

    for field in &document.fields {
        records.push(DenormRecord {
            document_id: document.document_id.clone(),
            request_id: request_id.to_string(),
            generated_at,
            record_type: DenormRecordType::Field,
            parent_id: None,
            record_id: Some(field.name.clone()),
            content: field.value.clone().unwrap_or_default(),
            confidence: Some(field.confidence),
            page: field.region.as_ref().map(|r| r.page),
            parser: field.provenance.as_ref().map(|p| p.parser.clone()),
            metadata: HashMap::new(),
        });
    }

    for visual in &document.visual_descriptions {
        records.push(DenormRecord {
            document_id: document.document_id.clone(),
            request_id: request_id.to_string(),
            generated_at,
            record_type: DenormRecordType::VisualDescription,
            parent_id: None,
            record_id: None,
            content: visual.description.clone(),
            confidence: Some(visual.confidence),
            page: visual.region.as_ref().map(|r| r.page),
            parser: visual.provenance.as_ref().map(|p| p.parser.clone()),
            metadata: HashMap::new(),
        });
    }

    for summary in &document.summaries {
        records.push(DenormRecord {
            document_id: document.document_id.clone(),
            request_id: request_id.to_string(),
            generated_at,
            record_type: DenormRecordType::Summary,
            parent_id: None,
            record_id: None,
            content: summary.summary.clone(),
            confidence: Some(summary.confidence),
            page: None,
            parser: Some(summary.method.clone()),
            metadata: HashMap::new(),
        });
    }

    for enrichment in &document.enrichments {
        records.push(DenormRecord {
            document_id: document.document_id.clone(),
            request_id: request_id.to_string(),
            generated_at,
            record_type: DenormRecordType::Enrichment,
            parent_id: None,
            record_id: Some(enrichment.enrichment_type.clone()),
            content: serde_json::to_string(&enrichment.content).unwrap_or_default(),
            confidence: enrichment.confidence,
            page: None,
            parser: Some(enrichment.provider.clone()),
            metadata: HashMap::new(),
        });
    }

    records
}
