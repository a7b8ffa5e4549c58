//! Adapter for Azure-style Document Intelligence `analyzeResult` payloads.

use crate::base::{get_array, get_field, get_str, get_u32, normalise_confidence, AdapterError, ParserAdapter};
use idp_core::{
    BoundingRegion, CanonicalDocument, CanonicalTable, CanonicalTableCell, CanonicalTextSpan,
    ConfidenceSignal, ExtractionProvenance, PageSegment, StructuredField,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const PARSER: &str = "azure_document_intelligence";

#[derive(Debug, Default)]
pub struct AzureDocumentIntelligenceAdapter;

impl ParserAdapter for AzureDocumentIntelligenceAdapter {
    fn transform(
        &self,
        payload: &Value,
        document_id: &str,
        source_uri: &str,
        checksum: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<CanonicalDocument, AdapterError> {
        let analyze_result = extract_analyze_result(payload)?;

        let text_spans = parse_text_spans(analyze_result)?;
        let tables = parse_tables(analyze_result)?;
        let fields = parse_fields(analyze_result)?;
        let mut page_segments = build_page_segments(analyze_result)?;

        if page_segments.is_empty() {
            let mut pages: Vec<u32> = text_spans
                .iter()
                .filter_map(|s| s.region.as_ref().map(|r| r.page))
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            pages.sort_unstable();
            page_segments = if pages.is_empty() {
                vec![PageSegment {
                    page_number: 1,
                    parser: PARSER.to_string(),
                    method: Some("analysis".to_string()),
                    confidence: None,
                    metadata: HashMap::new(),
                }]
            } else {
                pages
                    .into_iter()
                    .map(|page_number| PageSegment {
                        page_number,
                        parser: PARSER.to_string(),
                        method: Some("inferred".to_string()),
                        confidence: None,
                        metadata: HashMap::new(),
                    })
                    .collect()
            };
        }

        let mut metadata_payload = metadata.clone();
        metadata_payload
            .entry("provider".to_string())
            .or_insert_with(|| Value::String(PARSER.to_string()));
        let document_type = metadata_payload.get("document_type").and_then(Value::as_str).map(String::from);
        let mime_type = metadata_payload
            .get("mime_type")
            .or_else(|| metadata_payload.get("content_type"))
            .and_then(Value::as_str)
            .map(String::from);

        Ok(CanonicalDocument {
            document_id: document_id.to_string(),
            source_uri: source_uri.to_string(),
            checksum: checksum.to_string(),
            text_spans,
            tables,
            fields,
            visual_descriptions: vec![],
            page_segments,
            attachments: vec![],
            summaries: vec![],
            enrichments: vec![],
            document_type,
            mime_type,
            schema_version: idp_core::SCHEMA_VERSION.to_string(),
            metadata: metadata_payload,
        })
    }
}

fn extract_analyze_result(payload: &Value) -> Result<&Value, AdapterError> {
    if payload.is_null() {
        return Err(AdapterError::InvalidPayload(
            "Azure Document Intelligence payload is empty".into(),
        ));
    }
    if let Some(inner) = payload.get("analyzeResult").or_else(|| payload.get("analyze_result")) {
        return Ok(inner);
    }
    Ok(payload)
}

fn first_region(obj: &Value, default_page: Option<u32>) -> Option<BoundingRegion> {
    let regions = get_array(obj, "bounding_regions");
    let region_payload = regions
        .first()
        .or_else(|| get_array(obj, "regions").first());

    let Some(region_payload) = region_payload else {
        return default_page.map(BoundingRegion::new);
    };
    let page = get_u32(region_payload, "page_number", default_page.unwrap_or(1));
    let mut region = BoundingRegion::new(page);
    if let Some(polygon) = crate::base::get_f64_list(region_payload, "polygon") {
        region = region.with_polygon(polygon);
    }
    if let Some(bbox) = crate::base::get_f64_list(region_payload, "bounding_box") {
        region = region.with_bounding_box(bbox);
    }
    Some(region)
}

fn parse_text_spans(analyze_result: &Value) -> Result<Vec<CanonicalTextSpan>, AdapterError> {
    let paragraphs = get_array(analyze_result, "paragraphs");
    let mut spans = Vec::new();

    for (idx, paragraph) in paragraphs.iter().enumerate() {
        let Some(content) = get_str(paragraph, "content") else {
            continue;
        };
        if content.is_empty() {
            continue;
        }
        let region = first_region(paragraph, None);
        let confidence = normalise_confidence(get_field(paragraph, "confidence"))?;
        let span_id = get_str(paragraph, "id").map(String::from).unwrap_or_else(|| idx.to_string());
        let provenance = ExtractionProvenance::new(PARSER)
            .with_method("paragraph")
            .with_page_span(region.as_ref().map(|r| vec![r.page]).unwrap_or_default());
        spans.push(CanonicalTextSpan {
            content: content.to_string(),
            confidence,
            region,
            span_id: Some(span_id),
            provenance: Some(provenance),
            confidence_signals: vec![ConfidenceSignal::new(PARSER, confidence).with_method("paragraph")],
        });
    }

    if !paragraphs.is_empty() {
        return Ok(spans);
    }

    for page in get_array(analyze_result, "pages") {
        let page_number = get_u32(page, "page_number", 1);
        for (idx, line) in get_array(page, "lines").iter().enumerate() {
            let Some(content) = get_str(line, "content") else {
                continue;
            };
            if content.is_empty() {
                continue;
            }
            let region = first_region(line, Some(page_number));
            let confidence = normalise_confidence(get_field(line, "confidence"))?;
            let span_id = get_str(line, "id")
                .map(String::from)
                .unwrap_or_else(|| format!("page-{page_number}-line-{idx}"));
            let provenance = ExtractionProvenance::new(PARSER)
                .with_method("line")
                .with_page_span(vec![region.as_ref().map_or(page_number, |r| r.page)]);
            spans.push(CanonicalTextSpan {
                content: content.to_string(),
                confidence,
                region,
                span_id: Some(span_id),
                provenance: Some(provenance),
                confidence_signals: vec![ConfidenceSignal::new(PARSER, confidence).with_method("line")],
            });
        }
    }

    Ok(spans)
}

fn parse_tables(analyze_result: &Value) -> Result<Vec<CanonicalTable>, AdapterError> {
    let mut tables = Vec::new();
    for (table_idx, table) in get_array(analyze_result, "tables").iter().enumerate() {
        let confidence = normalise_confidence(get_field(table, "confidence"))?;
        let mut cells = Vec::new();
        for cell in get_array(table, "cells") {
            let region = first_region(cell, None).unwrap_or_else(|| BoundingRegion::new(1));
            let cell_confidence = normalise_confidence(get_field(cell, "confidence"))?;
            let provenance = ExtractionProvenance::new(PARSER)
                .with_method("table_cell")
                .with_page_span(vec![region.page]);
            cells.push(CanonicalTableCell {
                row_index: get_u32(cell, "row_index", 0),
                column_index: get_u32(cell, "column_index", 0),
                content: get_str(cell, "content").unwrap_or_default().to_string(),
                confidence: cell_confidence,
                region,
                row_span: get_u32(cell, "row_span", 1),
                column_span: get_u32(cell, "column_span", 1),
                provenance: Some(provenance),
                confidence_signals: vec![ConfidenceSignal::new(PARSER, cell_confidence).with_method("table_cell")],
            });
        }

        let table_id = get_str(table, "id")
            .map(String::from)
            .unwrap_or_else(|| format!("table-{table_idx}"));
        let caption = get_str(table, "caption").map(String::from);
        let footnotes = get_field(table, "footnotes").and_then(Value::as_array).map(|arr| {
            arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()
        });

        tables.push(CanonicalTable {
            table_id,
            confidence,
            cells,
            caption,
            footnotes,
            provenance: Some(ExtractionProvenance::new(PARSER).with_method("table")),
        });
    }
    Ok(tables)
}

fn parse_fields(analyze_result: &Value) -> Result<Vec<StructuredField>, AdapterError> {
    let mut fields = Vec::new();
    for document in get_array(analyze_result, "documents") {
        let Some(field_map) = get_field(document, "fields").and_then(Value::as_object) else {
            continue;
        };
        for (name, field) in field_map {
            if field.is_null() {
                continue;
            }
            let value = get_field(field, "value").or_else(|| get_field(field, "content"));
            let value_type = get_str(field, "type")
                .or_else(|| get_str(field, "value_type"))
                .map(String::from);
            let confidence = normalise_confidence(get_field(field, "confidence"))?;
            // Fields are the one node type where a missing region is legitimate.
            let region = first_region(field, None).filter(|_| field.get("bounding_regions").is_some() || field.get("regions").is_some());
            let provenance = ExtractionProvenance::new(PARSER)
                .with_method("field")
                .with_page_span(region.as_ref().map(|r| vec![r.page]).unwrap_or_default());
            let model = get_str(field, "model_id").map(String::from);
            fields.push(StructuredField {
                name: name.clone(),
                value: value.and_then(value_to_string),
                confidence,
                value_type,
                region,
                provenance: Some(provenance),
                confidence_signals: vec![ConfidenceSignal {
                    model,
                    ..ConfidenceSignal::new(PARSER, confidence).with_method("field")
                }],
            });
        }
    }
    Ok(fields)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn build_page_segments(analyze_result: &Value) -> Result<Vec<PageSegment>, AdapterError> {
    let mut segments = Vec::new();
    for page in get_array(analyze_result, "pages") {
        let page_number = get_u32(page, "page_number", 1);
        let confidence = match get_field(page, "confidence") {
            Some(v) if !v.is_null() => Some(normalise_confidence(Some(v))?),
            _ => None,
        };
        segments.push(PageSegment {
            page_number,
            parser: PARSER.to_string(),
            method: Some("layout".to_string()),
            confidence,
            metadata: HashMap::new(),
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_paragraphs_over_lines() {
        let adapter = AzureDocumentIntelligenceAdapter;
        let payload = json!({
            "paragraphs": [{"content": "Hello", "confidence": 0.9}],
            "pages": [{"pageNumber": 1, "lines": [{"content": "ignored"}]}]
        });
        let doc = adapter
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap();
        assert_eq!(doc.text_spans.len(), 1);
        assert_eq!(doc.text_spans[0].content, "Hello");
    }

    #[test]
    fn falls_back_to_lines_when_no_paragraphs() {
        let adapter = AzureDocumentIntelligenceAdapter;
        let payload = json!({
            "pages": [{"pageNumber": 2, "lines": [{"content": "line text"}]}]
        });
        let doc = adapter
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap();
        assert_eq!(doc.text_spans.len(), 1);
        assert_eq!(doc.text_spans[0].region.as_ref().unwrap().page, 2);
    }

    #[test]
    fn fields_may_omit_region_unlike_spans_and_tables() {
        let adapter = AzureDocumentIntelligenceAdapter;
        let payload = json!({
            "documents": [{"fields": {"invoice_total": {"value": "100.00", "confidence": 0.8}}}]
        });
        let doc = adapter
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap();
        assert_eq!(doc.fields.len(), 1);
        assert!(doc.fields[0].region.is_none());
        assert_eq!(doc.fields[0].value.as_deref(), Some("100.00"));
    }

    #[test]
    fn infers_page_segments_from_span_regions_when_pages_absent() {
        let adapter = AzureDocumentIntelligenceAdapter;
        let payload = json!({
            "paragraphs": [{"content": "A", "boundingRegions": [{"pageNumber": 3}]}]
        });
        let doc = adapter
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap();
        assert_eq!(doc.page_segments.len(), 1);
        assert_eq!(doc.page_segments[0].page_number, 3);
        assert_eq!(doc.page_segments[0].method.as_deref(), Some("inferred"));
    }

    #[test]
    fn unwraps_analyze_result_envelope() {
        let adapter = AzureDocumentIntelligenceAdapter;
        let payload = json!({"analyzeResult": {"paragraphs": [{"content": "wrapped"}]}});
        let doc = adapter
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap();
        assert_eq!(doc.text_spans[0].content, "wrapped");
    }
}
