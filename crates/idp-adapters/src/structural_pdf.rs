//! Adapter for structurally-parsed PDF payloads (text/layout extraction tools
//! that report page-by-page spans, tables and fields rather than a vendor
//! "analyze result" envelope).

use crate::base::{get_array, get_field, get_str, get_u32, normalise_confidence, AdapterError, ParserAdapter};
use idp_core::{
    BoundingRegion, CanonicalDocument, CanonicalTable, CanonicalTableCell, CanonicalTextSpan,
    ExtractionProvenance, PageSegment, StructuredField,
};
use serde_json::Value;
use std::collections::HashMap;

const PARSER: &str = "structural_pdf";

#[derive(Debug, Default)]
pub struct StructuralPdfAdapter;

impl ParserAdapter for StructuralPdfAdapter {
    fn transform(
        &self,
        payload: &Value,
        document_id: &str,
        source_uri: &str,
        checksum: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<CanonicalDocument, AdapterError> {
        let pages = get_array(payload, "pages");
        if pages.is_empty() {
            return Err(AdapterError::InvalidPayload(
                "structural PDF payload must contain at least one page".into(),
            ));
        }

        let mut page_segments = Vec::with_capacity(pages.len());
        let mut text_spans = Vec::new();
        let mut tables = Vec::new();

        for page in pages {
            let page_number = get_u32(page, "page_number", 1);
            let method = get_str(page, "method").unwrap_or("text").to_string();
            let mut segment_metadata = HashMap::new();
            if let Some(rotation) = get_field(page, "rotation") {
                segment_metadata.insert("rotation".to_string(), rotation.clone());
            }
            let confidence = match get_field(page, "confidence") {
                Some(v) if !v.is_null() => Some(normalise_confidence(Some(v))?),
                _ => None,
            };
            page_segments.push(PageSegment {
                page_number,
                parser: PARSER.to_string(),
                method: Some(method),
                confidence,
                metadata: segment_metadata,
            });

            text_spans.extend(parse_page_text(page, page_number)?);
            tables.extend(parse_page_tables(page, page_number)?);
        }

        let mut fields = parse_structured_fields(get_field(payload, "fields"), None)?;
        for page in pages {
            let page_number = get_u32(page, "page_number", 1);
            fields.extend(parse_structured_fields(get_field(page, "fields"), Some(page_number))?);
        }

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
            document_type: metadata.get("document_type").and_then(Value::as_str).map(String::from),
            mime_type: metadata.get("mime_type").and_then(Value::as_str).map(String::from),
            schema_version: idp_core::SCHEMA_VERSION.to_string(),
            metadata: metadata.clone(),
        })
    }
}

fn parse_page_text(page: &Value, page_number: u32) -> Result<Vec<CanonicalTextSpan>, AdapterError> {
    for key in ["text_spans", "spans", "text_blocks", "blocks", "lines"] {
        let items = get_array(page, key);
        if items.is_empty() {
            continue;
        }
        let mut spans = Vec::with_capacity(items.len());
        for item in items {
            let content = get_str(item, "content").or_else(|| get_str(item, "text")).unwrap_or_default();
            let confidence = normalise_confidence(get_field(item, "confidence"))?;
            let region = build_region(item, Some(page_number));
            spans.push(CanonicalTextSpan {
                content: content.to_string(),
                confidence,
                region,
                span_id: get_str(item, "id").map(String::from),
                provenance: Some(ExtractionProvenance::new(PARSER).with_page_span(vec![page_number])),
                confidence_signals: vec![],
            });
        }
        return Ok(spans);
    }

    if let Some(text) = get_str(page, "text") {
        let confidence = normalise_confidence(get_field(page, "confidence"))?;
        return Ok(vec![CanonicalTextSpan {
            content: text.to_string(),
            confidence,
            region: Some(BoundingRegion::new(page_number)),
            span_id: None,
            provenance: Some(ExtractionProvenance::new(PARSER).with_page_span(vec![page_number])),
            confidence_signals: vec![],
        }]);
    }

    Ok(vec![])
}

fn parse_page_tables(page: &Value, page_number: u32) -> Result<Vec<CanonicalTable>, AdapterError> {
    let mut tables = Vec::new();
    for (idx, table) in get_array(page, "tables").iter().enumerate() {
        let table_id = get_str(table, "id")
            .or_else(|| get_str(table, "table_id"))
            .map(String::from)
            .unwrap_or_else(|| format!("page-{page_number}-table-{idx}"));
        let confidence = normalise_confidence(get_field(table, "confidence"))?;
        let mut cells = Vec::new();
        for cell in get_array(table, "cells") {
            let region = build_region(cell, Some(page_number)).unwrap_or_else(|| BoundingRegion::new(page_number));
            let cell_confidence = normalise_confidence(get_field(cell, "confidence"))?;
            cells.push(CanonicalTableCell {
                row_index: get_u32(cell, "row_index", get_u32(cell, "row", 0)),
                column_index: get_u32(cell, "column_index", get_u32(cell, "column", 0)),
                content: get_str(cell, "content").or_else(|| get_str(cell, "text")).unwrap_or_default().to_string(),
                confidence: cell_confidence,
                region,
                row_span: row_span(cell),
                column_span: column_span(cell),
                provenance: Some(ExtractionProvenance::new(PARSER).with_page_span(vec![page_number])),
                confidence_signals: vec![],
            });
        }
        tables.push(CanonicalTable {
            table_id,
            confidence,
            cells,
            caption: get_str(table, "caption").map(String::from),
            footnotes: None,
            provenance: Some(ExtractionProvenance::new(PARSER).with_page_span(vec![page_number])),
        });
    }
    Ok(tables)
}

fn row_span(cell: &Value) -> u32 {
    get_field(cell, "row_span")
        .or_else(|| cell.get("rowSpan"))
        .and_then(Value::as_u64)
        .map_or(1, |v| v as u32)
}

fn column_span(cell: &Value) -> u32 {
    cell.get("column_span")
        .or_else(|| cell.get("col_span"))
        .or_else(|| cell.get("columnSpan"))
        .and_then(Value::as_u64)
        .map_or(1, |v| v as u32)
}

fn parse_structured_fields(
    fields_value: Option<&Value>,
    default_page: Option<u32>,
) -> Result<Vec<StructuredField>, AdapterError> {
    let mut fields = Vec::new();
    let Some(fields_value) = fields_value else {
        return Ok(fields);
    };

    let entries: Vec<(Option<String>, &Value)> = match fields_value {
        Value::Object(map) => map.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
        Value::Array(arr) => arr.iter().enumerate().map(|(i, v)| (get_str(v, "name").map(String::from).or(Some(i.to_string())), v)).collect(),
        _ => vec![],
    };

    for (name, field) in entries {
        let value = get_str(field, "value").or_else(|| get_str(field, "text")).map(String::from);
        let confidence = normalise_confidence(get_field(field, "confidence"))?;
        let value_type = get_str(field, "value_type").or_else(|| get_str(field, "type")).map(String::from);
        let region = build_region(field, default_page);
        fields.push(StructuredField {
            name: name.unwrap_or_default(),
            value,
            confidence,
            value_type,
            region,
            provenance: Some(ExtractionProvenance::new(PARSER)),
            confidence_signals: vec![],
        });
    }
    Ok(fields)
}

fn build_region(payload: &Value, default_page: Option<u32>) -> Option<BoundingRegion> {
    let page = get_u32(payload, "page", get_u32(payload, "page_number", get_u32(payload, "pageNumber", default_page.unwrap_or(1))));
    let mut region = BoundingRegion::new(page);
    if let Some(polygon) = crate::base::get_f64_list(payload, "polygon") {
        region = region.with_polygon(polygon);
    }
    if let Some(bbox) = crate::base::get_f64_list(payload, "bounding_box") {
        region = region.with_bounding_box(bbox);
    }
    Some(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requires_non_empty_pages() {
        let adapter = StructuralPdfAdapter;
        let err = adapter
            .transform(&json!({"pages": []}), "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidPayload(_)));
    }

    #[test]
    fn falls_back_through_text_collection_keys() {
        let adapter = StructuralPdfAdapter;
        let payload = json!({"pages": [{"page_number": 1, "blocks": [{"content": "hi", "confidence": 0.5}]}]});
        let doc = adapter.transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new()).unwrap();
        assert_eq!(doc.text_spans.len(), 1);
        assert_eq!(doc.text_spans[0].content, "hi");
    }

    #[test]
    fn falls_back_to_bare_page_text() {
        let adapter = StructuralPdfAdapter;
        let payload = json!({"pages": [{"page_number": 2, "text": "body", "confidence": 0.4}]});
        let doc = adapter.transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new()).unwrap();
        assert_eq!(doc.text_spans.len(), 1);
        assert_eq!(doc.text_spans[0].region.as_ref().unwrap().page, 2);
    }

    #[test]
    fn merges_global_and_per_page_fields() {
        let adapter = StructuralPdfAdapter;
        let payload = json!({
            "pages": [{"page_number": 1, "text": "x", "fields": {"local": {"value": "L"}}}],
            "fields": {"global": {"value": "G"}}
        });
        let doc = adapter.transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new()).unwrap();
        assert_eq!(doc.fields.len(), 2);
    }

    #[test]
    fn table_cell_spans_default_to_one() {
        let adapter = StructuralPdfAdapter;
        let payload = json!({
            "pages": [{"page_number": 1, "text": "x", "tables": [{"cells": [{"row_index": 0, "column_index": 0, "content": "c"}]}]}]
        });
        let doc = adapter.transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new()).unwrap();
        assert_eq!(doc.tables[0].cells[0].row_span, 1);
        assert_eq!(doc.tables[0].cells[0].column_span, 1);
    }
}
