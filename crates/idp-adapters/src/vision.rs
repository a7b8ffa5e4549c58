//! Adapter for vision/LLM-described image payloads: a flat list of text spans,
//! fields and visual descriptions keyed by loose `page`/`polygon`/`bounding_box`
//! hints rather than a page-structured envelope.

use crate::base::{get_array, get_field, get_str, get_u32, normalise_confidence, AdapterError, ParserAdapter};
use idp_core::{
    BoundingRegion, CanonicalDocument, CanonicalTextSpan, ExtractionProvenance, PageSegment,
    StructuredField, VisualDescription,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const PARSER: &str = "vision_llm";

#[derive(Debug, Default)]
pub struct VisionAdapter;

impl ParserAdapter for VisionAdapter {
    fn transform(
        &self,
        payload: &Value,
        document_id: &str,
        source_uri: &str,
        checksum: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<CanonicalDocument, AdapterError> {
        let payload = coerce_payload(payload)?;

        let text_spans = parse_text(payload)?;
        let fields = parse_fields(payload)?;
        let visual_descriptions = parse_visuals(payload)?;
        let page_segments = derive_page_segments(payload, &text_spans);

        let document_type = metadata.get("document_type").and_then(Value::as_str).map(String::from).or(Some("image".to_string()));
        let mime_type = metadata
            .get("mime_type")
            .or_else(|| metadata.get("content_type"))
            .and_then(Value::as_str)
            .map(String::from)
            .or(Some("image".to_string()));

        Ok(CanonicalDocument {
            document_id: document_id.to_string(),
            source_uri: source_uri.to_string(),
            checksum: checksum.to_string(),
            text_spans,
            tables: vec![],
            fields,
            visual_descriptions,
            page_segments,
            attachments: vec![],
            summaries: vec![],
            enrichments: vec![],
            document_type,
            mime_type,
            schema_version: idp_core::SCHEMA_VERSION.to_string(),
            metadata: metadata.clone(),
        })
    }
}

fn coerce_payload(payload: &Value) -> Result<&Value, AdapterError> {
    if payload.is_string() {
        return Err(AdapterError::InvalidPayload(
            "vision adapter requires a JSON object payload, not a raw string".into(),
        ));
    }
    if !payload.is_object() {
        return Err(AdapterError::InvalidPayload("vision adapter payload must be a JSON object".into()));
    }
    Ok(payload)
}

fn parse_text(payload: &Value) -> Result<Vec<CanonicalTextSpan>, AdapterError> {
    let items = get_array(payload, "text_spans");
    let mut spans = Vec::with_capacity(items.len());
    for item in items {
        let content = get_str(item, "content").unwrap_or_default().to_string();
        let confidence = normalise_confidence(get_field(item, "confidence"))?;
        spans.push(CanonicalTextSpan {
            content,
            confidence,
            region: build_region(item),
            span_id: get_str(item, "id").map(String::from),
            provenance: Some(ExtractionProvenance::new(PARSER)),
            confidence_signals: vec![],
        });
    }
    Ok(spans)
}

fn parse_fields(payload: &Value) -> Result<Vec<StructuredField>, AdapterError> {
    let mut fields = Vec::new();
    for item in get_array(payload, "fields") {
        let confidence = normalise_confidence(get_field(item, "confidence"))?;
        fields.push(StructuredField {
            name: get_str(item, "name").unwrap_or_default().to_string(),
            value: get_str(item, "value").map(String::from),
            confidence,
            value_type: get_str(item, "value_type").map(String::from),
            region: build_region(item),
            provenance: Some(ExtractionProvenance::new(PARSER)),
            confidence_signals: vec![],
        });
    }
    Ok(fields)
}

fn parse_visuals(payload: &Value) -> Result<Vec<VisualDescription>, AdapterError> {
    let items = get_array(payload, "visual_descriptions");
    if !items.is_empty() {
        let mut visuals = Vec::with_capacity(items.len());
        for item in items {
            let confidence = normalise_confidence(get_field(item, "confidence"))?;
            visuals.push(VisualDescription {
                description: get_str(item, "description").unwrap_or_default().to_string(),
                confidence,
                region: build_region(item),
                tags: get_field(item, "tags")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()),
                provenance: Some(ExtractionProvenance::new(PARSER)),
                confidence_signals: vec![],
            });
        }
        return Ok(visuals);
    }

    if let Some(description) = get_str(payload, "overall_description").or_else(|| get_str(payload, "summary")) {
        return Ok(vec![VisualDescription {
            description: description.to_string(),
            confidence: 1.0,
            region: None,
            tags: None,
            provenance: Some(ExtractionProvenance::new(PARSER)),
            confidence_signals: vec![],
        }]);
    }

    Ok(vec![])
}

fn build_region(payload: &Value) -> Option<BoundingRegion> {
    let has_page = get_field(payload, "page").is_some();
    let has_polygon = get_field(payload, "polygon").is_some();
    let has_bbox = get_field(payload, "bounding_box").is_some();
    if !has_page && !has_polygon && !has_bbox {
        return None;
    }
    let page = get_u32(payload, "page", 1);
    let mut region = BoundingRegion::new(page);
    if let Some(polygon) = crate::base::get_f64_list(payload, "polygon") {
        region = region.with_polygon(polygon);
    }
    if let Some(bbox) = crate::base::get_f64_list(payload, "bounding_box") {
        region = region.with_bounding_box(bbox);
    }
    Some(region)
}

fn derive_page_segments(payload: &Value, text_spans: &[CanonicalTextSpan]) -> Vec<PageSegment> {
    let mut pages: Vec<u32> = text_spans
        .iter()
        .filter_map(|s| s.region.as_ref().map(|r| r.page))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    pages.sort_unstable();

    if pages.is_empty() {
        let page_number = get_u32(payload, "page", 1);
        return vec![PageSegment {
            page_number,
            parser: PARSER.to_string(),
            method: Some("image".to_string()),
            confidence: None,
            metadata: HashMap::new(),
        }];
    }

    pages
        .into_iter()
        .map(|page_number| PageSegment {
            page_number,
            parser: PARSER.to_string(),
            method: Some("image".to_string()),
            confidence: None,
            metadata: HashMap::new(),
        })
        .collect()
}
