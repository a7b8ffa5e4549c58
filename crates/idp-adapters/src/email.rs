//! Adapter for pre-parsed email payloads (body text, headers, entities and
//! attachment descriptors already extracted by an upstream MIME walker).

use crate::base::{get_array, get_field, get_str, normalise_confidence, AdapterError, ParserAdapter};
use idp_core::{
    CanonicalDocument, CanonicalTextSpan, DocumentAttachment, ExtractionProvenance, PageSegment,
    StructuredField,
};
use serde_json::Value;
use std::collections::HashMap;

const PARSER: &str = "email_parser";

#[derive(Debug, Default)]
pub struct EmailParserAdapter;

impl ParserAdapter for EmailParserAdapter {
    fn transform(
        &self,
        payload: &Value,
        document_id: &str,
        source_uri: &str,
        checksum: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<CanonicalDocument, AdapterError> {
        let mut metadata_payload = metadata.clone();
        metadata_payload
            .entry("provider".to_string())
            .or_insert_with(|| Value::String(PARSER.to_string()));
        if let Some(obj) = get_field(payload, "metadata").and_then(Value::as_object) {
            for (k, v) in obj {
                metadata_payload.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        for key in ["subject", "from", "to", "cc", "bcc", "sent_at"] {
            if let Some(v) = get_field(payload, key) {
                metadata_payload.entry(key.to_string()).or_insert_with(|| v.clone());
            }
        }

        let text_spans = build_text_spans(payload)?;
        let fields = build_header_fields(payload)?;
        let attachments = build_attachments(payload, &mut metadata_payload);

        let document_type = metadata_payload
            .get("document_type")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| "email".to_string());
        let mime_type = metadata_payload
            .get("mime_type")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| "message/rfc822".to_string());

        Ok(CanonicalDocument {
            document_id: document_id.to_string(),
            source_uri: source_uri.to_string(),
            checksum: checksum.to_string(),
            text_spans,
            tables: vec![],
            fields,
            visual_descriptions: vec![],
            page_segments: vec![PageSegment {
                page_number: 1,
                parser: PARSER.to_string(),
                method: Some("message".to_string()),
                confidence: None,
                metadata: HashMap::new(),
            }],
            attachments,
            summaries: vec![],
            enrichments: vec![],
            document_type: Some(document_type),
            mime_type: Some(mime_type),
            schema_version: idp_core::SCHEMA_VERSION.to_string(),
            metadata: metadata_payload,
        })
    }
}

fn build_text_spans(payload: &Value) -> Result<Vec<CanonicalTextSpan>, AdapterError> {
    let mut spans = Vec::new();

    if let Some(body) = get_str(payload, "body_text").or_else(|| get_str(payload, "text")) {
        spans.push(CanonicalTextSpan {
            content: body.to_string(),
            confidence: 1.0,
            region: None,
            span_id: Some("body-text".to_string()),
            provenance: Some(ExtractionProvenance::new(PARSER).with_method("body_text")),
            confidence_signals: vec![],
        });
    }

    for (idx, item) in get_array(payload, "text_spans").iter().enumerate() {
        let content = get_str(item, "content").unwrap_or_default().to_string();
        let confidence = normalise_confidence(get_field(item, "confidence"))?;
        let method = get_str(item, "method").unwrap_or("body_segment").to_string();
        let span_id = get_str(item, "span_id")
            .or_else(|| get_str(item, "id"))
            .map(String::from)
            .unwrap_or_else(|| format!("email-span-{idx}"));
        spans.push(CanonicalTextSpan {
            content,
            confidence,
            region: None,
            span_id: Some(span_id),
            provenance: Some(ExtractionProvenance::new(PARSER).with_method(method)),
            confidence_signals: vec![],
        });
    }

    Ok(spans)
}

fn build_header_fields(payload: &Value) -> Result<Vec<StructuredField>, AdapterError> {
    let mut fields = Vec::new();

    if let Some(headers) = get_field(payload, "headers").and_then(Value::as_object) {
        for (name, value) in headers {
            fields.push(StructuredField {
                name: name.clone(),
                value: value.as_str().map(String::from).or_else(|| Some(value.to_string())),
                confidence: 1.0,
                value_type: Some("header".to_string()),
                region: None,
                provenance: Some(ExtractionProvenance::new(PARSER).with_method("header")),
                confidence_signals: vec![],
            });
        }
    }

    for (idx, entity) in get_array(payload, "entities").iter().enumerate() {
        let name = get_str(entity, "name")
            .or_else(|| get_str(entity, "label"))
            .map(String::from)
            .unwrap_or_else(|| format!("entity-{idx}"));
        let confidence = normalise_confidence(get_field(entity, "confidence"))?;
        fields.push(StructuredField {
            name,
            value: get_str(entity, "value").map(String::from),
            confidence,
            value_type: Some(get_str(entity, "type").unwrap_or("entity").to_string()),
            region: None,
            provenance: Some(ExtractionProvenance::new(PARSER).with_method("entity")),
            confidence_signals: vec![],
        });
    }

    Ok(fields)
}

fn build_attachments(payload: &Value, metadata_payload: &mut HashMap<String, Value>) -> Vec<DocumentAttachment> {
    let mut attachments = Vec::new();
    for item in get_array(payload, "attachments") {
        let Some(file_name) = get_str(item, "file_name") else {
            continue;
        };
        let Some(mime_type) = get_str(item, "mime_type") else {
            continue;
        };

        let mut attachment_metadata = HashMap::new();
        let canonical_document = get_field(item, "canonical_document").and_then(|doc| {
            serde_json::from_value::<CanonicalDocument>(doc.clone()).ok()
        });
        if canonical_document.is_none() {
            if let Some(doc) = get_field(item, "canonical_document") {
                attachment_metadata.insert("canonical_document".to_string(), doc.clone());
            }
        }

        attachments.push(DocumentAttachment {
            attachment_id: get_str(item, "attachment_id").map(String::from).unwrap_or_else(|| file_name.to_string()),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            checksum: get_str(item, "checksum").map(String::from),
            source_uri: get_str(item, "source_uri").map(String::from),
            document: canonical_document.map(Box::new),
            metadata: attachment_metadata,
        });
    }
    if attachments.is_empty() {
        metadata_payload.remove("has_attachments");
    }
    attachments
}
