//! Adapter that fans out to a registry of named sub-adapters and merges their
//! canonical outputs, preserving the order sub-adapters appear in and recording
//! which parsers actually contributed via `metadata.parsers_used`.

use crate::base::{get_field, AdapterError, ParserAdapter};
use idp_core::{CanonicalDocument, DocumentAttachment};
use serde_json::Value;
use std::collections::HashMap;

pub struct EnsembleAdapter {
    adapters: HashMap<String, Box<dyn ParserAdapter>>,
}

impl EnsembleAdapter {
    /// # Errors
    /// Returns an error if `adapters` is empty; an ensemble with nothing to
    /// dispatch to cannot produce a canonical document.
    pub fn new(adapters: HashMap<String, Box<dyn ParserAdapter>>) -> Result<Self, AdapterError> {
        if adapters.is_empty() {
            return Err(AdapterError::InvalidPayload(
                "ensemble adapter requires at least one registered sub-adapter".into(),
            ));
        }
        Ok(Self { adapters })
    }
}

impl ParserAdapter for EnsembleAdapter {
    fn transform(
        &self,
        payload: &Value,
        document_id: &str,
        source_uri: &str,
        checksum: &str,
        metadata: &HashMap<String, Value>,
    ) -> Result<CanonicalDocument, AdapterError> {
        if payload.is_null() {
            return Err(AdapterError::InvalidPayload("ensemble payload is empty".into()));
        }
        if !payload.is_object() {
            return Err(AdapterError::InvalidPayload("ensemble payload must be a JSON object".into()));
        }

        let parser_entries = payload.get("parsers").and_then(Value::as_array);
        let Some(parser_entries) = parser_entries.filter(|entries| !entries.is_empty()) else {
            return Err(AdapterError::InvalidPayload(
                "ensemble payload must contain a non-empty 'parsers' list".into(),
            ));
        };

        let mut shared_metadata: HashMap<String, Value> = payload
            .get("document_metadata")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        for (k, v) in metadata {
            shared_metadata.insert(k.clone(), v.clone());
        }

        let mut document = CanonicalDocument {
            document_id: document_id.to_string(),
            source_uri: source_uri.to_string(),
            checksum: checksum.to_string(),
            text_spans: vec![],
            tables: vec![],
            fields: vec![],
            visual_descriptions: vec![],
            page_segments: vec![],
            attachments: vec![],
            summaries: vec![],
            enrichments: vec![],
            document_type: shared_metadata.get("document_type").and_then(Value::as_str).map(String::from),
            mime_type: shared_metadata.get("mime_type").and_then(Value::as_str).map(String::from),
            schema_version: idp_core::SCHEMA_VERSION.to_string(),
            metadata: HashMap::new(),
        };

        let mut parsers_used = Vec::new();

        for entry in parser_entries {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| AdapterError::InvalidPayload("each parser entry must include a 'name'".into()))?;
            let adapter = self
                .adapters
                .get(name)
                .ok_or_else(|| AdapterError::UnknownParser(name.to_string()))?;

            let entry_payload = entry.get("payload").cloned().unwrap_or(Value::Null);
            let mut sub_metadata = shared_metadata.clone();
            if let Some(entry_metadata) = entry.get("metadata").and_then(Value::as_object) {
                for (k, v) in entry_metadata {
                    sub_metadata.insert(k.clone(), v.clone());
                }
            }

            let canonical = adapter.transform(&entry_payload, document_id, source_uri, checksum, &sub_metadata)?;

            document.text_spans.extend(canonical.text_spans);
            document.tables.extend(canonical.tables);
            document.fields.extend(canonical.fields);
            document.visual_descriptions.extend(canonical.visual_descriptions);
            document.page_segments.extend(canonical.page_segments);
            document.attachments.extend(canonical.attachments);
            document.summaries.extend(canonical.summaries);

            if document.document_type.is_none() {
                document.document_type = canonical.document_type;
            }
            if document.mime_type.is_none() {
                document.mime_type = canonical.mime_type;
            }

            let provider = canonical.metadata.get("provider").and_then(Value::as_str).map(String::from);
            parsers_used.push(provider.unwrap_or_else(|| name.to_string()));
        }

        document.attachments.extend(parse_additional_attachments(get_field(payload, "attachments")));

        let mut metadata_payload = shared_metadata;
        metadata_payload.insert("provider".to_string(), Value::String("ensemble".to_string()));
        if !parsers_used.is_empty() {
            metadata_payload.insert(
                "parsers_used".to_string(),
                Value::Array(parsers_used.into_iter().map(Value::String).collect()),
            );
        }
        document.metadata = metadata_payload;

        Ok(document)
    }
}

fn parse_additional_attachments(attachments: Option<&Value>) -> Vec<DocumentAttachment> {
    let Some(attachments) = attachments.and_then(Value::as_array) else {
        return vec![];
    };
    let mut results = Vec::new();
    for attachment in attachments {
        let Some(attachment) = attachment.as_object() else {
            continue;
        };
        let attachment_id = attachment.get("attachment_id").or_else(|| attachment.get("id")).and_then(Value::as_str);
        let file_name = attachment.get("file_name").or_else(|| attachment.get("name")).and_then(Value::as_str);
        let mime_type = attachment
            .get("mime_type")
            .or_else(|| attachment.get("content_type"))
            .and_then(Value::as_str);
        let (Some(attachment_id), Some(file_name), Some(mime_type)) = (attachment_id, file_name, mime_type) else {
            continue;
        };

        let mut meta: HashMap<String, Value> = attachment
            .get("metadata")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let canonical_document = attachment
            .get("canonical_document")
            .and_then(|doc| serde_json::from_value::<CanonicalDocument>(doc.clone()).ok());
        if canonical_document.is_none() {
            if let Some(doc) = attachment.get("canonical_document") {
                meta.insert("canonical_document".to_string(), doc.clone());
            }
        }

        results.push(DocumentAttachment {
            attachment_id: attachment_id.to_string(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            checksum: attachment.get("checksum").and_then(Value::as_str).map(String::from),
            source_uri: attachment.get("source_uri").and_then(Value::as_str).map(String::from),
            document: canonical_document.map(Box::new),
            metadata: meta,
        });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structural_pdf::StructuralPdfAdapter;
    use serde_json::json;

    fn registry() -> HashMap<String, Box<dyn ParserAdapter>> {
        let mut map: HashMap<String, Box<dyn ParserAdapter>> = HashMap::new();
        map.insert("structural_pdf".to_string(), Box::new(StructuralPdfAdapter));
        map
    }

    #[test]
    fn rejects_empty_adapter_registry() {
        assert!(EnsembleAdapter::new(HashMap::new()).is_err());
    }

    #[test]
    fn requires_non_empty_parsers_list() {
        let ensemble = EnsembleAdapter::new(registry()).unwrap();
        let err = ensemble
            .transform(&json!({"parsers": []}), "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidPayload(_)));
    }

    #[test]
    fn errors_on_unknown_parser_name() {
        let ensemble = EnsembleAdapter::new(registry()).unwrap();
        let payload = json!({"parsers": [{"name": "nope", "payload": {}}]});
        let err = ensemble
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnknownParser(_)));
    }

    #[test]
    fn merges_sub_adapter_output_and_records_parsers_used() {
        let ensemble = EnsembleAdapter::new(registry()).unwrap();
        let payload = json!({
            "parsers": [{
                "name": "structural_pdf",
                "payload": {"pages": [{"page_number": 1, "text": "hi"}]}
            }]
        });
        let doc = ensemble
            .transform(&payload, "doc-1", "s3://b/k", "sum", &HashMap::new())
            .unwrap();
        assert_eq!(doc.text_spans.len(), 1);
        assert_eq!(
            doc.metadata.get("parsers_used"),
            Some(&json!(["structural_pdf"]))
        );
    }
}
