//! Builds a [`DocumentProfile`] from embedded `documentMetadata.layout` hints,
//! falling back to an inferred page count with flat default densities. Never
//! fails; always produces at least one page.

use crate::layout::{build_profile, infer_page_count, LayoutAnalyser};
use crate::model::{DocumentDescriptor, DocumentProfile, PageMetrics};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct HeuristicLayoutAnalyser;

#[async_trait]
impl LayoutAnalyser for HeuristicLayoutAnalyser {
    async fn analyse(&self, descriptor: &DocumentDescriptor, _content: Option<&[u8]>) -> DocumentProfile {
        let metadata = descriptor.body.get("documentMetadata");
        let layout = metadata.and_then(|m| m.get("layout"));

        let mut pages = Vec::new();
        if let Some(pages_payload) = layout.and_then(|l| l.get("pages")).and_then(Value::as_array) {
            for (idx, page) in pages_payload.iter().enumerate() {
                pages.push(page_metrics_from_payload(idx as u32, page));
            }
        }

        if pages.is_empty() {
            let inferred = infer_page_count(&descriptor.body).unwrap_or(0).max(1);
            let text_density = safe_float(layout.and_then(|l| l.get("textDensity")), 0.5);
            let image_density = safe_float(layout.and_then(|l| l.get("imageDensity")), 1.0 - text_density);
            let table_density = safe_float(layout.and_then(|l| l.get("tableDensity")), 0.0);
            for idx in 0..inferred {
                pages.push(PageMetrics::new(idx, text_density, image_density, table_density));
            }
        }

        build_profile(descriptor, pages)
    }
}

fn safe_float(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(default)
}

/// Builds one [`PageMetrics`] from a per-page payload, tolerating snake_case
/// and camelCase field names.
pub(crate) fn page_metrics_from_payload(idx: u32, payload: &Value) -> PageMetrics {
    let text_density = payload
        .get("text_density")
        .or_else(|| payload.get("textDensity"))
        .and_then(Value::as_f64)
        .unwrap_or(0.5);
    let image_density = payload
        .get("image_density")
        .or_else(|| payload.get("imageDensity"))
        .and_then(Value::as_f64)
        .unwrap_or(1.0 - text_density);
    let table_density = payload
        .get("table_density")
        .or_else(|| payload.get("tableDensity"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut metrics = PageMetrics::new(
        payload.get("index").and_then(Value::as_u64).map_or(idx, |v| v as u32),
        text_density,
        image_density,
        table_density,
    );
    metrics.char_count = payload
        .get("char_count")
        .or_else(|| payload.get("charCount"))
        .and_then(Value::as_u64)
        .map(|v| v as u32);
    metrics.table_count = count_field(payload, "table_count", "tableCount");
    metrics.image_count = count_field(payload, "image_count", "imageCount");
    metrics.checkbox_count = count_field(payload, "checkbox_count", "checkboxCount");
    metrics.radio_button_count = count_field(payload, "radio_button_count", "radioButtonCount");
    metrics
}

fn count_field(payload: &Value, snake: &str, camel: &str) -> u32 {
    payload
        .get(snake)
        .or_else(|| payload.get(camel))
        .and_then(Value::as_u64)
        .map_or(0, |v| v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn uses_per_page_layout_when_present() {
        let descriptor = DocumentDescriptor {
            object_key: "a.pdf".into(),
            bucket: None,
            body: json!({"documentMetadata": {"layout": {"pages": [{"textDensity": 0.9}]}}}),
            mime_type: "application/pdf".into(),
            request_override: None,
        };
        let profile = HeuristicLayoutAnalyser.analyse(&descriptor, None).await;
        assert_eq!(profile.page_count, 1);
        assert!((profile.average_text_density - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn falls_back_to_inferred_page_count_with_flat_densities() {
        let descriptor = DocumentDescriptor {
            object_key: "a.pdf".into(),
            bucket: None,
            body: json!({"documentMetadata": {"pageCount": 3}}),
            mime_type: "application/pdf".into(),
            request_override: None,
        };
        let profile = HeuristicLayoutAnalyser.analyse(&descriptor, None).await;
        assert_eq!(profile.page_count, 3);
        assert_eq!(profile.average_text_density, 0.5);
    }

    #[tokio::test]
    async fn never_produces_zero_pages() {
        let descriptor = DocumentDescriptor {
            object_key: "a.pdf".into(),
            bucket: None,
            body: json!({}),
            mime_type: "application/pdf".into(),
            request_override: None,
        };
        let profile = HeuristicLayoutAnalyser.analyse(&descriptor, None).await;
        assert_eq!(profile.page_count, 1);
    }
}
