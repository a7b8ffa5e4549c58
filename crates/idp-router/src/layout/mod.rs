//! Layout analysers: each builds a [`crate::model::DocumentProfile`] from a
//! document descriptor, optionally given resolved content. Every variant is
//! infallible from the router's perspective — failures fall back rather than
//! propagating.

pub mod email_structural;
pub mod heuristic;
pub mod model_backed;
pub mod pdf_structural;

use crate::model::{DocumentDescriptor, DocumentProfile, PageMetrics};
use async_trait::async_trait;

pub use email_structural::EmailStructuralLayoutAnalyser;
pub use heuristic::HeuristicLayoutAnalyser;
pub use model_backed::{LayoutModelClient, ModelBackedLayoutAnalyser, NullLayoutModelClient, ReqwestLayoutModelClient};
pub use pdf_structural::{NullPdfStructuralSource, PdfStructuralLayoutAnalyser, PdfStructuralSource};

#[async_trait]
pub trait LayoutAnalyser: Send + Sync {
    async fn analyse(&self, descriptor: &DocumentDescriptor, content: Option<&[u8]>) -> DocumentProfile;
}

/// Aggregates per-page metrics into a [`DocumentProfile`]. Used by every
/// analyser variant so the aggregation math lives in exactly one place.
#[must_use]
pub fn build_profile(descriptor: &DocumentDescriptor, pages: Vec<PageMetrics>) -> DocumentProfile {
    let page_count = if pages.is_empty() {
        infer_page_count(&descriptor.body).unwrap_or(0)
    } else {
        pages.len() as u32
    };

    let mean = |values: &[f64]| -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    let text_densities: Vec<f64> = pages.iter().map(|p| p.text_density).collect();
    let image_densities: Vec<f64> = pages.iter().map(|p| p.image_density).collect();

    let ratio = |predicate: &dyn Fn(&PageMetrics) -> bool| -> f64 {
        if pages.is_empty() {
            0.0
        } else {
            pages.iter().filter(|p| predicate(p)).count() as f64 / pages.len() as f64
        }
    };

    DocumentProfile {
        object_key: descriptor.object_key.clone(),
        bucket: descriptor.bucket.clone(),
        mime_type: descriptor.mime_type.clone(),
        page_count,
        average_text_density: mean(&text_densities),
        average_image_density: mean(&image_densities),
        table_page_ratio: ratio(&|p| p.table_density >= 0.5 || p.table_count > 0),
        scanned_page_ratio: ratio(&|p| p.image_density >= 0.6 || p.image_count > 2),
        checkbox_page_ratio: ratio(&|p| p.checkbox_count > 0),
        radio_button_page_ratio: ratio(&|p| p.radio_button_count > 0),
        form_page_ratio: ratio(&|p| p.checkbox_count > 0 || p.radio_button_count > 0),
        total_tables: pages.iter().map(|p| p.table_count).sum(),
        total_checkboxes: pages.iter().map(|p| p.checkbox_count).sum(),
        total_radio_buttons: pages.iter().map(|p| p.radio_button_count).sum(),
        pages,
    }
}

/// Infers a page count from `documentMetadata.pageCount`, the layout page
/// list length, or a top-level `page_count`/`pageCount` field, in that order.
#[must_use]
pub fn infer_page_count(body: &serde_json::Value) -> Option<u32> {
    let metadata = body.get("documentMetadata")?;
    if let Some(count) = metadata.get("pageCount").and_then(serde_json::Value::as_u64) {
        return Some(count as u32);
    }
    if let Some(pages) = metadata.get("layout").and_then(|l| l.get("pages")).and_then(serde_json::Value::as_array) {
        return Some(pages.len() as u32);
    }
    if let Some(count) = body
        .get("page_count")
        .or_else(|| body.get("pageCount"))
        .and_then(serde_json::Value::as_u64)
    {
        return Some(count as u32);
    }
    None
}
