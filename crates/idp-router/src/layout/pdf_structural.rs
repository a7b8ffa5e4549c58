//! Structural PDF layout analysis: per-page text/image area ratios, table
//! region counts, and form-widget (checkbox/radio) counts.
//!
//! No PDF engine is embedded in this crate (per Non-goals: "actually parsing
//! PDFs" is out of scope). The analyser is fully implemented against a
//! [`PdfStructuralSource`] capability trait so a real engine (pdfium, MuPDF
//! bindings, ...) can be wired in later without touching router logic.

use crate::layout::{build_profile, LayoutAnalyser};
use crate::model::{DocumentDescriptor, DocumentProfile, PageMetrics};
use async_trait::async_trait;

/// One page's raw structural measurements, in the units a PDF engine reports
/// them: areas in the page's own coordinate space, not yet normalised to a
/// `[0, 1]` density.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageStructure {
    pub page_area: f64,
    pub text_area: f64,
    pub image_area: f64,
    pub table_area: f64,
    pub char_count: u32,
    pub table_count: u32,
    pub image_count: u32,
    pub checkbox_count: u32,
    pub radio_button_count: u32,
}

/// Capability trait representing "a PDF engine is available". Implementations
/// open `content` and return one [`PdfPageStructure`] per page; `None` means
/// the content could not be opened (the analyser falls back to heuristics).
#[async_trait]
pub trait PdfStructuralSource: Send + Sync {
    async fn structure(&self, content: &[u8]) -> Option<Vec<PdfPageStructure>>;
}

/// Null-object default: no PDF engine is wired. Always reports "could not open".
#[derive(Debug, Default)]
pub struct NullPdfStructuralSource;

#[async_trait]
impl PdfStructuralSource for NullPdfStructuralSource {
    async fn structure(&self, _content: &[u8]) -> Option<Vec<PdfPageStructure>> {
        None
    }
}

const PDF_MIME_TYPES: [&str; 3] = ["application/pdf", "application/x-pdf", "application/acrobat"];

pub struct PdfStructuralLayoutAnalyser {
    source: Box<dyn PdfStructuralSource>,
    fallback: Box<dyn LayoutAnalyser>,
}

impl PdfStructuralLayoutAnalyser {
    #[must_use]
    pub fn new(source: Box<dyn PdfStructuralSource>, fallback: Box<dyn LayoutAnalyser>) -> Self {
        Self { source, fallback }
    }
}

#[async_trait]
impl LayoutAnalyser for PdfStructuralLayoutAnalyser {
    async fn analyse(&self, descriptor: &DocumentDescriptor, content: Option<&[u8]>) -> DocumentProfile {
        let Some(content) = content else {
            return self.fallback.analyse(descriptor, content).await;
        };

        let mime = descriptor.mime_type.to_ascii_lowercase();
        let key = descriptor.object_key.to_ascii_lowercase();
        let looks_like_pdf = PDF_MIME_TYPES.contains(&mime.as_str()) || key.ends_with(".pdf");
        if !looks_like_pdf {
            return self.fallback.analyse(descriptor, Some(content)).await;
        }

        match self.source.structure(content).await {
            Some(pages) if !pages.is_empty() => {
                let metrics = pages
                    .into_iter()
                    .enumerate()
                    .map(|(idx, page)| page_metrics_from_structure(idx as u32, page))
                    .collect();
                build_profile(descriptor, metrics)
            }
            _ => {
                log::warn!(
                    "PDF structural source unavailable or empty for {}; falling back to heuristic layout",
                    descriptor.object_key
                );
                self.fallback.analyse(descriptor, Some(content)).await
            }
        }
    }
}

fn page_metrics_from_structure(index: u32, page: PdfPageStructure) -> PageMetrics {
    let area = page.page_area.max(1.0);
    let mut metrics = PageMetrics::new(
        index,
        page.text_area / area,
        page.image_area / area,
        page.table_area / area,
    );
    metrics.char_count = Some(page.char_count);
    metrics.table_count = page.table_count;
    metrics.image_count = page.image_count;
    metrics.checkbox_count = page.checkbox_count;
    metrics.radio_button_count = page.radio_button_count;
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::HeuristicLayoutAnalyser;
    use serde_json::json;

    fn descriptor(mime: &str, key: &str) -> DocumentDescriptor {
        DocumentDescriptor {
            object_key: key.into(),
            bucket: None,
            body: json!({}),
            mime_type: mime.into(),
            request_override: None,
        }
    }

    #[tokio::test]
    async fn falls_back_when_no_content_resolved() {
        let analyser = PdfStructuralLayoutAnalyser::new(Box::new(NullPdfStructuralSource), Box::new(HeuristicLayoutAnalyser));
        let profile = analyser.analyse(&descriptor("application/pdf", "a.pdf"), None).await;
        assert_eq!(profile.page_count, 1);
    }

    #[tokio::test]
    async fn falls_back_when_source_cannot_open_document() {
        let analyser = PdfStructuralLayoutAnalyser::new(Box::new(NullPdfStructuralSource), Box::new(HeuristicLayoutAnalyser));
        let profile = analyser.analyse(&descriptor("application/pdf", "a.pdf"), Some(b"not a pdf")).await;
        assert_eq!(profile.page_count, 1);
    }

    #[tokio::test]
    async fn non_pdf_mime_skips_straight_to_fallback() {
        let analyser = PdfStructuralLayoutAnalyser::new(Box::new(NullPdfStructuralSource), Box::new(HeuristicLayoutAnalyser));
        let profile = analyser.analyse(&descriptor("text/plain", "a.txt"), Some(b"hello")).await;
        assert_eq!(profile.page_count, 1);
    }

    struct FixedSource(Vec<PdfPageStructure>);
    #[async_trait]
    impl PdfStructuralSource for FixedSource {
        async fn structure(&self, _content: &[u8]) -> Option<Vec<PdfPageStructure>> {
            Some(self.0.clone())
        }
    }

    #[tokio::test]
    async fn uses_structural_source_when_available() {
        let page = PdfPageStructure {
            page_area: 100.0,
            text_area: 80.0,
            image_area: 0.0,
            table_area: 0.0,
            char_count: 500,
            table_count: 0,
            image_count: 0,
            checkbox_count: 0,
            radio_button_count: 0,
        };
        let analyser = PdfStructuralLayoutAnalyser::new(Box::new(FixedSource(vec![page])), Box::new(HeuristicLayoutAnalyser));
        let profile = analyser.analyse(&descriptor("application/pdf", "a.pdf"), Some(b"%PDF-1.7")).await;
        assert_eq!(profile.page_count, 1);
        assert!((profile.average_text_density - 0.8).abs() < 1e-9);
    }
}
