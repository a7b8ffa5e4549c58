//! Structural layout analysis for email messages: walks the MIME tree and
//! derives one "page" per body part, counting HTML form controls and tables
//! where present.

use crate::layout::{build_profile, LayoutAnalyser};
use crate::model::{DocumentDescriptor, DocumentProfile, PageMetrics};
use async_trait::async_trait;
use scraper::{Html, Selector};

#[derive(Debug, Default)]
pub struct EmailStructuralLayoutAnalyser;

#[async_trait]
impl LayoutAnalyser for EmailStructuralLayoutAnalyser {
    async fn analyse(&self, descriptor: &DocumentDescriptor, content: Option<&[u8]>) -> DocumentProfile {
        let Some(content) = content else {
            return build_profile(descriptor, vec![single_page_fallback(&[])]);
        };

        match mail_parser::MessageParser::default().parse(content) {
            Some(message) => {
                let pages = pages_from_message(&message);
                if pages.is_empty() {
                    build_profile(descriptor, vec![single_page_fallback(content)])
                } else {
                    build_profile(descriptor, pages)
                }
            }
            None => build_profile(descriptor, vec![single_page_fallback(content)]),
        }
    }
}

fn pages_from_message(message: &mail_parser::Message<'_>) -> Vec<PageMetrics> {
    let mut pages = Vec::new();
    let mut index = 0u32;

    for i in 0..message.html_body_count() {
        if let Some(html) = message.html_body(i) {
            pages.push(metrics_from_html(index, html.as_ref()));
            index += 1;
        }
    }
    for i in 0..message.text_body_count() {
        if let Some(text) = message.text_body(i) {
            pages.push(metrics_from_plain_text(index, text.as_ref()));
            index += 1;
        }
    }

    pages
}

/// Mirrors `_EmailHTMLMetricsParser`: counts `<table>`, `<img>`, and
/// `<input type=checkbox|radio>` tags, then derives densities.
fn metrics_from_html(index: u32, html: &str) -> PageMetrics {
    let document = Html::parse_fragment(html);
    let char_count = document.root_element().text().map(str::len).sum::<usize>() as u32;

    let table_selector = Selector::parse("table").unwrap();
    let img_selector = Selector::parse("img").unwrap();
    let input_selector = Selector::parse("input").unwrap();

    let table_count = document.select(&table_selector).count() as u32;
    let image_count = document.select(&img_selector).count() as u32;

    let mut checkbox_count = 0u32;
    let mut radio_button_count = 0u32;
    for input in document.select(&input_selector) {
        match input.value().attr("type").map(str::to_ascii_lowercase) {
            Some(ref t) if t == "checkbox" => checkbox_count += 1,
            Some(ref t) if t == "radio" => radio_button_count += 1,
            _ => {}
        }
    }

    let text_density = (char_count as f64 / 4000.0).min(1.0);
    let image_density = (image_count as f64 * 0.1).min(1.0);
    let table_density = (table_count as f64 * 0.25).min(1.0);

    let mut metrics = PageMetrics::new(index, text_density, image_density, table_density);
    metrics.char_count = Some(char_count);
    metrics.table_count = table_count;
    metrics.image_count = image_count;
    metrics.checkbox_count = checkbox_count;
    metrics.radio_button_count = radio_button_count;
    metrics
}

fn metrics_from_plain_text(index: u32, text: &str) -> PageMetrics {
    let char_count = text.len() as u32;
    let text_density = (char_count as f64 / 3000.0).min(1.0);
    let mut metrics = PageMetrics::new(index, text_density, 0.05, 0.0);
    metrics.char_count = Some(char_count);
    metrics
}

fn single_page_fallback(content: &[u8]) -> PageMetrics {
    let text = String::from_utf8_lossy(content);
    metrics_from_plain_text(0, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> DocumentDescriptor {
        DocumentDescriptor {
            object_key: "a.eml".into(),
            bucket: None,
            body: json!({}),
            mime_type: "message/rfc822".into(),
            request_override: None,
        }
    }

    #[tokio::test]
    async fn html_body_counts_tables_images_and_inputs() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "To: b@example.com\r\n",
            "Subject: hi\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<html><body><table></table><img src=x><input type=checkbox></body></html>",
        );
        let profile = EmailStructuralLayoutAnalyser.analyse(&descriptor(), Some(raw.as_bytes())).await;
        assert_eq!(profile.page_count, 1);
        assert_eq!(profile.total_tables, 1);
        assert!(profile.checkbox_page_ratio > 0.0);
    }

    #[tokio::test]
    async fn plain_text_body_uses_char_count_density() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "To: b@example.com\r\n",
            "Subject: hi\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "hello world",
        );
        let profile = EmailStructuralLayoutAnalyser.analyse(&descriptor(), Some(raw.as_bytes())).await;
        assert_eq!(profile.page_count, 1);
        assert!((profile.average_image_density - 0.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn falls_back_to_single_page_when_no_content() {
        let profile = EmailStructuralLayoutAnalyser.analyse(&descriptor(), None).await;
        assert_eq!(profile.page_count, 1);
    }

    #[tokio::test]
    async fn falls_back_to_single_page_when_unparseable() {
        let profile = EmailStructuralLayoutAnalyser.analyse(&descriptor(), Some(b"not an email at all")).await;
        assert_eq!(profile.page_count, 1);
    }
}
