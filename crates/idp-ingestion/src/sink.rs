//! Metadata persistence: Delta-table-style append-only writes, represented
//! as a trait so a real lakehouse sink can be wired in without touching the
//! ingestion loop.

use async_trait::async_trait;
use idp_router::DocumentAnalysis;
use std::sync::Mutex;

/// One base metadata row, matching the reference job's per-message record,
/// plus the analysis projection used to answer routing questions without a
/// join against the routing table.
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    pub source_path: Option<String>,
    pub file_type: Option<String>,
    pub message_id: String,
    pub sns_topic: Option<String>,
    pub queue_url: String,
    pub mime_type: String,
    pub page_count: u32,
    pub average_text_density: f64,
    pub average_image_density: f64,
    pub table_page_ratio: f64,
    pub scanned_page_ratio: f64,
    pub checkbox_page_ratio: f64,
    pub radio_button_page_ratio: f64,
    pub form_page_ratio: f64,
    pub total_tables: u32,
    pub total_checkboxes: u32,
    pub total_radio_buttons: u32,
    pub category: String,
    pub strategy_name: String,
    pub strategy_reason: String,
    pub strategy_model: Option<String>,
    pub strategy_max_pages: Option<u32>,
    pub overrides_applied: String,
    pub request_override: Option<String>,
    pub page_metrics: String,
}

impl MetadataRecord {
    /// Projects the base queue fields plus the full analysis onto one row.
    #[must_use]
    pub fn from_analysis(
        source_path: Option<String>,
        message_id: String,
        sns_topic: Option<String>,
        queue_url: String,
        analysis: &DocumentAnalysis,
    ) -> Self {
        Self {
            source_path,
            file_type: Some(analysis.mime_type.clone()),
            message_id,
            sns_topic,
            queue_url,
            mime_type: analysis.mime_type.clone(),
            page_count: analysis.page_count,
            average_text_density: analysis.average_text_density,
            average_image_density: analysis.average_image_density,
            table_page_ratio: analysis.table_page_ratio,
            scanned_page_ratio: analysis.scanned_page_ratio,
            checkbox_page_ratio: analysis.checkbox_page_ratio,
            radio_button_page_ratio: analysis.radio_button_page_ratio,
            form_page_ratio: analysis.form_page_ratio,
            total_tables: analysis.total_tables,
            total_checkboxes: analysis.total_checkboxes,
            total_radio_buttons: analysis.total_radio_buttons,
            category: serde_json::to_value(analysis.category)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default(),
            strategy_name: analysis.strategy.name.clone(),
            strategy_reason: analysis.strategy.reason.clone(),
            strategy_model: analysis.strategy.model.clone(),
            strategy_max_pages: analysis.strategy.max_pages,
            overrides_applied: analysis.overrides_applied.join(","),
            request_override: analysis.request_override.clone(),
            page_metrics: serde_json::to_string(&analysis.pages).unwrap_or_default(),
        }
    }
}

/// One routing-table row: the source path plus the full analysis.
#[derive(Debug, Clone)]
pub struct RoutingRecord {
    pub source_path: String,
    pub analysis: DocumentAnalysis,
}

#[async_trait]
pub trait MetadataSink: Send + Sync {
    async fn append_metadata(&self, records: Vec<MetadataRecord>) -> Result<(), String>;
    async fn append_routing(&self, records: Vec<RoutingRecord>) -> Result<(), String>;
}

#[derive(Default)]
pub struct InMemoryMetadataSink {
    metadata: Mutex<Vec<MetadataRecord>>,
    routing: Mutex<Vec<RoutingRecord>>,
}

impl InMemoryMetadataSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_records(&self) -> Vec<MetadataRecord> {
        self.metadata.lock().unwrap().clone()
    }

    pub fn routing_records(&self) -> Vec<RoutingRecord> {
        self.routing.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataSink for InMemoryMetadataSink {
    async fn append_metadata(&self, records: Vec<MetadataRecord>) -> Result<(), String> {
        if records.is_empty() {
            return Ok(());
        }
        self.metadata.lock().unwrap().extend(records);
        Ok(())
    }

    async fn append_routing(&self, records: Vec<RoutingRecord>) -> Result<(), String> {
        if records.is_empty() {
            return Ok(());
        }
        self.routing.lock().unwrap().extend(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batches_are_a_no_op() {
        let sink = InMemoryMetadataSink::new();
        sink.append_metadata(vec![]).await.unwrap();
        assert!(sink.metadata_records().is_empty());
    }

    #[tokio::test]
    async fn appends_accumulate_across_calls() {
        let sink = InMemoryMetadataSink::new();
        let record = MetadataRecord::from_analysis(Some("a.pdf".into()), "m1".into(), None, "q".into(), &sample_analysis());
        sink.append_metadata(vec![record.clone()]).await.unwrap();
        sink.append_metadata(vec![record]).await.unwrap();
        assert_eq!(sink.metadata_records().len(), 2);
    }

    #[tokio::test]
    async fn from_analysis_projects_strategy_and_joins_overrides() {
        let record = MetadataRecord::from_analysis(Some("a.pdf".into()), "m1".into(), None, "q".into(), &sample_analysis());
        assert_eq!(record.strategy_name, "azure_di");
        assert_eq!(record.strategy_reason, "category_default");
        assert_eq!(record.overrides_applied, "category_default");
        assert_eq!(record.category, "long_form");
    }

    fn sample_analysis() -> DocumentAnalysis {
        use idp_router::{DocumentCategory, ParserStrategy};

        DocumentAnalysis {
            object_key: "a.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            page_count: 42,
            category: DocumentCategory::LongForm,
            strategy: ParserStrategy {
                name: "azure_di".to_string(),
                reason: "category_default".to_string(),
                model: None,
                max_pages: None,
            },
            overrides_applied: vec!["category_default".to_string()],
            request_override: None,
            average_text_density: 0.4,
            average_image_density: 0.1,
            table_page_ratio: 0.0,
            scanned_page_ratio: 0.0,
            checkbox_page_ratio: 0.0,
            radio_button_page_ratio: 0.0,
            form_page_ratio: 0.0,
            total_tables: 0,
            total_checkboxes: 0,
            total_radio_buttons: 0,
            pages: vec![],
            raw_metadata: serde_json::Value::Null,
        }
    }
}
