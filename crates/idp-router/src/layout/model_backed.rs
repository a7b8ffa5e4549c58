//! Model-backed layout analysis: delegates to a remote layout model over
//! HTTP, falling back to a wrapped analyser on any failure or empty response.

use crate::layout::LayoutAnalyser;
use crate::model::{DocumentDescriptor, DocumentProfile, PageMetrics};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;

/// Capability trait for a remote layout model. Implementations should return
/// `Err` only for transport/protocol failures; an empty `Ok(vec![])` means
/// the model had nothing to say and the caller falls back.
#[async_trait]
pub trait LayoutModelClient: Send + Sync {
    async fn infer_layout(
        &self,
        descriptor: &DocumentDescriptor,
        content: Option<&[u8]>,
    ) -> Result<Vec<PageMetrics>, String>;
}

/// Null-object default: no layout model is wired. Always reports failure so
/// callers fall straight to a heuristic analyser.
#[derive(Debug, Default)]
pub struct NullLayoutModelClient;

#[async_trait]
impl LayoutModelClient for NullLayoutModelClient {
    async fn infer_layout(
        &self,
        _descriptor: &DocumentDescriptor,
        _content: Option<&[u8]>,
    ) -> Result<Vec<PageMetrics>, String> {
        Err("no layout model client configured".to_string())
    }
}

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Production [`LayoutModelClient`] posting the document descriptor (and,
/// optionally, its content) to a configured HTTP endpoint.
pub struct ReqwestLayoutModelClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model_type: Option<String>,
}

impl ReqwestLayoutModelClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            api_key: None,
            model_type: None,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = Some(model_type.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| self.client.clone());
        self
    }
}

#[async_trait]
impl LayoutModelClient for ReqwestLayoutModelClient {
    async fn infer_layout(
        &self,
        descriptor: &DocumentDescriptor,
        content: Option<&[u8]>,
    ) -> Result<Vec<PageMetrics>, String> {
        let mut payload = json!({
            "object_key": descriptor.object_key,
            "bucket": descriptor.bucket,
            "mime_type": descriptor.mime_type,
            "metadata": descriptor.body.get("documentMetadata").cloned().unwrap_or(Value::Null),
        });
        if let Some(model_type) = &self.model_type {
            payload["model_type"] = json!(model_type);
        }
        if let Some(bytes) = content {
            payload["document"] = json!(base64::engine::general_purpose::STANDARD.encode(bytes));
        }

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("layout model returned status {}", response.status()));
        }
        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        parse_pages(&body)
    }
}

fn parse_pages(body: &Value) -> Result<Vec<PageMetrics>, String> {
    let pages = body
        .get("pages")
        .and_then(Value::as_array)
        .ok_or_else(|| "layout model response missing `pages`".to_string())?;

    let mut metrics = Vec::with_capacity(pages.len());
    for (idx, page) in pages.iter().enumerate() {
        let text_density = page.get("text_density").and_then(Value::as_f64).unwrap_or(0.0);
        let image_density = page.get("image_density").and_then(Value::as_f64).unwrap_or(0.0);
        let table_density = page.get("table_density").and_then(Value::as_f64).unwrap_or(0.0);
        let mut m = PageMetrics::new(idx as u32, text_density, image_density, table_density);
        m.table_count = page.get("table_count").and_then(Value::as_u64).unwrap_or(0) as u32;
        m.image_count = page.get("image_count").and_then(Value::as_u64).unwrap_or(0) as u32;
        m.checkbox_count = page.get("checkbox_count").and_then(Value::as_u64).unwrap_or(0) as u32;
        m.radio_button_count = page.get("radio_button_count").and_then(Value::as_u64).unwrap_or(0) as u32;
        metrics.push(m);
    }
    Ok(metrics)
}

/// Tries the configured [`LayoutModelClient`] first; on any error or an empty
/// page list, logs and falls back to a wrapped analyser (matching the
/// reference behaviour of never letting a model outage break routing).
pub struct ModelBackedLayoutAnalyser {
    client: Box<dyn LayoutModelClient>,
    fallback: Box<dyn LayoutAnalyser>,
}

impl ModelBackedLayoutAnalyser {
    #[must_use]
    pub fn new(client: Box<dyn LayoutModelClient>, fallback: Box<dyn LayoutAnalyser>) -> Self {
        Self { client, fallback }
    }
}

#[async_trait]
impl LayoutAnalyser for ModelBackedLayoutAnalyser {
    async fn analyse(&self, descriptor: &DocumentDescriptor, content: Option<&[u8]>) -> DocumentProfile {
        match self.client.infer_layout(descriptor, content).await {
            Ok(pages) if !pages.is_empty() => crate::layout::build_profile(descriptor, pages),
            Ok(_) => {
                log::warn!("layout model returned no pages for {}; falling back", descriptor.object_key);
                self.fallback.analyse(descriptor, content).await
            }
            Err(err) => {
                log::error!("layout model request failed for {}: {err}", descriptor.object_key);
                self.fallback.analyse(descriptor, content).await
            }
        }
    }
}
