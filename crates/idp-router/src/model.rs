//! Value types shared across the router: page metrics, document profiles,
//! strategy configuration, overrides, and the router's own configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Whether the router always uses a fixed strategy or layers in categorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Static,
    Hybrid,
}

/// High-level categorisation used to route documents to parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    ShortForm,
    LongForm,
    Scanned,
    TableHeavy,
    FormHeavy,
    Unknown,
}

/// Declarative configuration for a parser strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
}

impl StrategyConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            max_pages: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Builds a strategy config from a loosely-typed JSON object, defaulting
    /// the parser name to `"general"` when absent.
    #[must_use]
    pub fn from_value(payload: &Value) -> Self {
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("general")
            .to_string();
        let model = payload.get("model").and_then(Value::as_str).map(String::from);
        let max_pages = payload.get("max_pages").and_then(Value::as_u64).map(|v| v as u32);
        Self { name, model, max_pages }
    }
}

/// An override applied when its regex matches the object key.
#[derive(Debug, Clone)]
pub struct PatternOverride {
    pub pattern: regex::Regex,
    pub strategy: StrategyConfig,
}

/// Ordered collection of overrides loaded fresh each ingestion cycle. First match wins.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    pub pattern_overrides: Vec<PatternOverride>,
}

/// The selected parsing strategy for a document, with the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserStrategy {
    pub name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
}

/// Summary of layout metrics for a single page. Densities are clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub index: u32,
    pub text_density: f64,
    pub image_density: f64,
    pub table_density: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<u32>,
    pub table_count: u32,
    pub image_count: u32,
    pub checkbox_count: u32,
    pub radio_button_count: u32,
}

impl PageMetrics {
    #[must_use]
    pub fn new(index: u32, text_density: f64, image_density: f64, table_density: f64) -> Self {
        Self {
            index,
            text_density: text_density.clamp(0.0, 1.0),
            image_density: image_density.clamp(0.0, 1.0),
            table_density: table_density.clamp(0.0, 1.0),
            char_count: None,
            table_count: 0,
            image_count: 0,
            checkbox_count: 0,
            radio_button_count: 0,
        }
    }
}

/// Aggregated profile of a document derived from its page metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub object_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub mime_type: String,
    pub page_count: u32,
    pub pages: Vec<PageMetrics>,
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
}

/// Raw inputs used for a single routing decision.
#[derive(Debug, Clone)]
pub struct DocumentDescriptor {
    pub object_key: String,
    pub bucket: Option<String>,
    pub body: Value,
    pub mime_type: String,
    pub request_override: Option<String>,
}

impl DocumentDescriptor {
    #[must_use]
    pub fn source_uri(&self) -> Option<String> {
        match &self.bucket {
            Some(bucket) if !bucket.is_empty() && !self.object_key.is_empty() => {
                Some(format!("s3://{bucket}/{}", self.object_key))
            }
            _ => None,
        }
    }
}

/// Router output: the strategy decision plus the full profile it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub object_key: String,
    pub mime_type: String,
    pub page_count: u32,
    pub category: DocumentCategory,
    pub strategy: ParserStrategy,
    pub overrides_applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_override: Option<String>,
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
    pub pages: Vec<PageMetrics>,
    pub raw_metadata: Value,
}

/// Configuration for the [`crate::router::DocumentRouter`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub mode: RoutingMode,
    pub request_override_flag: String,
    pub default_strategy_map: HashMap<DocumentCategory, StrategyConfig>,
    pub fallback_strategy: StrategyConfig,
    pub static_strategy: Option<StrategyConfig>,
    pub scanned_page_ratio_threshold: f64,
    pub table_page_ratio_threshold: f64,
    pub form_page_ratio_threshold: f64,
    pub short_form_min_text_density: f64,
    pub long_form_threshold: u32,
    pub short_form_threshold: u32,
    pub short_form_max_pages: Option<u32>,
    pub long_form_max_pages: Option<u32>,
    pub table_heavy_max_pages: Option<u32>,
    pub form_max_pages: Option<u32>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let fallback_strategy = StrategyConfig::new("fallback_non_azure");
        let mut default_strategy_map = HashMap::new();
        default_strategy_map.insert(DocumentCategory::Unknown, fallback_strategy.clone());

        Self {
            mode: RoutingMode::Hybrid,
            request_override_flag: "parser_override".to_string(),
            default_strategy_map,
            fallback_strategy,
            static_strategy: None,
            scanned_page_ratio_threshold: 0.5,
            table_page_ratio_threshold: 0.3,
            form_page_ratio_threshold: 0.25,
            short_form_min_text_density: 0.55,
            long_form_threshold: 100,
            short_form_threshold: 15,
            short_form_max_pages: None,
            long_form_max_pages: None,
            table_heavy_max_pages: None,
            form_max_pages: None,
        }
    }
}

impl RouterConfig {
    /// Loads configuration from the environment, mirroring the reference
    /// `RouterConfig.__post_init__` normalisation: `ROUTING_MODE` selects
    /// static vs. hybrid, `CATEGORY_THRESHOLDS` and `DEFAULT_STRATEGY_MAP`
    /// are JSON objects, and the `unknown` category always falls back to
    /// `fallback_strategy` when `DEFAULT_STRATEGY_MAP` omits it.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("ROUTING_MODE") {
            config.mode = match raw.as_str() {
                "static" => RoutingMode::Static,
                "hybrid" => RoutingMode::Hybrid,
                other => return Err(format!("ROUTING_MODE must be `static` or `hybrid`, got: {other}")),
            };
        }

        if let Ok(raw) = std::env::var("REQUEST_OVERRIDE_FLAG") {
            if !raw.is_empty() {
                config.request_override_flag = raw;
            }
        }

        if let Ok(raw) = std::env::var("STATIC_ROUTING_STRATEGY") {
            let value: Value = serde_json::from_str(&raw).map_err(|err| format!("STATIC_ROUTING_STRATEGY is not valid JSON: {err}"))?;
            config.static_strategy = Some(StrategyConfig::from_value(&value));
        }

        if let Ok(raw) = std::env::var("DEFAULT_STRATEGY_MAP") {
            let value: Value = serde_json::from_str(&raw).map_err(|err| format!("DEFAULT_STRATEGY_MAP is not valid JSON: {err}"))?;
            let object = value.as_object().ok_or_else(|| "DEFAULT_STRATEGY_MAP must be a JSON object".to_string())?;
            let mut default_strategy_map = HashMap::new();
            for (key, strategy_value) in object {
                let category = category_from_str(key).unwrap_or(DocumentCategory::Unknown);
                default_strategy_map.insert(category, StrategyConfig::from_value(strategy_value));
            }
            if !default_strategy_map.contains_key(&DocumentCategory::Unknown) {
                default_strategy_map.insert(DocumentCategory::Unknown, config.fallback_strategy.clone());
            }
            config.default_strategy_map = default_strategy_map;
        }

        if let Ok(raw) = std::env::var("CATEGORY_THRESHOLDS") {
            let value: Value = serde_json::from_str(&raw).map_err(|err| format!("CATEGORY_THRESHOLDS is not valid JSON: {err}"))?;
            let object = value.as_object().ok_or_else(|| "CATEGORY_THRESHOLDS must be a JSON object".to_string())?;
            if let Some(v) = object.get("long_form_threshold").and_then(Value::as_u64) {
                config.long_form_threshold = v as u32;
            }
            if let Some(v) = object.get("short_form_threshold").and_then(Value::as_u64) {
                config.short_form_threshold = v as u32;
            }
            config.short_form_max_pages = object.get("short_form_max_pages").and_then(Value::as_u64).map(|v| v as u32);
            config.long_form_max_pages = object.get("long_form_max_pages").and_then(Value::as_u64).map(|v| v as u32);
            config.table_heavy_max_pages = object.get("table_heavy_max_pages").and_then(Value::as_u64).map(|v| v as u32);
            config.form_max_pages = object.get("form_max_pages").and_then(Value::as_u64).map(|v| v as u32);
        }

        Ok(config)
    }

    /// Returns the configured strategy for `category`, falling back to the
    /// required `unknown` entry when the category has no explicit mapping.
    #[must_use]
    pub fn strategy_for_category(&self, category: DocumentCategory) -> &StrategyConfig {
        self.default_strategy_map
            .get(&category)
            .unwrap_or_else(|| &self.default_strategy_map[&DocumentCategory::Unknown])
    }

    pub(crate) fn max_pages_threshold(&self, category: DocumentCategory) -> Option<u32> {
        match category {
            DocumentCategory::ShortForm => self.short_form_max_pages,
            DocumentCategory::LongForm => self.long_form_max_pages,
            DocumentCategory::TableHeavy => self.table_heavy_max_pages,
            DocumentCategory::FormHeavy => self.form_max_pages,
            _ => None,
        }
    }
}

fn category_from_str(raw: &str) -> Option<DocumentCategory> {
    match raw {
        "short_form" => Some(DocumentCategory::ShortForm),
        "long_form" => Some(DocumentCategory::LongForm),
        "scanned" => Some(DocumentCategory::Scanned),
        "table_heavy" => Some(DocumentCategory::TableHeavy),
        "form_heavy" => Some(DocumentCategory::FormHeavy),
        "unknown" => Some(DocumentCategory::Unknown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_config_unknown_entry_doubles_as_fallback() {
        let config = RouterConfig::default();
        assert_eq!(
            config.strategy_for_category(DocumentCategory::Scanned).name,
            "fallback_non_azure"
        );
    }

    #[test]
    fn page_metrics_clamps_densities_to_unit_range() {
        let metrics = PageMetrics::new(0, 1.5, -0.2, 0.5);
        assert_eq!(metrics.text_density, 1.0);
        assert_eq!(metrics.image_density, 0.0);
    }

    #[test]
    fn descriptor_builds_s3_uri_only_when_bucket_and_key_present() {
        let descriptor = DocumentDescriptor {
            object_key: "a.pdf".into(),
            bucket: Some("bucket".into()),
            body: Value::Null,
            mime_type: "application/pdf".into(),
            request_override: None,
        };
        assert_eq!(descriptor.source_uri().as_deref(), Some("s3://bucket/a.pdf"));
    }

    #[test]
    fn from_env_defaults_match_router_config_default() {
        let config = RouterConfig::from_env().unwrap();
        assert_eq!(config.mode, RoutingMode::Hybrid);
        assert_eq!(config.request_override_flag, "parser_override");
    }

    #[test]
    fn from_env_reads_static_mode_and_strategy() {
        std::env::set_var("ROUTING_MODE", "static");
        std::env::set_var("STATIC_ROUTING_STRATEGY", r#"{"name": "vision"}"#);
        let config = RouterConfig::from_env().unwrap();
        std::env::remove_var("ROUTING_MODE");
        std::env::remove_var("STATIC_ROUTING_STRATEGY");
        assert_eq!(config.mode, RoutingMode::Static);
        assert_eq!(config.static_strategy.unwrap().name, "vision");
    }

    #[test]
    fn from_env_rejects_unknown_routing_mode() {
        std::env::set_var("ROUTING_MODE", "turbo");
        let result = RouterConfig::from_env();
        std::env::remove_var("ROUTING_MODE");
        assert!(result.is_err());
    }

    #[test]
    fn from_env_category_thresholds_and_default_strategy_map() {
        std::env::set_var("CATEGORY_THRESHOLDS", r#"{"long_form_threshold": 50, "table_heavy_max_pages": 5}"#);
        std::env::set_var("DEFAULT_STRATEGY_MAP", r#"{"table_heavy": {"name": "vision"}}"#);
        let config = RouterConfig::from_env().unwrap();
        std::env::remove_var("CATEGORY_THRESHOLDS");
        std::env::remove_var("DEFAULT_STRATEGY_MAP");
        assert_eq!(config.long_form_threshold, 50);
        assert_eq!(config.table_heavy_max_pages, Some(5));
        assert_eq!(config.strategy_for_category(DocumentCategory::TableHeavy).name, "vision");
        assert_eq!(config.strategy_for_category(DocumentCategory::Unknown).name, "fallback_non_azure");
    }
}
