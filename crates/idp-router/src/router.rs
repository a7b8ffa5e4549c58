//! The document router: builds a descriptor from a raw message body, resolves
//! content, analyses layout, categorises the document, and resolves a parser
//! strategy. Every step is infallible from the caller's perspective — a
//! missing object key is the only hard error.

use crate::error::RouterError;
use crate::layout::LayoutAnalyser;
use crate::mime::sniff_mime_type;
use crate::model::{DocumentAnalysis, DocumentCategory, DocumentDescriptor, DocumentProfile, ParserStrategy, RouterConfig, RoutingMode};
use crate::overrides::OverrideProvider;
use crate::resolver::ResolverChain;
use serde_json::Value;

const REQUEST_OVERRIDE_CONTAINERS: [&str; 2] = ["routing", "overrides"];

pub struct DocumentRouter {
    config: RouterConfig,
    resolvers: ResolverChain,
    analyser: Box<dyn LayoutAnalyser>,
    overrides: OverrideProvider,
}

impl DocumentRouter {
    #[must_use]
    pub fn new(config: RouterConfig, resolvers: ResolverChain, analyser: Box<dyn LayoutAnalyser>, overrides: OverrideProvider) -> Self {
        Self {
            config,
            resolvers,
            analyser,
            overrides,
        }
    }

    /// Loads a fresh [`crate::model::OverrideSet`] from every configured
    /// source. Callers refresh this once per ingestion cycle, not once per
    /// message, and pass the result into [`Self::route`].
    pub async fn refresh_overrides(&self) -> crate::model::OverrideSet {
        self.overrides.load().await
    }

    pub async fn route(&self, body: Value, object_key: &str, overrides: &crate::model::OverrideSet) -> Result<DocumentAnalysis, RouterError> {
        if !body.is_object() {
            return Err(RouterError::InvalidBody);
        }
        if object_key.is_empty() {
            return Err(RouterError::MissingObjectKey);
        }

        let descriptor = build_descriptor(&self.config, body, object_key);
        let content = self.resolvers.resolve(&descriptor).await;
        let profile = self.analyser.analyse(&descriptor, content.as_deref()).await;
        let category = categorise(&self.config, &profile);
        let (strategy, overrides_applied) = resolve_strategy(&self.config, &descriptor, overrides, category, &profile);

        Ok(to_analysis(descriptor, profile, category, strategy, overrides_applied))
    }
}

/// Extracts the bucket (from `body.s3.bucket.name`), sniffs the MIME type,
/// and pulls a request-level override from the configured flag, checked at
/// the body's root, then under `routing`/`overrides` sub-objects.
fn build_descriptor(config: &RouterConfig, body: Value, object_key: &str) -> DocumentDescriptor {
    let bucket = body
        .get("s3")
        .and_then(|s3| s3.get("bucket"))
        .and_then(|bucket| bucket.get("name"))
        .and_then(Value::as_str)
        .map(String::from);

    let mime_type = sniff_mime_type(object_key, &body);
    let request_override = extract_request_override(&body, &config.request_override_flag);

    DocumentDescriptor {
        object_key: object_key.to_string(),
        bucket,
        body,
        mime_type,
        request_override,
    }
}

fn extract_request_override(body: &Value, flag: &str) -> Option<String> {
    if let Some(value) = body.get(flag).and_then(Value::as_str) {
        return Some(value.to_string());
    }
    for container in REQUEST_OVERRIDE_CONTAINERS {
        if let Some(value) = body.get(container).and_then(|c| c.get(flag)).and_then(Value::as_str) {
            return Some(value.to_string());
        }
    }
    None
}

/// Fixed-order categorisation. Each branch is checked in sequence; the first
/// match wins.
fn categorise(config: &RouterConfig, profile: &DocumentProfile) -> DocumentCategory {
    if profile.page_count == 0 {
        return DocumentCategory::Unknown;
    }
    if profile.scanned_page_ratio >= config.scanned_page_ratio_threshold {
        return DocumentCategory::Scanned;
    }
    if profile.table_page_ratio >= config.table_page_ratio_threshold {
        return DocumentCategory::TableHeavy;
    }
    if profile.form_page_ratio >= config.form_page_ratio_threshold {
        return DocumentCategory::FormHeavy;
    }
    if profile.page_count >= config.long_form_threshold {
        return DocumentCategory::LongForm;
    }
    if profile.page_count <= config.short_form_threshold && profile.average_text_density >= config.short_form_min_text_density {
        return DocumentCategory::ShortForm;
    }
    DocumentCategory::Unknown
}

/// Resolution priority: request override, then the first matching pattern
/// override, then a static-mode fixed strategy, then a per-category page
/// threshold redirect, then the category default.
fn resolve_strategy(
    config: &RouterConfig,
    descriptor: &DocumentDescriptor,
    overrides: &crate::model::OverrideSet,
    category: DocumentCategory,
    profile: &DocumentProfile,
) -> (ParserStrategy, Vec<String>) {
    if let Some(name) = &descriptor.request_override {
        let strategy = ParserStrategy {
            name: name.clone(),
            reason: "request_override".to_string(),
            model: None,
            max_pages: None,
        };
        return (strategy, vec!["request".to_string()]);
    }

    for pattern_override in &overrides.pattern_overrides {
        if pattern_override.pattern.is_match(&descriptor.object_key) {
            let strategy = ParserStrategy {
                name: pattern_override.strategy.name.clone(),
                reason: "config_pattern_override".to_string(),
                model: pattern_override.strategy.model.clone(),
                max_pages: pattern_override.strategy.max_pages,
            };
            return (strategy, vec![format!("pattern:{}", pattern_override.pattern.as_str())]);
        }
    }

    let mut applied = Vec::new();

    if config.mode == RoutingMode::Static {
        if let Some(static_strategy) = &config.static_strategy {
            applied.push("static_config".to_string());
            let strategy = ParserStrategy {
                name: static_strategy.name.clone(),
                reason: "config_static".to_string(),
                model: static_strategy.model.clone(),
                max_pages: static_strategy.max_pages,
            };
            return (strategy, applied);
        }
    }

    determine_strategy(config, category, profile, applied)
}

/// Applies a per-category page-count threshold redirect to the fallback
/// strategy, or falls back to the category default. Appends exactly one of
/// `"threshold_redirect"`/`"category_default"` to `applied`.
fn determine_strategy(config: &RouterConfig, category: DocumentCategory, profile: &DocumentProfile, mut applied: Vec<String>) -> (ParserStrategy, Vec<String>) {
    if let Some(threshold) = config.max_pages_threshold(category) {
        if profile.page_count > threshold {
            applied.push("threshold_redirect".to_string());
            let fallback = &config.fallback_strategy;
            let strategy = ParserStrategy {
                name: fallback.name.clone(),
                reason: "page_threshold_exceeded".to_string(),
                model: fallback.model.clone(),
                max_pages: Some(threshold),
            };
            return (strategy, applied);
        }
    }

    applied.push("category_default".to_string());
    let default = config.strategy_for_category(category);
    let strategy = ParserStrategy {
        name: default.name.clone(),
        reason: "category_default".to_string(),
        model: default.model.clone(),
        max_pages: default.max_pages,
    };
    (strategy, applied)
}

fn to_analysis(
    descriptor: DocumentDescriptor,
    profile: DocumentProfile,
    category: DocumentCategory,
    strategy: ParserStrategy,
    overrides_applied: Vec<String>,
) -> DocumentAnalysis {
    DocumentAnalysis {
        object_key: descriptor.object_key,
        mime_type: profile.mime_type.clone(),
        page_count: profile.page_count,
        category,
        strategy,
        overrides_applied,
        request_override: descriptor.request_override,
        average_text_density: profile.average_text_density,
        average_image_density: profile.average_image_density,
        table_page_ratio: profile.table_page_ratio,
        scanned_page_ratio: profile.scanned_page_ratio,
        checkbox_page_ratio: profile.checkbox_page_ratio,
        radio_button_page_ratio: profile.radio_button_page_ratio,
        form_page_ratio: profile.form_page_ratio,
        total_tables: profile.total_tables,
        total_checkboxes: profile.total_checkboxes,
        total_radio_buttons: profile.total_radio_buttons,
        pages: profile.pages,
        raw_metadata: descriptor.body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::HeuristicLayoutAnalyser;
    use crate::model::StrategyConfig;
    use serde_json::json;

    fn router_with(config: RouterConfig) -> DocumentRouter {
        DocumentRouter::new(
            config,
            ResolverChain::with_inline_default(),
            Box::new(HeuristicLayoutAnalyser),
            OverrideProvider::new(),
        )
    }

    #[tokio::test]
    async fn request_override_wins_over_everything_else() {
        let mut config = RouterConfig::default();
        config.default_strategy_map.insert(DocumentCategory::Unknown, StrategyConfig::new("fallback"));
        let router = router_with(config);
        let body = json!({
            "parser_override": "vision",
            "documentMetadata": {"pageCount": 3},
        });
        let overrides = router.refresh_overrides().await;
        let analysis = router.route(body, "doc.pdf", &overrides).await.unwrap();
        assert_eq!(analysis.strategy.name, "vision");
        assert_eq!(analysis.strategy.reason, "request_override");
        assert_eq!(analysis.overrides_applied, vec!["request".to_string()]);
    }

    #[tokio::test]
    async fn table_heavy_redirects_on_page_threshold() {
        let mut config = RouterConfig::default();
        config.default_strategy_map.insert(DocumentCategory::TableHeavy, StrategyConfig::new("table_parser"));
        config.table_heavy_max_pages = Some(5);
        let router = router_with(config);
        let body = json!({
            "documentMetadata": {"layout": {"pages": (0..10).map(|_| json!({"tableDensity": 0.9})).collect::<Vec<_>>()}},
        });
        let overrides = router.refresh_overrides().await;
        let analysis = router.route(body, "doc.pdf", &overrides).await.unwrap();
        assert_eq!(analysis.category, DocumentCategory::TableHeavy);
        assert_eq!(analysis.strategy.reason, "page_threshold_exceeded");
        assert_eq!(analysis.strategy.name, "fallback_non_azure");
        assert_eq!(analysis.strategy.max_pages, Some(5));
        assert_eq!(analysis.overrides_applied, vec!["threshold_redirect".to_string()]);
    }

    #[tokio::test]
    async fn short_form_requires_both_low_page_count_and_high_text_density() {
        let config = RouterConfig::default();
        let router = router_with(config);
        let body = json!({
            "documentMetadata": {"layout": {"pages": (0..5).map(|_| json!({"textDensity": 0.9})).collect::<Vec<_>>()}},
        });
        let overrides = router.refresh_overrides().await;
        let analysis = router.route(body, "doc.pdf", &overrides).await.unwrap();
        assert_eq!(analysis.category, DocumentCategory::ShortForm);
    }

    #[tokio::test]
    async fn rejects_empty_object_key() {
        let router = router_with(RouterConfig::default());
        let overrides = router.refresh_overrides().await;
        let result = router.route(json!({}), "", &overrides).await;
        assert!(matches!(result, Err(RouterError::MissingObjectKey)));
    }

    #[tokio::test]
    async fn rejects_non_object_body() {
        let router = router_with(RouterConfig::default());
        let overrides = router.refresh_overrides().await;
        let result = router.route(json!("not an object"), "doc.pdf", &overrides).await;
        assert!(matches!(result, Err(RouterError::InvalidBody)));
    }

    #[tokio::test]
    async fn pattern_override_wins_over_category_default() {
        let config = RouterConfig::default();
        let router = router_with(config);
        let overrides = crate::model::OverrideSet {
            pattern_overrides: vec![crate::model::PatternOverride {
                pattern: regex::Regex::new("^invoices/").unwrap(),
                strategy: StrategyConfig::new("vision"),
            }],
        };
        let analysis = router.route(json!({}), "invoices/a.pdf", &overrides).await.unwrap();
        assert_eq!(analysis.strategy.name, "vision");
        assert_eq!(analysis.strategy.reason, "config_pattern_override");
        assert_eq!(analysis.overrides_applied, vec!["pattern:^invoices/".to_string()]);
    }

    #[tokio::test]
    async fn static_mode_applies_fixed_strategy_and_records_static_config() {
        let mut config = RouterConfig::default();
        config.mode = RoutingMode::Static;
        config.static_strategy = Some(StrategyConfig::new("static_parser"));
        let router = router_with(config);
        let overrides = router.refresh_overrides().await;
        let analysis = router.route(json!({}), "doc.pdf", &overrides).await.unwrap();
        assert_eq!(analysis.strategy.name, "static_parser");
        assert_eq!(analysis.strategy.reason, "config_static");
        assert_eq!(analysis.overrides_applied, vec!["static_config".to_string()]);
    }

    #[test]
    fn extract_request_override_checks_nested_containers() {
        let body = json!({"routing": {"parser_override": "azure"}});
        assert_eq!(extract_request_override(&body, "parser_override").as_deref(), Some("azure"));
    }

    #[test]
    fn categorise_scanned_takes_priority_over_table_heavy() {
        let config = RouterConfig::default();
        let profile = DocumentProfile {
            object_key: "a".into(),
            bucket: None,
            mime_type: "application/pdf".into(),
            page_count: 3,
            pages: vec![],
            average_text_density: 0.1,
            average_image_density: 0.9,
            table_page_ratio: 0.9,
            scanned_page_ratio: 0.9,
            checkbox_page_ratio: 0.0,
            radio_button_page_ratio: 0.0,
            form_page_ratio: 0.0,
            total_tables: 3,
            total_checkboxes: 0,
            total_radio_buttons: 0,
        };
        assert_eq!(categorise(&config, &profile), DocumentCategory::Scanned);
    }
}
