//! Override resolution: pattern-based strategy overrides loaded fresh for
//! each routing decision. No secret-manager or SQL-table backend ships with
//! this crate (per Non-goals); those are capability traits with null-object
//! defaults so a real backend can be wired in without touching router logic.

use crate::model::{OverrideSet, PatternOverride, StrategyConfig};
use async_trait::async_trait;
use serde_json::Value;

/// Capability trait for a secrets backend holding override configuration
/// (e.g. a secret manager entry containing a JSON array of pattern rules).
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn load(&self) -> Option<String>;
}

/// Null-object default: no secret backend wired, always empty.
#[derive(Debug, Default)]
pub struct NullSecretSource;

#[async_trait]
impl SecretSource for NullSecretSource {
    async fn load(&self) -> Option<String> {
        None
    }
}

/// Capability trait for a tabular override store (e.g. a SQL table of
/// `pattern -> strategy` rows).
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn load(&self) -> Vec<(String, Value)>;
}

/// Null-object default: no table backend wired, always empty.
#[derive(Debug, Default)]
pub struct NullTableSource;

#[async_trait]
impl TableSource for NullTableSource {
    async fn load(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

/// Loads override rules from an environment variable holding a JSON array of
/// `{"pattern": ..., "strategy": {...}}` objects. Malformed entries are
/// dropped with a warning rather than failing the whole load — a single bad
/// override rule must never block routing.
pub struct EnvSource {
    var_name: String,
}

impl EnvSource {
    #[must_use]
    pub fn new(var_name: impl Into<String>) -> Self {
        Self { var_name: var_name.into() }
    }
}

#[async_trait]
impl SecretSource for EnvSource {
    async fn load(&self) -> Option<String> {
        std::env::var(&self.var_name).ok()
    }
}

/// Builds an [`OverrideSet`] from raw JSON text, tolerating malformed regexes
/// and malformed entries by dropping them individually. A payload may be a
/// JSON array of entries, or a single bare entry object.
#[must_use]
pub fn parse_override_payload(raw: &str) -> OverrideSet {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        log::warn!("override payload is not valid JSON; ignoring");
        return OverrideSet::default();
    };
    let entries: Vec<Value> = if let Some(array) = value.as_array() {
        array.clone()
    } else if value.is_object() {
        vec![value]
    } else {
        log::warn!("override payload is neither a JSON array nor an object; ignoring");
        return OverrideSet::default();
    };

    let mut pattern_overrides = Vec::new();
    for entry in &entries {
        let Some(pattern_str) = entry.get("pattern").and_then(Value::as_str) else {
            log::warn!("override entry missing `pattern`; skipping");
            continue;
        };
        let Some(strategy_value) = entry.get("strategy") else {
            log::warn!("override entry missing `strategy`; skipping");
            continue;
        };
        let pattern = match regex::Regex::new(pattern_str) {
            Ok(p) => p,
            Err(err) => {
                log::warn!("override pattern `{pattern_str}` is invalid ({err}); skipping");
                continue;
            }
        };
        pattern_overrides.push(PatternOverride {
            pattern,
            strategy: StrategyConfig::from_value(strategy_value),
        });
    }

    OverrideSet { pattern_overrides }
}

/// Loads an [`OverrideSet`] from every configured source, in order, merging
/// entries (later sources append after earlier ones — first match still wins
/// at resolution time since the router walks the list in order).
pub struct OverrideProvider {
    secret_sources: Vec<Box<dyn SecretSource>>,
    table_sources: Vec<Box<dyn TableSource>>,
}

impl OverrideProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            secret_sources: Vec::new(),
            table_sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_secret_source(mut self, source: Box<dyn SecretSource>) -> Self {
        self.secret_sources.push(source);
        self
    }

    #[must_use]
    pub fn with_table_source(mut self, source: Box<dyn TableSource>) -> Self {
        self.table_sources.push(source);
        self
    }

    pub async fn load(&self) -> OverrideSet {
        let mut pattern_overrides = Vec::new();

        for source in &self.secret_sources {
            if let Some(raw) = source.load().await {
                pattern_overrides.extend(parse_override_payload(&raw).pattern_overrides);
            }
        }

        for source in &self.table_sources {
            for (pattern_str, strategy_value) in source.load().await {
                match regex::Regex::new(&pattern_str) {
                    Ok(pattern) => pattern_overrides.push(PatternOverride {
                        pattern,
                        strategy: StrategyConfig::from_value(&strategy_value),
                    }),
                    Err(err) => log::warn!("table override pattern `{pattern_str}` is invalid ({err}); skipping"),
                }
            }
        }

        OverrideSet { pattern_overrides }
    }
}

impl Default for OverrideProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_valid_pattern_overrides() {
        let raw = json!([{"pattern": "^invoices/", "strategy": {"name": "vision"}}]).to_string();
        let set = parse_override_payload(&raw);
        assert_eq!(set.pattern_overrides.len(), 1);
        assert_eq!(set.pattern_overrides[0].strategy.name, "vision");
    }

    #[test]
    fn drops_entries_with_invalid_regex_but_keeps_others() {
        let raw = json!([
            {"pattern": "(unterminated", "strategy": {"name": "a"}},
            {"pattern": "^ok/", "strategy": {"name": "b"}},
        ])
        .to_string();
        let set = parse_override_payload(&raw);
        assert_eq!(set.pattern_overrides.len(), 1);
        assert_eq!(set.pattern_overrides[0].strategy.name, "b");
    }

    #[test]
    fn accepts_a_single_bare_object_as_well_as_an_array() {
        let raw = json!({"pattern": "^invoices/", "strategy": {"name": "vision"}}).to_string();
        let set = parse_override_payload(&raw);
        assert_eq!(set.pattern_overrides.len(), 1);
        assert_eq!(set.pattern_overrides[0].strategy.name, "vision");
    }

    #[test]
    fn malformed_json_yields_empty_set_not_error() {
        let set = parse_override_payload("not json");
        assert!(set.pattern_overrides.is_empty());
    }

    #[tokio::test]
    async fn provider_with_no_sources_yields_empty_set() {
        let set = OverrideProvider::new().load().await;
        assert!(set.pattern_overrides.is_empty());
    }

    #[tokio::test]
    async fn env_source_reads_configured_variable() {
        std::env::set_var("IDP_TEST_OVERRIDES", json!([{"pattern": "^x/", "strategy": {"name": "y"}}]).to_string());
        let provider = OverrideProvider::new().with_secret_source(Box::new(EnvSource::new("IDP_TEST_OVERRIDES")));
        let set = provider.load().await;
        std::env::remove_var("IDP_TEST_OVERRIDES");
        assert_eq!(set.pattern_overrides.len(), 1);
    }
}
