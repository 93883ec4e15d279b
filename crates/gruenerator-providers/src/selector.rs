//! Provider selector — picks provider and model for a request.
//!
//! Pure and total. The first matching rule wins:
//!
//! 1. `useUltraMode`          → ultra provider/model
//! 2. `useProMode`            → pro provider/model
//! 3. `useBedrock`            → bedrock with its default model
//! 4. `metadata.privacyMode`  → privacy provider
//! 5. type table              → provider for the request type
//! 6. otherwise               → default provider/model
//!
//! When none of rules 1–3 fired, a caller-supplied `options.model` replaces the
//! chosen model.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use gruenerator_core::config::schema::{Config, RoutingConfig};
use gruenerator_core::types::{ProviderName, RequestOptions};

use crate::registry::resolve_default_model;

/// Outcome of provider selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSelection {
    pub provider: ProviderName,
    pub model: String,
    pub use_bedrock: bool,
}

#[derive(Clone, Debug)]
pub struct ProviderSelector {
    routing: RoutingConfig,
    /// Default model per provider (config override, else registry default).
    default_models: HashMap<ProviderName, String>,
}

impl ProviderSelector {
    pub fn new(routing: RoutingConfig, default_models: HashMap<ProviderName, String>) -> Self {
        Self {
            routing,
            default_models,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let default_models = ProviderName::ALL
            .into_iter()
            .map(|p| (p, resolve_default_model(p, config.providers.get(p))))
            .collect();
        Self::new(config.routing.clone(), default_models)
    }

    /// Default model of `provider`.
    pub fn default_model(&self, provider: ProviderName) -> String {
        self.default_models
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| crate::registry::find_by_name(provider).default_model.to_string())
    }

    pub fn select(
        &self,
        request_type: &str,
        options: &RequestOptions,
        metadata: &Map<String, Value>,
    ) -> ProviderSelection {
        let routing = &self.routing;

        if options.use_ultra_mode {
            return Self::fixed(routing.ultra_provider, routing.ultra_model.clone(), false);
        }
        if options.use_pro_mode {
            return Self::fixed(routing.pro_provider, routing.pro_model.clone(), false);
        }
        if options.use_bedrock {
            return Self::fixed(
                ProviderName::Bedrock,
                self.default_model(ProviderName::Bedrock),
                true,
            );
        }

        let privacy = metadata
            .get("privacyMode")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let (provider, model) = if privacy {
            let p = routing.privacy_provider;
            (p, self.default_model(p))
        } else if let Some(p) = routing.provider_for_type(request_type) {
            (p, self.model_for(p))
        } else {
            (routing.default_provider, routing.default_model.clone())
        };

        ProviderSelection {
            provider,
            model: options
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(model),
            use_bedrock: provider == ProviderName::Bedrock,
        }
    }

    fn fixed(provider: ProviderName, model: String, use_bedrock: bool) -> ProviderSelection {
        ProviderSelection {
            provider,
            model,
            use_bedrock,
        }
    }

    /// Model for a type-table hit: the routing default when the provider is the
    /// default provider, otherwise that provider's own default.
    fn model_for(&self, provider: ProviderName) -> String {
        if provider == self.routing.default_provider {
            self.routing.default_model.clone()
        } else {
            self.default_model(provider)
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn selector() -> ProviderSelector {
        ProviderSelector::from_config(&Config::default())
    }

    fn meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_ultra_wins_over_everything() {
        let options = RequestOptions {
            use_ultra_mode: true,
            use_pro_mode: true,
            use_bedrock: true,
            model: Some("ignored".into()),
            ..Default::default()
        };
        let sel = selector().select("social", &options, &Map::new());
        assert_eq!(sel.provider, ProviderName::Litellm);
        assert_eq!(sel.model, "gpt-oss:120b");
        assert!(!sel.use_bedrock);
    }

    #[test]
    fn test_pro_mode() {
        let options = RequestOptions {
            use_pro_mode: true,
            model: Some("ignored".into()),
            ..Default::default()
        };
        let sel = selector().select("antrag", &options, &Map::new());
        assert_eq!(sel.provider, ProviderName::Mistral);
        assert_eq!(sel.model, "magistral-medium-latest");
    }

    #[test]
    fn test_bedrock_flag() {
        let options = RequestOptions {
            use_bedrock: true,
            ..Default::default()
        };
        let sel = selector().select("social", &options, &Map::new());
        assert_eq!(sel.provider, ProviderName::Bedrock);
        assert!(sel.use_bedrock);
        assert_eq!(sel.model, crate::registry::find_by_name(ProviderName::Bedrock).default_model);
    }

    #[test]
    fn test_privacy_mode_before_type_table() {
        let sel = selector().select(
            "antrag",
            &RequestOptions::default(),
            &meta(&[("privacyMode", json!(true))]),
        );
        assert_eq!(sel.provider, ProviderName::Ionos);

        let sel = selector().select(
            "antrag",
            &RequestOptions::default(),
            &meta(&[("privacyMode", json!("yes"))]),
        );
        assert_eq!(sel.provider, ProviderName::Claude);
    }

    #[test]
    fn test_type_table() {
        let s = selector();
        let none = Map::new();
        let opts = RequestOptions::default();

        let sel = s.select("sharepic_zitat", &opts, &none);
        assert_eq!(sel.provider, ProviderName::Mistral);
        assert_eq!(sel.model, "mistral-medium-latest");

        let sel = s.select("antrag", &opts, &none);
        assert_eq!(sel.provider, ProviderName::Claude);
        assert_eq!(sel.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_default_and_model_override() {
        let s = selector();
        let sel = s.select("unbekannt", &RequestOptions::default(), &Map::new());
        assert_eq!(
            sel,
            ProviderSelection {
                provider: ProviderName::Mistral,
                model: "mistral-medium-latest".into(),
                use_bedrock: false,
            }
        );

        let options = RequestOptions {
            model: Some("mistral-large-latest".into()),
            ..Default::default()
        };
        let sel = s.select("unbekannt", &options, &Map::new());
        assert_eq!(sel.model, "mistral-large-latest");
    }

    #[test]
    fn test_config_model_override_flows_into_selection() {
        let mut config = Config::default();
        config.providers.claude.model = Some("claude-opus-4-1".into());
        let sel = ProviderSelector::from_config(&config).select(
            "antrag",
            &RequestOptions::default(),
            &Map::new(),
        );
        assert_eq!(sel.model, "claude-opus-4-1");
    }

    #[test]
    fn test_every_flag_combination_yields_known_provider() {
        let s = selector();
        for request_type in ["social", "sharepic_dreizeilen", "antrag", "", "unbekannt"] {
            for bits in 0..16u8 {
                let options = RequestOptions {
                    use_ultra_mode: bits & 1 != 0,
                    use_pro_mode: bits & 2 != 0,
                    use_bedrock: bits & 4 != 0,
                    ..Default::default()
                };
                let metadata = meta(&[("privacyMode", json!(bits & 8 != 0))]);
                let sel = s.select(request_type, &options, &metadata);
                assert!(ProviderName::ALL.contains(&sel.provider));
                assert!(!sel.model.is_empty());
            }
        }
    }

    #[test]
    fn test_select_is_pure() {
        let s = selector();
        let opts = RequestOptions::default();
        let a = s.select("rede", &opts, &Map::new());
        let b = s.select("rede", &opts, &Map::new());
        assert_eq!(a, b);
    }
}
