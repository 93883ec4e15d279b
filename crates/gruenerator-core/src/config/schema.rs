//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProvidersConfig`, `DispatchConfig`, `RoutingConfig`,
//! `OrchestratorConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{ProviderName, SamplingDefaults};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.gruenerator/config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Deployment environment (`"production"`, `"development"`, ...).
    pub environment: String,
    pub providers: ProvidersConfig,
    pub dispatch: DispatchConfig,
    pub routing: RoutingConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            providers: ProvidersConfig::default(),
            dispatch: DispatchConfig::default(),
            routing: RoutingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    /// Whether this is a development deployment.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single AI provider (API key, base URL, headers, model).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Default model for this provider (overrides the registry default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations, one per supported vendor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub claude: ProviderConfig,
    #[serde(default)]
    pub mistral: ProviderConfig,
    #[serde(default)]
    pub ionos: ProviderConfig,
    #[serde(default)]
    pub litellm: ProviderConfig,
    #[serde(default)]
    pub bedrock: ProviderConfig,
    #[serde(default)]
    pub telekom: ProviderConfig,
}

impl ProvidersConfig {
    /// Get a provider config.
    pub fn get(&self, name: ProviderName) -> &ProviderConfig {
        match name {
            ProviderName::Claude => &self.claude,
            ProviderName::Mistral => &self.mistral,
            ProviderName::Ionos => &self.ionos,
            ProviderName::Litellm => &self.litellm,
            ProviderName::Bedrock => &self.bedrock,
            ProviderName::Telekom => &self.telekom,
        }
    }

    /// Get a mutable provider config.
    pub fn get_mut(&mut self, name: ProviderName) -> &mut ProviderConfig {
        match name {
            ProviderName::Claude => &mut self.claude,
            ProviderName::Mistral => &mut self.mistral,
            ProviderName::Ionos => &mut self.ionos,
            ProviderName::Litellm => &mut self.litellm,
            ProviderName::Bedrock => &mut self.bedrock,
            ProviderName::Telekom => &mut self.telekom,
        }
    }

    /// Get a provider config by name (e.g. `"mistral"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        name.parse::<ProviderName>().ok().map(|p| self.get(p))
    }

    /// Names of all providers with an API key.
    pub fn configured(&self) -> Vec<ProviderName> {
        ProviderName::ALL
            .into_iter()
            .filter(|p| self.get(*p).is_configured())
            .collect()
    }
}

// ─────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────

/// Retry and transport settings of the dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchConfig {
    /// Maximum attempts per provider call (first try included).
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per retry.
    pub base_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Global sampling defaults (lowest precedence).
    pub defaults: SamplingDefaults,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            request_timeout_secs: 120,
            defaults: SamplingDefaults::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────

/// Inputs of the provider selector.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingConfig {
    pub default_provider: ProviderName,
    pub default_model: String,
    pub pro_provider: ProviderName,
    pub pro_model: String,
    pub ultra_provider: ProviderName,
    pub ultra_model: String,
    /// Used when the request metadata sets `privacyMode`.
    pub privacy_provider: ProviderName,
    /// Request type → preferred provider. Keys ending in `*` match by prefix.
    pub type_providers: HashMap<String, ProviderName>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let type_providers = [
            ("social", ProviderName::Mistral),
            ("universal", ProviderName::Mistral),
            ("sharepic_*", ProviderName::Mistral),
            ("antrag", ProviderName::Claude),
            ("antrag_*", ProviderName::Claude),
            ("rede", ProviderName::Claude),
            ("leichte_sprache", ProviderName::Ionos),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            default_provider: ProviderName::Mistral,
            default_model: "mistral-medium-latest".to_string(),
            pro_provider: ProviderName::Mistral,
            pro_model: "magistral-medium-latest".to_string(),
            ultra_provider: ProviderName::Litellm,
            ultra_model: "gpt-oss:120b".to_string(),
            privacy_provider: ProviderName::Ionos,
            type_providers,
        }
    }
}

impl RoutingConfig {
    /// Preferred provider for a request type: exact key first, then the longest `*` prefix.
    pub fn provider_for_type(&self, request_type: &str) -> Option<ProviderName> {
        if let Some(provider) = self.type_providers.get(request_type) {
            return Some(*provider);
        }
        self.type_providers
            .iter()
            .filter_map(|(key, provider)| {
                key.strip_suffix('*')
                    .filter(|prefix| request_type.starts_with(prefix))
                    .map(|prefix| (prefix.len(), *provider))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, provider)| provider)
    }
}

// ─────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────

/// Multi-intent orchestration and pending-request settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// Shared deadline for all intents of one chat turn.
    pub batch_timeout_secs: u64,
    /// After this long a pending-request lock may be taken over.
    pub pending_lock_ttl_secs: u64,
    /// How long a stored clarification request stays valid.
    pub pending_request_ttl_secs: u64,
    /// Locale of user-facing failure messages (`"de"` or `"en"`).
    pub locale: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_timeout_secs: 30,
            pending_lock_ttl_secs: 30,
            pending_request_ttl_secs: 600,
            locale: "de".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
