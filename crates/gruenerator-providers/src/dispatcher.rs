//! Dispatcher — the single entry point that turns a canonical request into a result.
//!
//! Flow: pick provider → look up adapter → execute under the retry policy →
//! on a fallback-eligible error or an unusable result, walk the fallback
//! chain → validate the result contract → return.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map};
use tracing::{debug, info, warn};

use gruenerator_core::config::schema::Config;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::{CanonicalRequest, DispatchResult, ProviderName};

use crate::anthropic::AnthropicAdapter;
use crate::fallback::FallbackChain;
use crate::http::build_client;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::openai_compat::OpenAiCompatAdapter;
use crate::registry::{find_by_name, WireFormat};
use crate::retry::RetryPolicy;
use crate::selector::{ProviderSelection, ProviderSelector};
use crate::traits::ProviderAdapter;

/// Anything that can dispatch a canonical request. Implemented by [`Dispatcher`];
/// the orchestrator and the worker depend on this trait only.
#[async_trait]
pub trait DispatchService: Send + Sync {
    async fn dispatch(
        &self,
        request_id: &str,
        request: &CanonicalRequest,
    ) -> Result<DispatchResult, DispatchError>;
}

// ─────────────────────────────────────────────
// AdapterSet
// ─────────────────────────────────────────────

/// Adapters of all configured providers, keyed by name.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ProviderName, Arc<dyn ProviderAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an adapter for every provider that has an API key.
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        let client = build_client(Duration::from_secs(config.dispatch.request_timeout_secs))?;
        let defaults = config.dispatch.defaults;
        let mut set = Self::new();

        for name in config.providers.configured() {
            let provider_config = config.providers.get(name);
            let adapter: Arc<dyn ProviderAdapter> = match find_by_name(name).wire {
                WireFormat::OpenAiCompatible => Arc::new(OpenAiCompatAdapter::new(
                    name,
                    provider_config,
                    client.clone(),
                    defaults,
                )),
                WireFormat::AnthropicMessages | WireFormat::BedrockInvoke => Arc::new(
                    AnthropicAdapter::new(name, provider_config, client.clone(), defaults),
                ),
            };
            set.insert(adapter);
        }

        debug!(providers = ?set.names(), "Provider adapters ready");
        Ok(set)
    }

    pub fn insert(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, name: ProviderName) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&name).cloned()
    }

    /// Configured providers in `ProviderName::ALL` order.
    pub fn names(&self) -> Vec<ProviderName> {
        ProviderName::ALL
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

// ─────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────

pub struct Dispatcher {
    selector: ProviderSelector,
    adapters: AdapterSet,
    retry: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl Dispatcher {
    pub fn new(selector: ProviderSelector, adapters: AdapterSet, retry: RetryPolicy) -> Self {
        Self {
            selector,
            adapters,
            retry,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Build selector, adapters, and retry policy from the loaded config.
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        Ok(Self::new(
            ProviderSelector::from_config(config),
            AdapterSet::from_config(config)?,
            RetryPolicy::from_config(&config.dispatch),
        ))
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Provider and model the request will be sent to first.
    pub fn resolve_selection(
        &self,
        request: &CanonicalRequest,
    ) -> Result<ProviderSelection, DispatchError> {
        let Some(explicit) = request.explicit_provider.as_deref() else {
            return Ok(self.selector.select(
                &request.request_type,
                &request.options,
                &request.metadata,
            ));
        };

        let provider: ProviderName = explicit.parse()?;
        let model = request
            .options
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.selector.default_model(provider));
        Ok(ProviderSelection {
            provider,
            model,
            use_bedrock: provider == ProviderName::Bedrock,
        })
    }

    async fn run_fallback(
        &self,
        attempted: ProviderName,
        request_id: &str,
        request: &CanonicalRequest,
        primary: DispatchError,
    ) -> Result<DispatchResult, DispatchError> {
        let chain = FallbackChain::for_type(&request.request_type);
        info!(
            chain = chain.as_str(),
            from = %attempted,
            request_id,
            reason = primary.kind(),
            "Primary provider failed, starting fallback"
        );

        let metrics = self.metrics.clone();
        let (result, provider) = chain
            .run(attempted, request_id, primary, |provider| {
                let adapter = self.adapters.get(provider)?;
                let metrics = metrics.clone();
                Some(async move {
                    let model = adapter.default_model().to_string();
                    metrics.record_attempt(provider);
                    let outcome = adapter.execute(request_id, request, &model).await;
                    match &outcome {
                        Ok(_) => metrics.record_success(provider),
                        Err(e) => metrics.record_failure(provider, e),
                    }
                    outcome
                })
            })
            .await?;

        let mut extra = Map::new();
        extra.insert("fallbackFrom".into(), json!(attempted.as_str()));
        extra.insert("fallbackChain".into(), json!(chain.as_str()));
        debug!(provider = %provider, request_id, "Fallback provider succeeded");
        Ok(result.with_metadata(&extra))
    }
}

#[async_trait]
impl DispatchService for Dispatcher {
    async fn dispatch(
        &self,
        request_id: &str,
        request: &CanonicalRequest,
    ) -> Result<DispatchResult, DispatchError> {
        let selection = self.resolve_selection(request)?;
        let provider = selection.provider;

        let adapter = self.adapters.get(provider).ok_or_else(|| {
            DispatchError::Config(format!(
                "provider '{provider}' is not configured (set {} or providers.{provider}.apiKey)",
                provider.env_key()
            ))
        })?;

        debug!(
            provider = %provider,
            model = %selection.model,
            request_id,
            request_type = %request.request_type,
            "Dispatching request"
        );

        let outcome = self
            .retry
            .run(provider, request_id, self.metrics.as_ref(), || {
                adapter.execute(request_id, request, &selection.model)
            })
            .await;

        let result = match outcome {
            Ok(result) if result.is_usable() => result,
            Ok(_) => {
                warn!(provider = %provider, request_id, "Provider returned no usable content");
                self.run_fallback(
                    provider,
                    request_id,
                    request,
                    DispatchError::UnusableResult { provider },
                )
                .await?
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(provider = %provider, request_id, error = %e, "Provider call failed");
                self.run_fallback(provider, request_id, request, e).await?
            }
            Err(e) => return Err(e),
        };

        result.validate()?;
        Ok(result)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
