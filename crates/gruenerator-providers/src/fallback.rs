//! Fallback chains — ordered alternate providers tried after the primary fails.
//!
//! The chain depends only on the request type: sharepic-style types use the
//! sharepic chain, everything else the privacy-preserving general chain.

use std::future::Future;

use tracing::{debug, info, warn};

use gruenerator_core::error::DispatchError;
use gruenerator_core::types::{DispatchResult, ProviderName};

/// Request types served by the sharepic chain.
pub const SHAREPIC_TYPES: &[&str] = &[
    "sharepic",
    "sharepic_dreizeilen",
    "sharepic_zitat",
    "sharepic_zitat_pure",
    "sharepic_headline",
    "sharepic_info",
    "sharepic_veranstaltung",
    "image_text",
];

const GENERAL_CHAIN: &[ProviderName] = &[
    ProviderName::Mistral,
    ProviderName::Ionos,
    ProviderName::Litellm,
    ProviderName::Telekom,
];

const SHAREPIC_CHAIN: &[ProviderName] = &[ProviderName::Mistral, ProviderName::Claude];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackChain {
    General,
    Sharepic,
}

impl FallbackChain {
    pub fn for_type(request_type: &str) -> Self {
        if SHAREPIC_TYPES.contains(&request_type) {
            FallbackChain::Sharepic
        } else {
            FallbackChain::General
        }
    }

    pub fn members(&self) -> &'static [ProviderName] {
        match self {
            FallbackChain::General => GENERAL_CHAIN,
            FallbackChain::Sharepic => SHAREPIC_CHAIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackChain::General => "general",
            FallbackChain::Sharepic => "sharepic",
        }
    }

    /// Try every member except `attempted`, in order, until one returns a usable result.
    ///
    /// `attempt` returns `None` for a member without a configured adapter.
    /// Unusable results count as [`DispatchError::UnusableResult`]. When every
    /// member fails the last error propagates; when none could be attempted the
    /// `primary` error does.
    pub async fn run<F, Fut>(
        &self,
        attempted: ProviderName,
        request_id: &str,
        primary: DispatchError,
        attempt: F,
    ) -> Result<(DispatchResult, ProviderName), DispatchError>
    where
        F: Fn(ProviderName) -> Option<Fut>,
        Fut: Future<Output = Result<DispatchResult, DispatchError>>,
    {
        let mut last_error: Option<DispatchError> = None;

        for &provider in self.members() {
            if provider == attempted {
                continue;
            }
            let Some(call) = attempt(provider) else {
                debug!(
                    chain = self.as_str(),
                    provider = %provider,
                    request_id,
                    "Skipping unconfigured fallback provider"
                );
                continue;
            };

            info!(
                chain = self.as_str(),
                provider = %provider,
                from = %attempted,
                request_id,
                "Trying fallback provider"
            );

            match call.await {
                Ok(result) if result.is_usable() => return Ok((result, provider)),
                Ok(_) => {
                    warn!(provider = %provider, request_id, "Fallback returned no usable content");
                    last_error = Some(DispatchError::UnusableResult { provider });
                }
                Err(e) => {
                    warn!(provider = %provider, request_id, error = %e, "Fallback provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(primary))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
