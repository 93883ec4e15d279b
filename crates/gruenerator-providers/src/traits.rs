//! Provider adapter trait — the seam between the dispatcher and vendor HTTP clients.
//!
//! Every vendor (Claude, Mistral, IONOS, LiteLLM, Bedrock, Telekom) is reached
//! through one implementation of [`ProviderAdapter`]. Two wire families cover all
//! of them: `OpenAiCompatAdapter` and `AnthropicAdapter`.

use async_trait::async_trait;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::{CanonicalRequest, DispatchResult, ProviderName};

/// Trait that all provider adapters implement.
///
/// Adapters are stateless between calls and never retry; the retry policy and
/// the fallback chain live above them.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Execute one canonical request against the vendor.
    ///
    /// # Arguments
    /// * `request_id` — Correlation id, copied into the result metadata and logs.
    /// * `request`    — The caller's request (never modified).
    /// * `model`      — Model identifier chosen by the selector or the fallback chain.
    ///
    /// # Returns
    /// A normalized [`DispatchResult`], or a classified [`DispatchError`].
    async fn execute(
        &self,
        request_id: &str,
        request: &CanonicalRequest,
        model: &str,
    ) -> Result<DispatchResult, DispatchError>;

    /// Which provider this adapter talks to.
    fn name(&self) -> ProviderName;

    /// Model used when nothing more specific was chosen.
    fn default_model(&self) -> &str;
}
