//! Dispatch error taxonomy.
//!
//! | class                  | retried | falls back |
//! |------------------------|---------|------------|
//! | `Transport`            | yes     | yes        |
//! | `Rejected`/`Auth`/`ContentPolicy` | no | yes  |
//! | `MalformedResponse`    | no      | yes        |
//! | `UnusableResult`       | no      | yes        |
//! | `Config`               | no      | no         |
//! | `InvalidResult`        | no      | no         |

use thiserror::Error;

use crate::types::ProviderName;

/// Errors raised by adapters, the retry policy, the fallback chain, and the dispatcher.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DispatchError {
    /// Connection reset, connect/fetch failure, local timeout, or a vendor gateway error.
    #[error("{provider} transport error: {message}")]
    Transport {
        provider: ProviderName,
        message: String,
    },

    /// The vendor refused the request (non-2xx other than auth/gateway).
    #[error("{provider} rejected the request ({status}): {message}")]
    Rejected {
        provider: ProviderName,
        status: u16,
        message: String,
    },

    #[error("{provider} authentication failed ({status}): {message}")]
    Auth {
        provider: ProviderName,
        status: u16,
        message: String,
    },

    /// Vendor-declared content-policy block.
    #[error("{provider} blocked the content: {message}")]
    ContentPolicy {
        provider: ProviderName,
        message: String,
    },

    /// Empty or unparsable vendor payload.
    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse {
        provider: ProviderName,
        message: String,
    },

    /// A successful call with neither text nor a tool-use signal.
    #[error("{provider} returned no usable content")]
    UnusableResult { provider: ProviderName },

    /// Missing API key or unknown provider name. Every provider would fail the same way.
    #[error("configuration error: {0}")]
    Config(String),

    /// The final result broke the result contract.
    #[error("invalid dispatch result: {0}")]
    InvalidResult(String),
}

impl DispatchError {
    /// Only transport failures are worth retrying against the same provider.
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Transport { .. })
    }

    /// Whether another provider might succeed where this one failed.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(
            self,
            DispatchError::Config(_) | DispatchError::InvalidResult(_)
        )
    }

    /// Provider that produced the error, if any.
    pub fn provider(&self) -> Option<ProviderName> {
        match self {
            DispatchError::Transport { provider, .. }
            | DispatchError::Rejected { provider, .. }
            | DispatchError::Auth { provider, .. }
            | DispatchError::ContentPolicy { provider, .. }
            | DispatchError::MalformedResponse { provider, .. }
            | DispatchError::UnusableResult { provider } => Some(*provider),
            DispatchError::Config(_) | DispatchError::InvalidResult(_) => None,
        }
    }

    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Transport { .. } => "transport",
            DispatchError::Rejected { .. } => "rejected",
            DispatchError::Auth { .. } => "auth",
            DispatchError::ContentPolicy { .. } => "content_policy",
            DispatchError::MalformedResponse { .. } => "malformed_response",
            DispatchError::UnusableResult { .. } => "unusable_result",
            DispatchError::Config(_) => "config",
            DispatchError::InvalidResult(_) => "invalid_result",
        }
    }
}
