//! Provider layer for Gruenerator.
//!
//! Turns a [`CanonicalRequest`](gruenerator_core::CanonicalRequest) into a
//! normalized [`DispatchResult`](gruenerator_core::DispatchResult) against one
//! of several LLM vendors.
//!
//! # Architecture
//!
//! - [`selector::ProviderSelector`] — picks provider and model per request
//! - [`profiles`] — sampling defaults per content type
//! - [`tool_payload`] — vendor-specific tool and tool-choice encoding
//! - [`openai_compat`] / [`anthropic`] — the adapters behind [`traits::ProviderAdapter`]
//! - [`retry::RetryPolicy`] — bounded backoff for transient failures
//! - [`fallback::FallbackChain`] — alternate providers after the primary fails
//! - [`dispatcher::Dispatcher`] — ties it all together

pub mod anthropic;
pub mod dispatcher;
pub mod fallback;
pub mod http;
pub mod metrics;
pub mod openai_compat;
pub mod profiles;
pub mod registry;
pub mod retry;
pub mod selector;
pub mod tool_payload;
pub mod traits;

// Re-export main types for convenience
pub use dispatcher::{AdapterSet, DispatchService, Dispatcher};
pub use fallback::FallbackChain;
pub use metrics::{ConnectionMetrics, MetricsSink, MetricsSnapshot, NoopMetrics};
pub use registry::{ProviderSpec, WireFormat, PROVIDERS};
pub use retry::RetryPolicy;
pub use selector::{ProviderSelection, ProviderSelector};
pub use traits::ProviderAdapter;
