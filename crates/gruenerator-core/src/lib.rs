//! Core of the Gruenerator dispatch engine.
//!
//! Holds the vendor-agnostic request/result types, the error taxonomy,
//! configuration loading, and the request bus used by the dispatch worker.

pub mod bus;
pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use error::DispatchError;
pub use types::{
    CanonicalRequest, ContentBlock, DispatchResult, Message, MessageContent, ProviderName,
    RequestOptions, ResolvedOptions, ResponseMetadata, Role, SamplingDefaults, StopReason,
    ToolCall, ToolChoice, ToolDefinition, Usage,
};
