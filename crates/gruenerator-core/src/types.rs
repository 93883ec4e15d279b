//! Canonical request/result types — the vendor-agnostic shapes of the dispatch engine.
//!
//! Callers build a [`CanonicalRequest`]; every provider adapter translates it to its
//! vendor's wire format and normalizes the reply into a [`DispatchResult`].
//! Heterogeneous message content is a tagged enum ([`ContentBlock`]) so each adapter
//! handles every block kind explicitly instead of guessing shapes at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// The closed set of supported AI providers.
///
/// Adding a vendor is a compile-time change: every `match` over this enum
/// must be extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Claude,
    Mistral,
    Ionos,
    Litellm,
    Bedrock,
    Telekom,
}

impl ProviderName {
    /// All providers, in display order.
    pub const ALL: [ProviderName; 6] = [
        ProviderName::Claude,
        ProviderName::Mistral,
        ProviderName::Ionos,
        ProviderName::Litellm,
        ProviderName::Bedrock,
        ProviderName::Telekom,
    ];

    /// Lowercase identifier used in config files and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Claude => "claude",
            ProviderName::Mistral => "mistral",
            ProviderName::Ionos => "ionos",
            ProviderName::Litellm => "litellm",
            ProviderName::Bedrock => "bedrock",
            ProviderName::Telekom => "telekom",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderName::Claude => "CLAUDE_API_KEY",
            ProviderName::Mistral => "MISTRAL_API_KEY",
            ProviderName::Ionos => "IONOS_API_TOKEN",
            ProviderName::Litellm => "LITELLM_API_KEY",
            ProviderName::Bedrock => "BEDROCK_API_KEY",
            ProviderName::Telekom => "TELEKOM_API_KEY",
        }
    }

    /// Environment variable holding this provider's base URL override.
    pub fn base_url_env(&self) -> &'static str {
        match self {
            ProviderName::Claude => "CLAUDE_BASE_URL",
            ProviderName::Mistral => "MISTRAL_BASE_URL",
            ProviderName::Ionos => "IONOS_BASE_URL",
            ProviderName::Litellm => "LITELLM_BASE_URL",
            ProviderName::Bedrock => "BEDROCK_BASE_URL",
            ProviderName::Telekom => "TELEKOM_BASE_URL",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ProviderName::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| DispatchError::Config(format!("unknown provider '{s}'")))
    }
}

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One message of a canonical conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

/// Message content — either plain text or an ordered list of blocks.
///
/// When serialized: text becomes a plain string, blocks become an array of objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single typed part of a multi-part message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        content: String,
    },
    Image {
        #[serde(rename = "mediaType")]
        media_type: String,
        /// Base64-encoded image bytes.
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Document {
        #[serde(rename = "mediaType")]
        media_type: String,
        /// Base64-encoded document bytes (either this or `url` is set).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Human-readable label of an attachment block (name, else media type).
    pub fn attachment_label(&self) -> Option<&str> {
        match self {
            ContentBlock::Image {
                name, media_type, ..
            }
            | ContentBlock::Document {
                name, media_type, ..
            } => Some(name.as_deref().unwrap_or(media_type)),
            _ => None,
        }
    }
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message with text content.
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a user message with multi-part content (text, images, documents).
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Message {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message from blocks (e.g. text + tool_use).
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create a tool result message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            role: Role::Tool,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_call_id: tool_call_id.into(),
                content: content.into(),
            }]),
        }
    }

    /// Content as a list of blocks (plain text becomes a single text block).
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match &self.content {
            MessageContent::Text(text) => vec![ContentBlock::text(text.clone())],
            MessageContent::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// Vendor-neutral tool/function definition.
///
/// The tool-payload preparer converts this into each vendor's schema shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON-schema-like parameter spec: `{"type": "object", "properties": {...}}`.
    #[serde(default)]
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Number of declared parameters (keys under `properties`).
    pub fn parameter_count(&self) -> usize {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .map_or(0, |props| props.len())
    }
}

/// How the model may pick tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Tool { name: String },
}

/// A model-issued request to call a tool, normalized across vendors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

// ─────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────

/// Sampling parameters used as defaults (global or per content profile).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplingDefaults {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 4096,
        }
    }
}

/// Caller-declared request options. Immutable; see [`RequestOptions::resolve`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxTokens")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "topP")]
    pub top_p: Option<f64>,
    /// Model override for the selected provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, rename = "useProMode")]
    pub use_pro_mode: bool,
    #[serde(default, rename = "useUltraMode")]
    pub use_ultra_mode: bool,
    #[serde(default, rename = "useBedrock")]
    pub use_bedrock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "toolChoice")]
    pub tool_choice: Option<ToolChoice>,
}

/// Concrete sampling values after merging caller, profile, and global defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl RequestOptions {
    /// Whether any tool definitions were supplied.
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Merge sampling values: caller > type-profile default > global default.
    pub fn resolve(
        &self,
        profile: Option<&SamplingDefaults>,
        global: &SamplingDefaults,
    ) -> ResolvedOptions {
        let base = profile.unwrap_or(global);
        ResolvedOptions {
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
        }
    }
}

// ─────────────────────────────────────────────
// Canonical request
// ─────────────────────────────────────────────

/// One logical AI call, as supplied by the upstream caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRequest {
    /// Content category (e.g. `"social"`, `"antrag"`, `"sharepic_dreizeilen"`).
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub options: RequestOptions,
    /// Open caller metadata; seeds the result metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// When set, bypasses provider selection and is honored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_provider: Option<String>,
}

impl CanonicalRequest {
    /// Create a request of the given type.
    pub fn new(request_type: impl Into<String>, messages: Vec<Message>) -> Self {
        CanonicalRequest {
            request_type: request_type.into(),
            system_prompt: None,
            messages,
            options: RequestOptions::default(),
            metadata: Map::new(),
            explicit_provider: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_explicit_provider(mut self, provider: impl Into<String>) -> Self {
        self.explicit_provider = Some(provider.into());
        self
    }
}

// ─────────────────────────────────────────────
// Dispatch result
// ─────────────────────────────────────────────

/// Canonical termination cause of a generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    Stop,
    ToolUse,
    Length,
    ContentFilter,
    Error,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Stop => "stop",
            StopReason::ToolUse => "tool_use",
            StopReason::Length => "length",
            StopReason::ContentFilter => "content_filter",
            StopReason::Error => "error",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage statistics reported by the vendor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Open metadata map attached to every result.
///
/// Seeded from the caller's metadata, then overlaid with provider fields.
/// Every merge is last-write-wins per key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseMetadata(Map<String, Value>);

impl ResponseMetadata {
    /// Start from a copy of the caller's metadata.
    pub fn seeded(caller: &Map<String, Value>) -> Self {
        ResponseMetadata(caller.clone())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overlay `other` onto this map (last write wins).
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (key, value) in other {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Overlay the standard provider fields.
    pub fn with_provider_fields(
        mut self,
        provider: ProviderName,
        model: &str,
        request_id: &str,
        usage: Option<Usage>,
    ) -> Self {
        self.insert("provider", provider.as_str());
        self.insert("model", model);
        self.insert("requestId", request_id);
        self.insert("timestamp", chrono::Utc::now().to_rfc3339());
        if let Some(usage) = usage {
            self.insert(
                "usage",
                serde_json::to_value(usage).unwrap_or(Value::Null),
            );
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn provider(&self) -> Option<&str> {
        self.0.get("provider").and_then(Value::as_str)
    }

    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(Value::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.0.get("requestId").and_then(Value::as_str)
    }

    pub fn usage(&self) -> Option<Usage> {
        self.0
            .get("usage")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Normalized outcome of one completed dispatch.
///
/// Never mutated after it is returned; use [`DispatchResult::with_metadata`]
/// to derive an enriched copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub content: Option<String>,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub raw_content_blocks: Vec<ContentBlock>,
    pub success: bool,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl DispatchResult {
    /// Build a successful result from normalized vendor output.
    pub fn new(
        content: Option<String>,
        stop_reason: StopReason,
        tool_calls: Vec<ToolCall>,
        raw_content_blocks: Vec<ContentBlock>,
        metadata: ResponseMetadata,
    ) -> Self {
        DispatchResult {
            content,
            stop_reason,
            tool_calls,
            raw_content_blocks,
            success: true,
            metadata,
        }
    }

    /// Whether the result contains tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// A result is usable when it carries non-blank text or signals tool use.
    ///
    /// Unusable results trigger the fallback chain just like errors do.
    pub fn is_usable(&self) -> bool {
        let has_text = self
            .content
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        has_text || self.stop_reason == StopReason::ToolUse
    }

    /// Check the result contract: `tool_use` needs tool calls, anything else needs content.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.stop_reason == StopReason::ToolUse {
            if self.tool_calls.is_empty() {
                return Err(DispatchError::InvalidResult(
                    "stop_reason is tool_use but no tool calls were returned".into(),
                ));
            }
        } else if self.content.is_none() {
            return Err(DispatchError::InvalidResult(format!(
                "stop_reason is {} but content is missing",
                self.stop_reason
            )));
        }
        Ok(())
    }

    /// Derive a copy with `extra` merged into the metadata (last write wins).
    pub fn with_metadata(mut self, extra: &Map<String, Value>) -> Self {
        self.metadata.merge(extra);
        self
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
