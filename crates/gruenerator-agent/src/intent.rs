//! Intents and the request builder — turns one classified intent plus the
//! shared turn context into an isolated [`CanonicalRequest`].
//!
//! Intent classification itself happens upstream; this module only consumes
//! its output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gruenerator_core::error::DispatchError;
use gruenerator_core::types::{CanonicalRequest, ContentBlock, Message, RequestOptions};

// ─────────────────────────────────────────────
// Intent / BaseContext
// ─────────────────────────────────────────────

/// One classified sub-task of a chat turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// Agent / route identifier, e.g. `social` or `antrag`.
    pub agent: String,
    /// Request type to dispatch with; defaults to `agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    /// Intent-specific parameters extracted upstream.
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Intent {
    pub fn new(agent: impl Into<String>) -> Self {
        Intent {
            agent: agent.into(),
            request_type: None,
            params: Map::new(),
            confidence: default_confidence(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn request_type(&self) -> &str {
        self.request_type.as_deref().unwrap_or(&self.agent)
    }

    fn param_str(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Context shared by every intent of one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseContext {
    /// The user's original message.
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Earlier turns of the conversation, oldest first.
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub options: RequestOptions,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl BaseContext {
    pub fn new(message: impl Into<String>) -> Self {
        BaseContext {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

// ─────────────────────────────────────────────
// RequestBuilder
// ─────────────────────────────────────────────

/// Builds the canonical request for one intent.
///
/// `base` is an owned copy; implementations may consume it freely since no
/// other intent sees it.
pub trait RequestBuilder: Send + Sync {
    fn build(&self, intent: &Intent, base: BaseContext) -> Result<CanonicalRequest, DispatchError>;
}

/// Default builder.
///
/// - request type: `intent.requestType`, else the agent id
/// - user text: `params.message` when set, else the original message
/// - `params.instructions` is appended to the system prompt
/// - attachments become extra content blocks on the final user message
/// - metadata gets `userId`, `agent`, and the intent params under `intent`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRequestBuilder;

impl RequestBuilder for DefaultRequestBuilder {
    fn build(&self, intent: &Intent, base: BaseContext) -> Result<CanonicalRequest, DispatchError> {
        if intent.agent.trim().is_empty() {
            return Err(DispatchError::Config("intent has no agent".into()));
        }

        let text = intent
            .param_str("message")
            .map(str::to_string)
            .unwrap_or(base.message);
        if text.trim().is_empty() && base.attachments.is_empty() {
            return Err(DispatchError::Config(format!(
                "intent '{}' has no message",
                intent.agent
            )));
        }

        let user = if base.attachments.is_empty() {
            Message::user(text)
        } else {
            let mut blocks = Vec::with_capacity(base.attachments.len() + 1);
            if !text.trim().is_empty() {
                blocks.push(ContentBlock::text(text));
            }
            blocks.extend(base.attachments);
            Message::user_blocks(blocks)
        };

        let mut messages = base.history;
        messages.push(user);

        let system_prompt = match (base.system_prompt, intent.param_str("instructions")) {
            (Some(prompt), Some(extra)) => Some(format!("{prompt}\n\n{extra}")),
            (None, Some(extra)) => Some(extra.to_string()),
            (prompt, None) => prompt,
        };

        let mut metadata = base.metadata;
        if let Some(user_id) = base.user_id {
            metadata.insert("userId".into(), Value::String(user_id));
        }
        metadata.insert("agent".into(), Value::String(intent.agent.clone()));
        if !intent.params.is_empty() {
            metadata.insert("intent".into(), Value::Object(intent.params.clone()));
        }

        Ok(CanonicalRequest {
            request_type: intent.request_type().to_string(),
            system_prompt,
            messages,
            options: base.options,
            metadata,
            explicit_provider: None,
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
