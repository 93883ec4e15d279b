//! Adapter for OpenAI-compatible `/chat/completions` APIs.
//!
//! Covers: Mistral, IONOS AI Model Hub, LiteLLM, Telekom LLM Hub.
//!
//! Canonical messages are flattened into the OpenAI message list: the system
//! prompt leads, images become `image_url` data URIs where the vendor accepts
//! them (otherwise a text placeholder), documents always become a placeholder,
//! `tool_use` blocks become assistant `tool_calls`, and `tool_result` blocks
//! become `role: tool` messages. A tool message carrying anything other than
//! `tool_result` blocks has no `tool_call_id` to send and is rejected.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use gruenerator_core::config::schema::ProviderConfig;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::{
    CanonicalRequest, ContentBlock, DispatchResult, Message, ProviderName, ResponseMetadata,
    Role, SamplingDefaults, StopReason, ToolCall, Usage,
};

use crate::http::{send_json, Endpoint};
use crate::profiles::profile_for;
use crate::registry::{find_by_name, ProviderSpec};
use crate::tool_payload;
use crate::traits::ProviderAdapter;

// ─────────────────────────────────────────────
// OpenAiCompatAdapter
// ─────────────────────────────────────────────

/// A provider adapter for any OpenAI-compatible chat completions endpoint.
#[derive(Debug)]
pub struct OpenAiCompatAdapter {
    spec: &'static ProviderSpec,
    endpoint: Endpoint,
    /// Global sampling defaults (lowest precedence).
    defaults: SamplingDefaults,
}

impl OpenAiCompatAdapter {
    pub fn new(
        name: ProviderName,
        config: &ProviderConfig,
        client: reqwest::Client,
        defaults: SamplingDefaults,
    ) -> Self {
        OpenAiCompatAdapter {
            spec: find_by_name(name),
            endpoint: Endpoint::from_config(name, config, client),
            defaults,
        }
    }

    fn completions_url(&self) -> String {
        self.endpoint.url("chat/completions")
    }

    /// Build the JSON request body.
    fn build_body(
        &self,
        request_id: &str,
        request: &CanonicalRequest,
        model: &str,
    ) -> Result<Value, DispatchError> {
        let profile = profile_for(&request.request_type);
        let resolved = request.options.resolve(profile.as_ref(), &self.defaults);

        let mut body = Map::new();
        body.insert("model".into(), json!(model));
        body.insert(
            "messages".into(),
            Value::Array(to_wire_messages(request, self.spec)?),
        );
        body.insert("temperature".into(), json!(resolved.temperature));
        body.insert("top_p".into(), json!(resolved.top_p));
        body.insert("max_tokens".into(), json!(resolved.max_tokens));

        tool_payload::prepare(
            &request.options,
            self.spec.name,
            request_id,
            &request.request_type,
        )
        .apply_to(&mut body);

        Ok(Value::Object(body))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    async fn execute(
        &self,
        request_id: &str,
        request: &CanonicalRequest,
        model: &str,
    ) -> Result<DispatchResult, DispatchError> {
        let body = self.build_body(request_id, request, model)?;

        debug!(
            provider = self.spec.display_name,
            request_id,
            model,
            request_type = %request.request_type,
            messages = request.messages.len(),
            "Calling provider"
        );

        let builder = self
            .endpoint
            .client
            .post(self.completions_url())
            .bearer_auth(&self.endpoint.api_key)
            .headers(self.endpoint.extra_headers.clone())
            .json(&body);

        let raw = send_json(self.spec.name, request_id, builder).await?;
        let result = normalize_response(self.spec.name, request_id, model, request, raw)?;

        debug!(
            provider = self.spec.display_name,
            request_id,
            stop_reason = %result.stop_reason,
            tool_calls = result.tool_calls.len(),
            "Provider response received"
        );
        Ok(result)
    }

    fn name(&self) -> ProviderName {
        self.spec.name
    }

    fn default_model(&self) -> &str {
        &self.endpoint.default_model
    }
}

// ─────────────────────────────────────────────
// Request translation
// ─────────────────────────────────────────────

/// Translate the canonical conversation into OpenAI chat messages.
fn to_wire_messages(
    request: &CanonicalRequest,
    spec: &ProviderSpec,
) -> Result<Vec<Value>, DispatchError> {
    let mut out = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
        out.push(json!({"role": "system", "content": system}));
    }

    for message in &request.messages {
        match message.role {
            Role::System => out.push(json!({"role": "system", "content": message.text()})),
            Role::Assistant => out.push(assistant_message(message)),
            Role::Tool => {
                let blocks = message.blocks();
                if blocks
                    .iter()
                    .any(|b| !matches!(b, ContentBlock::ToolResult { .. }))
                {
                    return Err(DispatchError::Config(format!(
                        "{} tool message has content without a tool_call_id",
                        spec.display_name
                    )));
                }
                push_user_or_tool(&mut out, message, spec);
            }
            Role::User => push_user_or_tool(&mut out, message, spec),
        }
    }
    Ok(out)
}

fn assistant_message(message: &Message) -> Value {
    let blocks = message.blocks();
    let text = join_text(&blocks);
    let tool_calls: Vec<Value> = blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some(json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": input.to_string()},
            })),
            _ => None,
        })
        .collect();

    let mut msg = Map::new();
    msg.insert("role".into(), json!("assistant"));
    if tool_calls.is_empty() {
        msg.insert("content".into(), json!(text));
    } else {
        msg.insert(
            "content".into(),
            if text.is_empty() { Value::Null } else { json!(text) },
        );
        msg.insert("tool_calls".into(), Value::Array(tool_calls));
    }
    Value::Object(msg)
}

/// User content is flattened into text/image parts; tool results split out into `role: tool`.
fn push_user_or_tool(out: &mut Vec<Value>, message: &Message, spec: &ProviderSpec) {
    let mut parts: Vec<Value> = Vec::new();
    let mut has_image = false;

    for block in message.blocks() {
        match block {
            ContentBlock::ToolResult {
                tool_call_id,
                content,
            } => out.push(json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            })),
            ContentBlock::Text { text } => parts.push(json!({"type": "text", "text": text})),
            ContentBlock::Image {
                ref media_type,
                ref data,
                ..
            } if spec.supports_images => {
                has_image = true;
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": format!("data:{media_type};base64,{data}")},
                }));
            }
            ContentBlock::Image { .. } => parts.push(json!({
                "type": "text",
                "text": format!("[Bild: {}]", block.attachment_label().unwrap_or("Bild")),
            })),
            ContentBlock::Document { .. } => parts.push(json!({
                "type": "text",
                "text": format!("[Dokument: {}]", block.attachment_label().unwrap_or("Dokument")),
            })),
            ContentBlock::ToolUse { name, .. } => {
                warn!(tool = %name, "Dropping tool_use block found in a user message");
            }
        }
    }

    if parts.is_empty() {
        return;
    }

    let content = if has_image {
        Value::Array(parts)
    } else {
        let text: Vec<&str> = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        json!(text.join("\n"))
    };
    out.push(json!({"role": "user", "content": content}));
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ─────────────────────────────────────────────
// Response normalization
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    /// A string, or (Mistral reasoning models) an array of typed chunks.
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// Usually a JSON string; some vendors send an object.
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn normalize_response(
    provider: ProviderName,
    request_id: &str,
    model: &str,
    request: &CanonicalRequest,
    raw: Value,
) -> Result<DispatchResult, DispatchError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_value(raw).map_err(|e| DispatchError::MalformedResponse {
            provider,
            message: format!("unexpected response shape: {e}"),
        })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DispatchError::MalformedResponse {
            provider,
            message: "response contained no choices".into(),
        })?;

    let content = choice.message.content.as_ref().and_then(content_text);
    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, call)| ToolCall {
            id: call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{request_id}_{i}")),
            name: call.function.name,
            input: parse_arguments(call.function.arguments),
        })
        .collect();

    let has_text = content.as_deref().is_some_and(|c| !c.trim().is_empty());
    let stop_reason = match choice.finish_reason.as_deref() {
        _ if !tool_calls.is_empty() => StopReason::ToolUse,
        Some("length" | "model_length") => StopReason::Length,
        Some("content_filter") if !has_text => {
            return Err(DispatchError::ContentPolicy {
                provider,
                message: "response withheld by the vendor's content filter".into(),
            });
        }
        Some("content_filter") => StopReason::ContentFilter,
        _ => StopReason::Stop,
    };

    let mut raw_blocks = Vec::new();
    if let Some(text) = content.as_deref().filter(|_| has_text) {
        raw_blocks.push(ContentBlock::text(text));
    }
    raw_blocks.extend(tool_calls.iter().map(|c| ContentBlock::ToolUse {
        id: c.id.clone(),
        name: c.name.clone(),
        input: c.input.clone(),
    }));

    let usage = parsed
        .usage
        .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens));
    let metadata = ResponseMetadata::seeded(&request.metadata)
        .with_provider_fields(provider, model, request_id, usage);

    Ok(DispatchResult::new(
        content,
        stop_reason,
        tool_calls,
        raw_blocks,
        metadata,
    ))
}

/// Text of a message `content`: a plain string, or the `text` chunks of an array.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(chunks) => {
            let text: Vec<&str> = chunks
                .iter()
                .filter(|c| c.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|c| c.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then(|| text.concat())
        }
        _ => None,
    }
}

fn parse_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) if s.trim().is_empty() => json!({}),
        Value::String(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!(error = %e, "Tool arguments are not valid JSON, keeping the raw string");
            Value::String(s)
        }),
        Value::Null => json!({}),
        other => other,
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
