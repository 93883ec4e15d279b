//! Adapter for the Anthropic messages format.
//!
//! Two vendors speak it:
//! - **claude**: `POST {base}/v1/messages` with `x-api-key` + `anthropic-version`
//! - **bedrock**: `POST {base}/model/{model}/invoke` with bearer auth; the model
//!   lives in the URL and the body carries `anthropic_version` instead
//!
//! Content blocks are sent natively. System messages are folded into the
//! top-level `system` field, `tool` role messages become user `tool_result`
//! blocks, and consecutive messages of the same role are merged so the
//! conversation alternates.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use gruenerator_core::config::schema::ProviderConfig;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::{
    CanonicalRequest, ContentBlock, DispatchResult, ProviderName, ResponseMetadata, Role,
    SamplingDefaults, StopReason, ToolCall, Usage,
};

use crate::http::{send_json, Endpoint};
use crate::registry::{find_by_name, ProviderSpec, WireFormat};
use crate::tool_payload;
use crate::traits::ProviderAdapter;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

// ─────────────────────────────────────────────
// AnthropicAdapter
// ─────────────────────────────────────────────

#[derive(Debug)]
pub struct AnthropicAdapter {
    spec: &'static ProviderSpec,
    endpoint: Endpoint,
    defaults: SamplingDefaults,
}

impl AnthropicAdapter {
    pub fn new(
        name: ProviderName,
        config: &ProviderConfig,
        client: reqwest::Client,
        defaults: SamplingDefaults,
    ) -> Self {
        AnthropicAdapter {
            spec: find_by_name(name),
            endpoint: Endpoint::from_config(name, config, client),
            defaults,
        }
    }

    fn is_bedrock(&self) -> bool {
        self.spec.wire == WireFormat::BedrockInvoke
    }

    fn messages_url(&self, model: &str) -> String {
        if self.is_bedrock() {
            self.endpoint.url(&format!("model/{model}/invoke"))
        } else {
            self.endpoint.url("v1/messages")
        }
    }

    fn build_body(&self, request_id: &str, request: &CanonicalRequest, model: &str) -> Value {
        let resolved = request.options.resolve(None, &self.defaults);
        let (system, messages) = to_wire_messages(request);

        let mut body = Map::new();
        if self.is_bedrock() {
            body.insert("anthropic_version".into(), json!(BEDROCK_ANTHROPIC_VERSION));
        } else {
            body.insert("model".into(), json!(model));
        }
        body.insert("max_tokens".into(), json!(resolved.max_tokens));
        body.insert("temperature".into(), json!(resolved.temperature));
        // top_p only when the caller set it
        if let Some(top_p) = request.options.top_p {
            body.insert("top_p".into(), json!(top_p));
        }
        if let Some(system) = system {
            body.insert("system".into(), json!(system));
        }
        body.insert("messages".into(), Value::Array(messages));

        tool_payload::prepare(
            &request.options,
            self.spec.name,
            request_id,
            &request.request_type,
        )
        .apply_to(&mut body);

        Value::Object(body)
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn execute(
        &self,
        request_id: &str,
        request: &CanonicalRequest,
        model: &str,
    ) -> Result<DispatchResult, DispatchError> {
        let body = self.build_body(request_id, request, model);

        debug!(
            provider = self.spec.display_name,
            request_id,
            model,
            request_type = %request.request_type,
            messages = request.messages.len(),
            "Calling provider"
        );

        let mut builder = self
            .endpoint
            .client
            .post(self.messages_url(model))
            .headers(self.endpoint.extra_headers.clone());
        builder = if self.is_bedrock() {
            builder.bearer_auth(&self.endpoint.api_key)
        } else {
            builder
                .header("x-api-key", &self.endpoint.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
        };

        let raw = send_json(self.spec.name, request_id, builder.json(&body)).await?;
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

/// Split the canonical conversation into the `system` text and Anthropic messages.
fn to_wire_messages(request: &CanonicalRequest) -> (Option<String>, Vec<Value>) {
    let mut system_parts: Vec<String> = request
        .system_prompt
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();
    let mut messages: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for message in &request.messages {
        let role = match message.role {
            Role::System => {
                system_parts.push(message.text());
                continue;
            }
            Role::Assistant => "assistant",
            Role::User | Role::Tool => "user",
        };

        let blocks: Vec<Value> = message.blocks().iter().filter_map(wire_block).collect();
        if blocks.is_empty() {
            continue;
        }
        match messages.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => messages.push((role, blocks)),
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    let messages = messages
        .into_iter()
        .map(|(role, content)| json!({"role": role, "content": content}))
        .collect();
    (system, messages)
}

fn wire_block(block: &ContentBlock) -> Option<Value> {
    let value = match block {
        ContentBlock::Text { text } if text.is_empty() => return None,
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolUse { id, name, input } => {
            json!({"type": "tool_use", "id": id, "name": name, "input": input})
        }
        ContentBlock::ToolResult {
            tool_call_id,
            content,
        } => json!({"type": "tool_result", "tool_use_id": tool_call_id, "content": content}),
        ContentBlock::Image {
            media_type, data, ..
        } => json!({
            "type": "image",
            "source": {"type": "base64", "media_type": media_type, "data": data},
        }),
        ContentBlock::Document {
            media_type,
            data,
            url,
            ..
        } => {
            let source = match (data, url) {
                (Some(data), _) => {
                    json!({"type": "base64", "media_type": media_type, "data": data})
                }
                (None, Some(url)) => json!({"type": "url", "url": url}),
                (None, None) => return None,
            };
            json!({"type": "document", "source": source})
        }
    };
    Some(value)
}

// ─────────────────────────────────────────────
// Response normalization
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn normalize_response(
    provider: ProviderName,
    request_id: &str,
    model: &str,
    request: &CanonicalRequest,
    raw: Value,
) -> Result<DispatchResult, DispatchError> {
    let parsed: MessagesResponse =
        serde_json::from_value(raw).map_err(|e| DispatchError::MalformedResponse {
            provider,
            message: format!("unexpected response shape: {e}"),
        })?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut raw_blocks = Vec::new();

    for block in &parsed.content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                texts.push(text.to_string());
                raw_blocks.push(ContentBlock::text(text));
            }
            Some("tool_use") => {
                let call = ToolCall {
                    id: block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: block
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    input: block.get("input").cloned().unwrap_or_else(|| json!({})),
                };
                raw_blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                });
                tool_calls.push(call);
            }
            // thinking, redacted_thinking, server tool blocks
            _ => {}
        }
    }

    let content = (!texts.is_empty()).then(|| texts.concat());
    let stop_reason = match parsed.stop_reason.as_deref() {
        Some("tool_use") if !tool_calls.is_empty() => StopReason::ToolUse,
        Some("max_tokens") => StopReason::Length,
        Some("refusal") => {
            return Err(DispatchError::ContentPolicy {
                provider,
                message: "the model refused to answer".into(),
            });
        }
        _ if !tool_calls.is_empty() => StopReason::ToolUse,
        _ => StopReason::Stop,
    };

    let usage = parsed
        .usage
        .map(|u| Usage::new(u.input_tokens, u.output_tokens));
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

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gruenerator_core::types::{Message, RequestOptions, ToolChoice, ToolDefinition};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(name: ProviderName, base: &str) -> AnthropicAdapter {
        let config = ProviderConfig {
            api_key: "sk-ant-test".into(),
            api_base: Some(base.to_string()),
            ..Default::default()
        };
        AnthropicAdapter::new(name, &config, reqwest::Client::new(), SamplingDefaults::default())
    }

    fn antrag_request() -> CanonicalRequest {
        CanonicalRequest::new("antrag", vec![Message::user("Antrag für mehr Radwege")])
            .with_system_prompt("Du schreibst kommunalpolitische Anträge.")
    }

    #[test]
    fn test_urls() {
        let claude = adapter(ProviderName::Claude, "https://api.anthropic.com/");
        assert_eq!(
            claude.messages_url("claude-sonnet-4-20250514"),
            "https://api.anthropic.com/v1/messages"
        );
        let bedrock = adapter(ProviderName::Bedrock, "https://bedrock.example");
        assert_eq!(
            bedrock.messages_url("eu.anthropic.claude-v1:0"),
            "https://bedrock.example/model/eu.anthropic.claude-v1:0/invoke"
        );
    }

    #[test]
    fn test_system_messages_fold_into_system_field() {
        let mut request = antrag_request();
        request.messages.insert(0, Message::system("Antworte auf Deutsch."));
        let (system, messages) = to_wire_messages(&request);
        assert_eq!(
            system.as_deref(),
            Some("Du schreibst kommunalpolitische Anträge.\n\nAntworte auf Deutsch.")
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_tool_role_becomes_user_tool_result_and_merges() {
        let request = CanonicalRequest::new(
            "antrag",
            vec![
                Message::user("Suche im Programm"),
                Message::assistant_blocks(vec![ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "search_programme".into(),
                    input: json!({"query": "Radwege"}),
                }]),
                Message::tool_result("toolu_1", "Radwege ausbauen."),
                Message::user("Und jetzt den Antrag, bitte."),
            ],
        );
        let (_, messages) = to_wire_messages(&request);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[2]["content"][1]["text"], "Und jetzt den Antrag, bitte.");
    }

    #[test]
    fn test_native_image_and_document_blocks() {
        let image = wire_block(&ContentBlock::Image {
            media_type: "image/jpeg".into(),
            data: "abc".into(),
            name: None,
        })
        .unwrap();
        assert_eq!(image["source"]["type"], "base64");

        let doc = wire_block(&ContentBlock::Document {
            media_type: "application/pdf".into(),
            data: None,
            url: Some("https://example.org/a.pdf".into()),
            name: None,
        })
        .unwrap();
        assert_eq!(doc["source"], json!({"type": "url", "url": "https://example.org/a.pdf"}));
    }

    #[test]
    fn test_bedrock_body_carries_version_not_model() {
        let bedrock = adapter(ProviderName::Bedrock, "http://localhost");
        let body = bedrock.build_body("r", &antrag_request(), "some-model");
        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert!(body.get("model").is_none());
        assert!(body.get("top_p").is_none());
        assert_eq!(body["max_tokens"], 4096);

        let claude = adapter(ProviderName::Claude, "http://localhost");
        let body = claude.build_body("r", &antrag_request(), "claude-x");
        assert_eq!(body["model"], "claude-x");
        assert!(body.get("anthropic_version").is_none());
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_claude_execute_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-20250514",
                "system": "Du schreibst kommunalpolitische Anträge."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "content": [{"type": "text", "text": "Antrag: Sichere Radwege für alle"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 30, "output_tokens": 12}
            })))
            .mount(&mock_server)
            .await;

        let claude = adapter(ProviderName::Claude, &mock_server.uri());
        let result = claude
            .execute("req-7", &antrag_request(), "claude-sonnet-4-20250514")
            .await
            .unwrap();

        assert_eq!(result.content.as_deref(), Some("Antrag: Sichere Radwege für alle"));
        assert_eq!(result.stop_reason, StopReason::Stop);
        assert_eq!(result.metadata.provider(), Some("claude"));
        assert_eq!(result.metadata.usage().unwrap(), Usage::new(30, 12));
    }

    #[tokio::test]
    async fn test_bedrock_execute_tool_use() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/model/bedrock-model/invoke"))
            .and(header("Authorization", "Bearer sk-ant-test"))
            .and(body_partial_json(json!({"tool_choice": {"type": "any"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "tool_use", "id": "toolu_9", "name": "search_programme", "input": {"query": "Kita"}}
                ],
                "stop_reason": "tool_use"
            })))
            .mount(&mock_server)
            .await;

        let bedrock = adapter(ProviderName::Bedrock, &mock_server.uri());
        let request = antrag_request().with_options(RequestOptions {
            tools: Some(vec![ToolDefinition::new(
                "search_programme",
                "Search",
                json!({"type": "object", "properties": {"query": {"type": "string"}}}),
            )]),
            tool_choice: Some(ToolChoice::Required),
            ..Default::default()
        });

        let result = bedrock.execute("r", &request, "bedrock-model").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::ToolUse);
        assert!(result.content.is_none());
        assert_eq!(result.tool_calls[0].input, json!({"query": "Kita"}));
        assert!(result.validate().is_ok());
    }

    #[tokio::test]
    async fn test_max_tokens_maps_to_length() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Teil"}],
                "stop_reason": "max_tokens"
            })))
            .mount(&mock_server)
            .await;

        let claude = adapter(ProviderName::Claude, &mock_server.uri());
        let result = claude.execute("r", &antrag_request(), "m").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::Length);
    }

    #[tokio::test]
    async fn test_refusal_is_content_policy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [],
                "stop_reason": "refusal"
            })))
            .mount(&mock_server)
            .await;

        let claude = adapter(ProviderName::Claude, &mock_server.uri());
        let err = claude.execute("r", &antrag_request(), "m").await.unwrap_err();
        assert!(matches!(err, DispatchError::ContentPolicy { .. }));
    }

    #[tokio::test]
    async fn test_overloaded_is_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&mock_server)
            .await;

        let claude = adapter(ProviderName::Claude, &mock_server.uri());
        let err = claude.execute("r", &antrag_request(), "m").await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::Rejected {
                provider: ProviderName::Claude,
                status: 529,
                message: "Overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn test_forbidden_is_auth() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&mock_server)
            .await;

        let bedrock = adapter(ProviderName::Bedrock, &mock_server.uri());
        let err = bedrock.execute("r", &antrag_request(), "m").await.unwrap_err();
        assert!(matches!(err, DispatchError::Auth { status: 403, .. }));
    }
}
