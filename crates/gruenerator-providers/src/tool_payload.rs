//! Tool-payload preparer — converts generic tool definitions into each vendor's schema.
//!
//! | provider          | tool shape                                   | tool_choice                         |
//! |-------------------|----------------------------------------------|-------------------------------------|
//! | claude, bedrock   | `{name, description, input_schema}`          | `{type: auto\|any\|none\|tool, name?}` |
//! | mistral           | `{type: function, function: {...}}`          | `"auto"\|"none"\|"any"` or object      |
//! | ionos, litellm    | `{type: function, function: {...}}`          | `"auto"\|"none"\|"required"` or object |
//! | telekom           | not forwarded                                | not forwarded                       |

use serde_json::{json, Map, Value};
use tracing::debug;

use gruenerator_core::types::{ProviderName, RequestOptions, ToolChoice, ToolDefinition};

/// Vendor-shaped tool fields, ready to be merged into a request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolPayload {
    pub tools: Option<Value>,
    pub tool_choice: Option<Value>,
}

impl ToolPayload {
    pub fn is_empty(&self) -> bool {
        self.tools.is_none() && self.tool_choice.is_none()
    }

    /// Insert the non-empty fields into a JSON request body.
    pub fn apply_to(self, body: &mut Map<String, Value>) {
        if let Some(tools) = self.tools {
            body.insert("tools".into(), tools);
        }
        if let Some(choice) = self.tool_choice {
            body.insert("tool_choice".into(), choice);
        }
    }
}

/// Build the tool payload for `provider`. Never fails; no tools yields an empty payload.
pub fn prepare(
    options: &RequestOptions,
    provider: ProviderName,
    request_id: &str,
    request_type: &str,
) -> ToolPayload {
    if !options.has_tools() {
        return ToolPayload::default();
    }
    let tools = options.tools.as_deref().unwrap_or_default();

    let payload = match provider {
        ProviderName::Claude | ProviderName::Bedrock => ToolPayload {
            tools: Some(Value::Array(tools.iter().map(anthropic_tool).collect())),
            tool_choice: options.tool_choice.as_ref().map(anthropic_choice),
        },
        ProviderName::Mistral => ToolPayload {
            tools: Some(Value::Array(tools.iter().map(function_tool).collect())),
            tool_choice: Some(mistral_choice(
                options.tool_choice.as_ref().unwrap_or(&ToolChoice::Auto),
            )),
        },
        ProviderName::Ionos | ProviderName::Litellm => ToolPayload {
            tools: Some(Value::Array(tools.iter().map(function_tool).collect())),
            tool_choice: Some(openai_choice(
                options.tool_choice.as_ref().unwrap_or(&ToolChoice::Auto),
            )),
        },
        ProviderName::Telekom => {
            debug!(
                provider = %provider,
                request_id,
                tools = tools.len(),
                "Provider has no tool support, dropping tool definitions"
            );
            return ToolPayload::default();
        }
    };

    debug!(
        provider = %provider,
        request_id,
        request_type,
        tools = tools.len(),
        parameters = tools.iter().map(ToolDefinition::parameter_count).sum::<usize>(),
        "Prepared tool payload"
    );
    payload
}

fn object_schema(tool: &ToolDefinition) -> Value {
    if tool.parameters.is_object() {
        tool.parameters.clone()
    } else {
        json!({"type": "object", "properties": {}})
    }
}

fn anthropic_tool(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": object_schema(tool),
    })
}

fn function_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": object_schema(tool),
        }
    })
}

fn anthropic_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::None => json!({"type": "none"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Tool { name } => json!({"type": "tool", "name": name}),
    }
}

fn mistral_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Required => json!("any"),
        other => openai_choice(other),
    }
}

fn openai_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with(choice: Option<ToolChoice>) -> RequestOptions {
        RequestOptions {
            tools: Some(vec![ToolDefinition::new(
                "search_programme",
                "Search the party programme",
                json!({"type": "object", "properties": {"query": {"type": "string"}}}),
            )]),
            tool_choice: choice,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_tools_yields_empty_payload() {
        for provider in ProviderName::ALL {
            let payload = prepare(&RequestOptions::default(), provider, "r-1", "social");
            assert!(payload.is_empty());
        }
        let empty = RequestOptions {
            tools: Some(vec![]),
            ..Default::default()
        };
        assert!(prepare(&empty, ProviderName::Mistral, "r-1", "social").is_empty());
    }

    #[test]
    fn test_anthropic_shape() {
        let payload = prepare(
            &options_with(Some(ToolChoice::Required)),
            ProviderName::Claude,
            "r-1",
            "antrag",
        );
        let tools = payload.tools.unwrap();
        assert_eq!(tools[0]["name"], "search_programme");
        assert_eq!(tools[0]["input_schema"]["type"], "object");
        assert!(tools[0].get("function").is_none());
        assert_eq!(payload.tool_choice, Some(json!({"type": "any"})));
    }

    #[test]
    fn test_name_and_parameters_survive_both_shapes() {
        let options = RequestOptions {
            tools: Some(vec![ToolDefinition::new(
                "create_sharepic",
                "Render a sharepic",
                json!({
                    "type": "object",
                    "properties": {"headline": {"type": "string"}, "theme": {"type": "string"}},
                    "required": ["headline"]
                }),
            )]),
            ..Default::default()
        };

        let claude = prepare(&options, ProviderName::Claude, "r-1", "sharepic").tools.unwrap();
        let ionos = prepare(&options, ProviderName::Ionos, "r-1", "sharepic").tools.unwrap();

        assert_eq!(claude[0]["name"], ionos[0]["function"]["name"]);
        let count = |v: &Value| v["properties"].as_object().map(|p| p.len());
        assert_eq!(count(&claude[0]["input_schema"]), Some(2));
        assert_eq!(count(&ionos[0]["function"]["parameters"]), Some(2));
    }

    #[test]
    fn test_anthropic_without_choice_omits_it() {
        let payload = prepare(&options_with(None), ProviderName::Bedrock, "r-1", "antrag");
        assert!(payload.tools.is_some());
        assert!(payload.tool_choice.is_none());
    }

    #[test]
    fn test_anthropic_named_tool() {
        let payload = prepare(
            &options_with(Some(ToolChoice::Tool {
                name: "search_programme".into(),
            })),
            ProviderName::Claude,
            "r-1",
            "antrag",
        );
        assert_eq!(
            payload.tool_choice,
            Some(json!({"type": "tool", "name": "search_programme"}))
        );
    }

    #[test]
    fn test_mistral_required_maps_to_any() {
        let payload = prepare(
            &options_with(Some(ToolChoice::Required)),
            ProviderName::Mistral,
            "r-1",
            "social",
        );
        let tools = payload.tools.unwrap();
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "search_programme");
        assert_eq!(payload.tool_choice, Some(json!("any")));
    }

    #[test]
    fn test_openai_shape_defaults_to_auto() {
        for provider in [ProviderName::Ionos, ProviderName::Litellm] {
            let payload = prepare(&options_with(None), provider, "r-1", "social");
            assert_eq!(payload.tool_choice, Some(json!("auto")));
        }
        let payload = prepare(
            &options_with(Some(ToolChoice::Required)),
            ProviderName::Ionos,
            "r-1",
            "social",
        );
        assert_eq!(payload.tool_choice, Some(json!("required")));
    }

    #[test]
    fn test_openai_named_tool_object() {
        let payload = prepare(
            &options_with(Some(ToolChoice::Tool {
                name: "search_programme".into(),
            })),
            ProviderName::Litellm,
            "r-1",
            "social",
        );
        assert_eq!(
            payload.tool_choice,
            Some(json!({"type": "function", "function": {"name": "search_programme"}}))
        );
    }

    #[test]
    fn test_telekom_drops_tools() {
        let payload = prepare(&options_with(None), ProviderName::Telekom, "r-1", "social");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_missing_schema_becomes_empty_object() {
        let options = RequestOptions {
            tools: Some(vec![ToolDefinition::new("ping", "", Value::Null)]),
            ..Default::default()
        };
        let payload = prepare(&options, ProviderName::Ionos, "r-1", "social");
        assert_eq!(
            payload.tools.unwrap()[0]["function"]["parameters"],
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn test_apply_to_body() {
        let mut body = Map::new();
        prepare(&options_with(None), ProviderName::Mistral, "r-1", "social").apply_to(&mut body);
        assert!(body.contains_key("tools"));
        assert_eq!(body["tool_choice"], "auto");
    }
}
