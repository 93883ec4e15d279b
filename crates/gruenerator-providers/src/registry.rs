//! Provider registry — static specs for the six supported vendors.
//!
//! Each `ProviderSpec` describes how to reach one vendor: which wire family it
//! speaks, its default endpoint and model, and which content kinds it accepts.

use gruenerator_core::config::schema::ProviderConfig;
use gruenerator_core::types::ProviderName;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one provider
// ─────────────────────────────────────────────

/// Wire protocol spoken by a vendor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// `POST {base}/chat/completions`, bearer auth.
    OpenAiCompatible,
    /// `POST {base}/v1/messages`, `x-api-key` auth.
    AnthropicMessages,
    /// `POST {base}/model/{model}/invoke`, Anthropic body, bearer auth.
    BedrockInvoke,
}

/// Static description of one provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    pub name: ProviderName,
    /// Human-readable name for logs and the status page.
    pub display_name: &'static str,
    pub wire: WireFormat,
    /// Used when the config carries no `apiBase`.
    pub default_api_base: &'static str,
    /// Used when neither the caller nor the config names a model.
    pub default_model: &'static str,
    /// Whether image blocks are sent as images (otherwise replaced by a placeholder).
    pub supports_images: bool,
    /// Whether tool definitions are forwarded at all.
    pub supports_tools: bool,
}

static CLAUDE: ProviderSpec = ProviderSpec {
    name: ProviderName::Claude,
    display_name: "Anthropic Claude",
    wire: WireFormat::AnthropicMessages,
    default_api_base: "https://api.anthropic.com",
    default_model: "claude-sonnet-4-20250514",
    supports_images: true,
    supports_tools: true,
};

static MISTRAL: ProviderSpec = ProviderSpec {
    name: ProviderName::Mistral,
    display_name: "Mistral",
    wire: WireFormat::OpenAiCompatible,
    default_api_base: "https://api.mistral.ai/v1",
    default_model: "mistral-medium-latest",
    supports_images: true,
    supports_tools: true,
};

static IONOS: ProviderSpec = ProviderSpec {
    name: ProviderName::Ionos,
    display_name: "IONOS AI Model Hub",
    wire: WireFormat::OpenAiCompatible,
    default_api_base: "https://openai.inference.de-txl.ionos.com/v1",
    default_model: "meta-llama/Llama-3.3-70B-Instruct",
    supports_images: false,
    supports_tools: true,
};

static LITELLM: ProviderSpec = ProviderSpec {
    name: ProviderName::Litellm,
    display_name: "LiteLLM",
    wire: WireFormat::OpenAiCompatible,
    default_api_base: "http://localhost:4000/v1",
    default_model: "gpt-oss:120b",
    supports_images: false,
    supports_tools: true,
};

static BEDROCK: ProviderSpec = ProviderSpec {
    name: ProviderName::Bedrock,
    display_name: "AWS Bedrock",
    wire: WireFormat::BedrockInvoke,
    default_api_base: "https://bedrock-runtime.eu-central-1.amazonaws.com",
    default_model: "eu.anthropic.claude-sonnet-4-20250514-v1:0",
    supports_images: true,
    supports_tools: true,
};

static TELEKOM: ProviderSpec = ProviderSpec {
    name: ProviderName::Telekom,
    display_name: "Telekom LLM Hub",
    wire: WireFormat::OpenAiCompatible,
    default_api_base: "https://llm-server.llmhub.t-systems.net/v2",
    default_model: "Llama-3.3-70B-Instruct",
    supports_images: false,
    supports_tools: false,
};

/// All provider specs, in `ProviderName::ALL` order.
pub static PROVIDERS: [&ProviderSpec; 6] = [&CLAUDE, &MISTRAL, &IONOS, &LITELLM, &BEDROCK, &TELEKOM];

// ─────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────

/// Spec of a provider. Total over the closed provider set.
pub fn find_by_name(name: ProviderName) -> &'static ProviderSpec {
    match name {
        ProviderName::Claude => &CLAUDE,
        ProviderName::Mistral => &MISTRAL,
        ProviderName::Ionos => &IONOS,
        ProviderName::Litellm => &LITELLM,
        ProviderName::Bedrock => &BEDROCK,
        ProviderName::Telekom => &TELEKOM,
    }
}

/// Default model of a provider: config override first, then the registry default.
pub fn resolve_default_model(name: ProviderName, config: &ProviderConfig) -> String {
    config
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| find_by_name(name).default_model.to_string())
}

/// API base of a provider: config override first, then the registry default.
pub fn resolve_api_base(name: ProviderName, config: &ProviderConfig) -> String {
    config
        .api_base
        .clone()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| find_by_name(name).default_api_base.to_string())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
