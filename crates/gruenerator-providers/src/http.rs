//! Shared HTTP plumbing for the adapters: client construction, endpoint state,
//! and classification of transport and vendor errors into [`DispatchError`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{error, warn};

use gruenerator_core::config::schema::ProviderConfig;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::ProviderName;

use crate::registry::{resolve_api_base, resolve_default_model};

/// Body substrings that mark a vendor-side content-policy block.
const CONTENT_POLICY_MARKERS: &[&str] = &[
    "content_policy",
    "content policy",
    "content_filter",
    "content management policy",
    "moderation",
];

/// Build the connection-pooled client shared by all adapters.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, DispatchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DispatchError::Config(format!("failed to build HTTP client: {e}")))
}

// ─────────────────────────────────────────────
// Endpoint
// ─────────────────────────────────────────────

/// Everything an adapter needs to reach one vendor.
#[derive(Clone)]
pub struct Endpoint {
    pub client: reqwest::Client,
    /// API base URL without a trailing slash.
    pub api_base: String,
    pub api_key: String,
    pub default_model: String,
    /// Extra headers sent with each request (from `extraHeaders` in the config).
    pub extra_headers: HeaderMap,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl Endpoint {
    /// Resolve the endpoint of `name` from its config and the registry defaults.
    pub fn from_config(
        name: ProviderName,
        config: &ProviderConfig,
        client: reqwest::Client,
    ) -> Self {
        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(header), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(header, val);
                } else {
                    warn!(provider = %name, header = %key, "Ignoring invalid extra header");
                }
            }
        }

        Endpoint {
            client,
            api_base: resolve_api_base(name, config)
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            default_model: resolve_default_model(name, config),
            extra_headers,
        }
    }

    /// Join a path onto the API base.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

// ─────────────────────────────────────────────
// Error classification
// ─────────────────────────────────────────────

/// Classify a failure to send the request or read the reply.
pub fn classify_send_error(provider: ProviderName, err: &reqwest::Error) -> DispatchError {
    if err.is_builder() {
        return DispatchError::Config(format!("{provider}: invalid request: {err}"));
    }
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    DispatchError::Transport { provider, message }
}

/// Classify a non-2xx vendor reply.
pub fn classify_status(provider: ProviderName, status: StatusCode, body: &str) -> DispatchError {
    let message = extract_error_message(body);
    match status.as_u16() {
        502..=504 => DispatchError::Transport {
            provider,
            message: format!("gateway error {status}: {message}"),
        },
        code @ (401 | 403) => DispatchError::Auth {
            provider,
            status: code,
            message,
        },
        400 if has_content_policy_marker(body) => {
            DispatchError::ContentPolicy { provider, message }
        }
        code => DispatchError::Rejected {
            provider,
            status: code,
            message,
        },
    }
}

/// Best-effort error text: `error.message`, `error` (string), `message`, `detail`, else the raw body.
pub fn extract_error_message(body: &str) -> String {
    let raw = body.trim();
    let Ok(json) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };

    let candidates = [
        json.pointer("/error/message"),
        json.get("error").filter(|v| v.is_string()),
        json.get("message"),
        json.get("detail"),
    ];
    let message = candidates
        .into_iter()
        .flatten()
        .find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| raw.to_string());
    message
}

fn has_content_policy_marker(body: &str) -> bool {
    let lower = body.to_lowercase();
    CONTENT_POLICY_MARKERS.iter().any(|m| lower.contains(m))
}

/// Send a prepared request and return the parsed JSON body of a 2xx reply.
pub async fn send_json(
    provider: ProviderName,
    request_id: &str,
    builder: reqwest::RequestBuilder,
) -> Result<Value, DispatchError> {
    let response = builder.send().await.map_err(|e| {
        error!(provider = %provider, request_id, error = %e, "HTTP request failed");
        classify_send_error(provider, &e)
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| classify_send_error(provider, &e))?;

    if !status.is_success() {
        let err = classify_status(provider, status, &body);
        error!(
            provider = %provider,
            request_id,
            status = %status,
            kind = err.kind(),
            "API error"
        );
        return Err(err);
    }

    if body.trim().is_empty() {
        return Err(DispatchError::MalformedResponse {
            provider,
            message: "empty response body".into(),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(provider = %provider, request_id, error = %e, "Failed to parse response");
        DispatchError::MalformedResponse {
            provider,
            message: format!("invalid JSON: {e}"),
        }
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
