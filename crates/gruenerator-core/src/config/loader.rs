//! Config loader — reads `~/.gruenerator/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.gruenerator/config.json`
//! 3. Vendor env vars (`MISTRAL_API_KEY`, `IONOS_API_TOKEN`, `*_BASE_URL`, ...)
//! 4. Environment variables `GRUENERATOR_<SECTION>__<FIELD>` (override everything)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};
use crate::types::ProviderName;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    // Ensure parent directory exists
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `GRUENERATOR_ENV` → `environment`
/// - `<VENDOR>_API_KEY` / `IONOS_API_TOKEN` / `<VENDOR>_BASE_URL` → `providers.<name>`
/// - `GRUENERATOR_PROVIDERS__<NAME>__API_KEY|API_BASE|MODEL` → `providers.<name>.*`
/// - `GRUENERATOR_DISPATCH__MAX_ATTEMPTS|BASE_DELAY_MS|REQUEST_TIMEOUT_SECS`
/// - `GRUENERATOR_ROUTING__DEFAULT_PROVIDER|DEFAULT_MODEL`
/// - `GRUENERATOR_ORCHESTRATOR__BATCH_TIMEOUT_SECS|LOCALE`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("GRUENERATOR_ENV") {
        config.environment = val;
    }

    for name in ProviderName::ALL {
        apply_provider_env(config.providers.get_mut(name), name);
    }

    // Dispatch
    if let Some(n) = env_parse::<u32>("GRUENERATOR_DISPATCH__MAX_ATTEMPTS") {
        config.dispatch.max_attempts = n.max(1);
    }
    if let Some(ms) = env_parse::<u64>("GRUENERATOR_DISPATCH__BASE_DELAY_MS") {
        config.dispatch.base_delay_ms = ms;
    }
    if let Some(secs) = env_parse::<u64>("GRUENERATOR_DISPATCH__REQUEST_TIMEOUT_SECS") {
        config.dispatch.request_timeout_secs = secs;
    }

    // Routing
    if let Ok(val) = std::env::var("GRUENERATOR_ROUTING__DEFAULT_PROVIDER") {
        match val.parse::<ProviderName>() {
            Ok(p) => config.routing.default_provider = p,
            Err(e) => warn!("Ignoring GRUENERATOR_ROUTING__DEFAULT_PROVIDER: {}", e),
        }
    }
    if let Ok(val) = std::env::var("GRUENERATOR_ROUTING__DEFAULT_MODEL") {
        config.routing.default_model = val;
    }

    // Orchestrator
    if let Some(secs) = env_parse::<u64>("GRUENERATOR_ORCHESTRATOR__BATCH_TIMEOUT_SECS") {
        config.orchestrator.batch_timeout_secs = secs;
    }
    if let Ok(val) = std::env::var("GRUENERATOR_ORCHESTRATOR__LOCALE") {
        config.orchestrator.locale = val;
    }

    config
}

/// Apply env var overrides for a single provider.
///
/// Vendor variables come first so the namespaced ones can override them.
fn apply_provider_env(provider: &mut ProviderConfig, name: ProviderName) {
    if let Ok(val) = std::env::var(name.env_key()) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(name.base_url_env()) {
        provider.api_base = Some(val);
    }

    let upper = name.as_str().to_uppercase();
    if let Ok(val) = std::env::var(format!("GRUENERATOR_PROVIDERS__{upper}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("GRUENERATOR_PROVIDERS__{upper}__API_BASE")) {
        provider.api_base = Some(val);
    }
    if let Ok(val) = std::env::var(format!("GRUENERATOR_PROVIDERS__{upper}__MODEL")) {
        provider.model = Some(val);
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        // Should return defaults
        assert_eq!(config.orchestrator.pending_lock_ttl_secs, 30);
        assert_eq!(config.routing.default_model, "mistral-medium-latest");
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(r#"{
            "dispatch": {
                "maxAttempts": 5,
                "baseDelayMs": 250
            }
        }"#);

        let config = load_config_from_path(file.path());
        assert_eq!(config.dispatch.max_attempts, 5);
        assert_eq!(config.dispatch.base_delay_ms, 250);
        // Default preserved
        assert_eq!(config.dispatch.request_timeout_secs, 120);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.dispatch.max_attempts, 3);
    }

    #[test]
    fn test_load_empty_json() {
        let file = write_temp_json("{}");
        let config = load_config_from_path(file.path());
        assert_eq!(config.routing.pro_model, "magistral-medium-latest");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.routing.default_model = "mistral-large-latest".to_string();
        config.providers.telekom.api_key = "tk-test".to_string();

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.routing.default_model, "mistral-large-latest");
        assert_eq!(reloaded.providers.telekom.api_key, "tk-test");
    }

    #[test]
    fn test_env_override_vendor_key() {
        std::env::set_var("IONOS_API_TOKEN", "ionos-env-token");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.ionos.api_key, "ionos-env-token");
        std::env::remove_var("IONOS_API_TOKEN");
    }

    #[test]
    fn test_env_override_namespaced_beats_vendor() {
        std::env::set_var("LITELLM_API_KEY", "vendor");
        std::env::set_var("GRUENERATOR_PROVIDERS__LITELLM__API_KEY", "namespaced");
        std::env::set_var("GRUENERATOR_PROVIDERS__LITELLM__MODEL", "gpt-oss:20b");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.litellm.api_key, "namespaced");
        assert_eq!(config.providers.litellm.model.as_deref(), Some("gpt-oss:20b"));
        std::env::remove_var("LITELLM_API_KEY");
        std::env::remove_var("GRUENERATOR_PROVIDERS__LITELLM__API_KEY");
        std::env::remove_var("GRUENERATOR_PROVIDERS__LITELLM__MODEL");
    }

    #[test]
    fn test_env_override_routing_provider() {
        std::env::set_var("GRUENERATOR_ROUTING__DEFAULT_PROVIDER", "telekom");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.routing.default_provider, ProviderName::Telekom);
        std::env::remove_var("GRUENERATOR_ROUTING__DEFAULT_PROVIDER");
    }

    #[test]
    fn test_env_override_batch_timeout() {
        std::env::set_var("GRUENERATOR_ORCHESTRATOR__BATCH_TIMEOUT_SECS", "45");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.orchestrator.batch_timeout_secs, 45);
        std::env::remove_var("GRUENERATOR_ORCHESTRATOR__BATCH_TIMEOUT_SECS");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert!(raw["dispatch"].get("baseDelayMs").is_some());
        assert!(raw["dispatch"].get("base_delay_ms").is_none());
    }

    #[test]
    fn test_full_config_with_providers() {
        let file = write_temp_json(r#"{
            "providers": {
                "claude": { "apiKey": "sk-ant-123" },
                "mistral": { "apiKey": "ms-456", "apiBase": "https://eu.mistral.example/v1" },
                "ionos": { "apiKey": "io-789" }
            },
            "routing": {
                "typeProviders": { "rede": "ionos" }
            }
        }"#);

        let config = load_config_from_path(file.path());
        assert!(config.providers.claude.is_configured());
        assert!(config.providers.mistral.is_configured());
        assert_eq!(
            config.providers.mistral.api_base.as_deref(),
            Some("https://eu.mistral.example/v1")
        );
        assert!(config.providers.ionos.is_configured());
        assert!(!config.providers.bedrock.is_configured());
        assert_eq!(
            config.routing.provider_for_type("rede"),
            Some(ProviderName::Ionos)
        );
    }
}
