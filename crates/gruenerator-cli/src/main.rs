//! Gruenerator CLI — entry point.
//!
//! # Commands
//!
//! - `gruenerator dispatch -m MESSAGE [-t TYPE]` — one-shot dispatch
//! - `gruenerator serve` — JSON-lines dispatch worker on stdin/stdout
//! - `gruenerator status` — show configuration and provider status
//! - `gruenerator onboard` — write the default config

mod helpers;
mod onboard;
mod serve;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use gruenerator_core::config::{load_config, Config};
use gruenerator_core::types::{CanonicalRequest, Message, RequestOptions};
use gruenerator_core::utils::new_request_id;
use gruenerator_providers::{ConnectionMetrics, DispatchService, Dispatcher};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Gruenerator — multi-provider AI dispatch with retry and fallback
#[derive(Parser)]
#[command(name = "gruenerator", version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.gruenerator/config.json)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single request through the dispatcher
    Dispatch {
        /// User message
        #[arg(short, long)]
        message: String,

        /// Logical request type (selects provider and sampling profile)
        #[arg(short = 't', long = "type", default_value = "universal")]
        request_type: String,

        /// Force a provider (claude, mistral, ionos, litellm, bedrock, telekom)
        #[arg(long)]
        provider: Option<String>,

        /// Override the model
        #[arg(long)]
        model: Option<String>,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        #[arg(long, default_value_t = false, conflicts_with_all = ["ultra", "bedrock"])]
        pro: bool,

        #[arg(long, default_value_t = false, conflicts_with = "bedrock")]
        ultra: bool,

        #[arg(long, default_value_t = false)]
        bedrock: bool,

        /// Route to the privacy provider
        #[arg(long, default_value_t = false)]
        privacy: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Run the dispatch worker on stdin/stdout (one JSON object per line)
    Serve {
        /// Enable debug logging (JSON, on stderr)
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and provider status
    Status,

    /// Write the default configuration
    Onboard,
}

/// Arguments of the `dispatch` command.
struct DispatchArgs {
    message: String,
    request_type: String,
    provider: Option<String>,
    model: Option<String>,
    system: Option<String>,
    pro: bool,
    ultra: bool,
    bedrock: bool,
    privacy: bool,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref().map(helpers::expand_tilde);

    match cli.command {
        Commands::Dispatch {
            message,
            request_type,
            provider,
            model,
            system,
            pro,
            ultra,
            bedrock,
            privacy,
            logs,
        } => {
            let config = load(config_path);
            init_logging(logs || config.is_development(), false);
            let args = DispatchArgs {
                message,
                request_type,
                provider,
                model,
                system,
                pro,
                ultra,
                bedrock,
                privacy,
            };
            run_dispatch(&config, args).await
        }
        Commands::Serve { logs } => {
            let config = load(config_path);
            init_logging(logs || config.is_development(), true);
            serve::run(&config).await
        }
        Commands::Status => status::run(config_path),
        Commands::Onboard => onboard::run(config_path),
    }
}

fn load(path: Option<PathBuf>) -> Config {
    load_config(path.as_deref())
}

// ─────────────────────────────────────────────
// Dispatch command
// ─────────────────────────────────────────────

fn build_request(args: DispatchArgs) -> CanonicalRequest {
    let options = RequestOptions {
        model: args.model,
        use_pro_mode: args.pro,
        use_ultra_mode: args.ultra,
        use_bedrock: args.bedrock,
        ..Default::default()
    };

    let mut request = CanonicalRequest::new(args.request_type, vec![Message::user(args.message)])
        .with_options(options);
    if let Some(system) = args.system {
        request = request.with_system_prompt(system);
    }
    if let Some(provider) = args.provider {
        request = request.with_explicit_provider(provider);
    }
    if args.privacy {
        request = request.with_metadata("privacyMode", true);
    }
    request
}

async fn run_dispatch(config: &Config, args: DispatchArgs) -> Result<()> {
    let metrics = Arc::new(ConnectionMetrics::new());
    let dispatcher = Dispatcher::from_config(config)
        .context("failed to set up providers")?
        .with_metrics(metrics.clone());
    let request = build_request(args);
    let request_id = new_request_id();

    info!(request_id = %request_id, request_type = %request.request_type, "dispatching");
    let result = dispatcher
        .dispatch(&request_id, &request)
        .await
        .context("dispatch failed")?;
    helpers::print_result(&result, &metrics.snapshot());
    Ok(())
}

/// Initialize tracing/logging. Always on stderr so `serve` keeps stdout clean.
fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("gruenerator=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    fn args(message: &str) -> DispatchArgs {
        DispatchArgs {
            message: message.into(),
            request_type: "social".into(),
            provider: None,
            model: None,
            system: None,
            pro: false,
            ultra: false,
            bedrock: false,
            privacy: false,
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dispatch_flags() {
        let cli = Cli::try_parse_from([
            "gruenerator", "dispatch", "-m", "Hallo", "-t", "antrag", "--pro", "--logs",
        ])
        .unwrap();
        match cli.command {
            Commands::Dispatch {
                message,
                request_type,
                pro,
                logs,
                ..
            } => {
                assert_eq!(message, "Hallo");
                assert_eq!(request_type, "antrag");
                assert!(pro);
                assert!(logs);
            }
            _ => panic!("expected dispatch"),
        }
    }

    #[test]
    fn test_mode_flags_conflict() {
        assert!(Cli::try_parse_from(["gruenerator", "dispatch", "-m", "x", "--pro", "--ultra"]).is_err());
    }

    #[test]
    fn test_build_request() {
        let mut a = args("Post zur Klimapolitik");
        a.system = Some("Sei knapp.".into());
        a.provider = Some("claude".into());
        a.privacy = true;
        a.bedrock = true;

        let request = build_request(a);
        assert_eq!(request.request_type, "social");
        assert_eq!(request.system_prompt.as_deref(), Some("Sei knapp."));
        assert_eq!(request.explicit_provider.as_deref(), Some("claude"));
        assert!(request.options.use_bedrock);
        assert_eq!(request.metadata["privacyMode"], json!(true));
        assert_eq!(request.messages[0].text(), "Post zur Klimapolitik");
    }

    #[test]
    fn test_build_request_minimal() {
        let request = build_request(args("x"));
        assert!(request.system_prompt.is_none());
        assert!(request.explicit_provider.is_none());
        assert!(request.metadata.is_empty());
    }
}
