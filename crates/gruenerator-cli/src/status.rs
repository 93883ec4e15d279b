//! `gruenerator status` — show configuration and provider status.
//!
//! - Config path and environment
//! - Key status, base URL, and default model per provider
//! - Routing, fallback chains, retry and orchestrator settings

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use gruenerator_core::config::{get_config_path, load_config, Config};
use gruenerator_providers::registry::{resolve_api_base, resolve_default_model, PROVIDERS};
use gruenerator_providers::FallbackChain;

/// Run the status command.
pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(get_config_path);
    let config = load_config(Some(&config_path));

    println!();
    println!("{}", "🌻 Gruenerator Status".green().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    println!("  {:<18} {}", "Environment:".bold(), config.environment);

    // Providers
    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        let provider_config = config.providers.get(spec.name);
        let status = if provider_config.is_configured() {
            format!("{} (key set)", "✓".green())
        } else {
            format!("{}", format!("· not configured ({})", spec.name.env_key()).dimmed())
        };
        println!("    {:<20} {}", spec.display_name, status);
        println!(
            "    {:<20} {}",
            "",
            format!(
                "{} · {}",
                resolve_api_base(spec.name, provider_config),
                resolve_default_model(spec.name, provider_config)
            )
            .dimmed()
        );
    }

    print_routing(&config);

    println!();
    println!(
        "  {:<18} {} attempts, {} ms base delay, {} s timeout",
        "Retry:".bold(),
        config.dispatch.max_attempts,
        config.dispatch.base_delay_ms,
        config.dispatch.request_timeout_secs
    );
    println!(
        "  {:<18} {} s batch timeout, {} s lock TTL, locale {}",
        "Orchestrator:".bold(),
        config.orchestrator.batch_timeout_secs,
        config.orchestrator.pending_lock_ttl_secs,
        config.orchestrator.locale
    );
    println!();

    Ok(())
}

fn print_routing(config: &Config) {
    let routing = &config.routing;

    println!();
    println!("  {}", "Routing:".bold());
    println!(
        "    {:<20} {} / {}",
        "default", routing.default_provider, routing.default_model
    );
    println!("    {:<20} {} / {}", "pro", routing.pro_provider, routing.pro_model);
    println!(
        "    {:<20} {} / {}",
        "ultra", routing.ultra_provider, routing.ultra_model
    );
    println!("    {:<20} {}", "privacy", routing.privacy_provider);

    let mut types: Vec<_> = routing.type_providers.iter().collect();
    types.sort_by(|a, b| a.0.cmp(b.0));
    for (request_type, provider) in types {
        println!("    {:<20} {}", request_type.dimmed(), provider);
    }

    println!();
    println!("  {}", "Fallback chains:".bold());
    for chain in [FallbackChain::General, FallbackChain::Sharepic] {
        let members: Vec<_> = chain.members().iter().map(|p| p.as_str()).collect();
        println!("    {:<20} {}", chain.as_str(), members.join(" → "));
    }
}
