//! Shared CLI helpers — path expansion, result printing, banner.

use std::path::PathBuf;

use colored::Colorize;

use gruenerator_core::types::DispatchResult;
use gruenerator_providers::MetricsSnapshot;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// One-line summary of where a result came from.
pub fn result_footer(result: &DispatchResult) -> String {
    let meta = &result.metadata;
    let mut footer = format!(
        "{} · {} · {}",
        meta.provider().unwrap_or("?"),
        meta.model().unwrap_or("?"),
        result.stop_reason.as_str()
    );
    if let Some(usage) = meta.usage() {
        footer.push_str(&format!(" · {} tokens", usage.total_tokens));
    }
    if let Some(from) = meta.get("fallbackFrom").and_then(|v| v.as_str()) {
        footer.push_str(&format!(" · fallback from {from}"));
    }
    footer
}

/// Provider-call counters of one run.
pub fn metrics_footer(snapshot: &MetricsSnapshot) -> String {
    let mut footer = format!(
        "{} attempts · {} retries · {} failures",
        snapshot.attempts, snapshot.retries, snapshot.failures
    );
    if let Some(last) = &snapshot.last_failure {
        footer.push_str(&format!(" (last: {last})"));
    }
    footer
}

/// Print a dispatch result to stdout.
pub fn print_result(result: &DispatchResult, snapshot: &MetricsSnapshot) {
    println!();
    println!("{}", "🌻 Gruenerator".green().bold());
    match result.content.as_deref() {
        Some(content) if !content.trim().is_empty() => println!("{content}"),
        _ if !result.has_tool_calls() => println!("{}", "(no content)".dimmed()),
        _ => {}
    }
    for call in &result.tool_calls {
        println!(
            "{} {}({})",
            "→ tool call".yellow(),
            call.name.bold(),
            call.input
        );
    }
    println!();
    println!("{}", result_footer(result).dimmed());
    println!("{}", metrics_footer(snapshot).dimmed());
    println!();
}

/// Print the banner shown when the worker starts. Goes to stderr.
pub fn print_banner(mode: &str) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!();
    eprintln!("{}  v{}", "🌻 Gruenerator".green().bold(), version.dimmed());
    eprintln!("  Mode: {mode}");
    eprintln!();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gruenerator_core::types::{ProviderName, ResponseMetadata, StopReason, Usage};
    use serde_json::Map;

    #[test]
    fn expand_tilde_home() {
        let result = expand_tilde("~/foo/bar");
        assert!(result.ends_with("foo/bar"));
        assert!(!result.starts_with("~"));
    }

    #[test]
    fn expand_tilde_no_tilde() {
        assert_eq!(expand_tilde("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_tilde("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn result_footer_with_usage_and_fallback() {
        let meta = ResponseMetadata::default().with_provider_fields(
            ProviderName::Ionos,
            "meta-llama/Llama-3.3-70B-Instruct",
            "req_1",
            Some(Usage::new(10, 5)),
        );
        let mut extra = Map::new();
        extra.insert("fallbackFrom".into(), "mistral".into());
        let result = DispatchResult::new(Some("Hallo".into()), StopReason::Stop, vec![], vec![], meta)
            .with_metadata(&extra);

        assert_eq!(
            result_footer(&result),
            "ionos · meta-llama/Llama-3.3-70B-Instruct · stop · 15 tokens · fallback from mistral"
        );
    }

    #[test]
    fn metrics_footer_with_last_failure() {
        let snapshot = MetricsSnapshot {
            attempts: 4,
            successes: 1,
            failures: 3,
            retries: 2,
            last_failure: Some("mistral returned 400".into()),
        };
        assert_eq!(
            metrics_footer(&snapshot),
            "4 attempts · 2 retries · 3 failures (last: mistral returned 400)"
        );
        assert_eq!(
            metrics_footer(&MetricsSnapshot::default()),
            "0 attempts · 0 retries · 0 failures"
        );
    }

    #[test]
    fn result_footer_without_metadata() {
        let result = DispatchResult::new(
            Some("x".into()),
            StopReason::Length,
            vec![],
            vec![],
            ResponseMetadata::default(),
        );
        assert_eq!(result_footer(&result), "? · ? · length");
    }
}
