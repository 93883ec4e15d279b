//! Multi-intent orchestrator — fans one chat turn out into concurrent dispatches.
//!
//! Each intent gets its own [`CanonicalRequest`] built from a private copy of
//! the turn context and runs as its own `tokio::spawn` task. All tasks share
//! one batch deadline; when it passes the whole batch is reported as failed
//! and still-running tasks are left to finish in the background.
//!
//! With a [`PendingRequests`] attached, the user's pending clarification is
//! taken before fan-out and handed to every intent as `metadata.pendingRequest`.
//! A contended pending lock skips that step.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use gruenerator_core::config::schema::OrchestratorConfig;
use gruenerator_core::error::DispatchError;
use gruenerator_core::types::DispatchResult;
use gruenerator_providers::dispatcher::DispatchService;

use crate::intent::{BaseContext, DefaultRequestBuilder, Intent, RequestBuilder};
use crate::pending::{PendingOutcome, PendingRequests};

const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata key under which a taken pending record reaches each intent.
pub const PENDING_METADATA_KEY: &str = "pendingRequest";

// ─────────────────────────────────────────────
// Locale
// ─────────────────────────────────────────────

/// Language of user-facing failure text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    De,
    En,
}

impl Locale {
    pub fn intent_failed(&self) -> &'static str {
        match self {
            Locale::De => "Entschuldigung, bei der Bearbeitung dieser Anfrage ist ein Fehler aufgetreten.",
            Locale::En => "Sorry, something went wrong while processing this request.",
        }
    }

    pub fn batch_timed_out(&self) -> &'static str {
        match self {
            Locale::De => "Die Bearbeitung hat zu lange gedauert. Bitte versuche es noch einmal.",
            Locale::En => "Processing took too long. Please try again.",
        }
    }

    pub fn no_intents(&self) -> &'static str {
        match self {
            Locale::De => "Es wurde keine Anfrage erkannt.",
            Locale::En => "No request was recognized.",
        }
    }
}

impl FromStr for Locale {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" | "de-de" => Ok(Locale::De),
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            other => Err(DispatchError::Config(format!("unsupported locale '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────
// Response types
// ─────────────────────────────────────────────

/// Outcome of one intent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    pub success: bool,
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub confidence: f64,
    /// Position of the intent in the submitted list.
    pub processing_index: usize,
    /// Full dispatch result of a successful intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DispatchResult>,
}

/// Aggregated outcome of a multi-intent turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiIntentResponse {
    /// True when at least one intent succeeded.
    pub success: bool,
    /// Sorted by `processing_index`.
    pub results: Vec<IntentResult>,
    pub successful_intents: usize,
    pub failed_intents: usize,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MultiIntentResponse {
    fn aggregate(mut results: Vec<IntentResult>) -> Self {
        results.sort_by_key(|r| r.processing_index);
        let successful_intents = results.iter().filter(|r| r.success).count();
        MultiIntentResponse {
            success: successful_intents > 0,
            failed_intents: results.len() - successful_intents,
            successful_intents,
            results,
            timed_out: false,
            error: None,
        }
    }

    fn failed(error: &str, timed_out: bool) -> Self {
        MultiIntentResponse {
            timed_out,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────

/// Metadata of a launched intent task.
struct Launched {
    index: usize,
    agent: String,
    confidence: f64,
}

pub struct MultiIntentOrchestrator {
    dispatcher: Arc<dyn DispatchService>,
    builder: Arc<dyn RequestBuilder>,
    batch_timeout: Duration,
    locale: Locale,
    pending: Option<PendingRequests>,
}

impl MultiIntentOrchestrator {
    pub fn new(dispatcher: Arc<dyn DispatchService>) -> Self {
        Self {
            dispatcher,
            builder: Arc::new(DefaultRequestBuilder),
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            locale: Locale::default(),
            pending: None,
        }
    }

    /// Batch timeout, locale, and an in-memory pending store from config.
    /// An unknown locale falls back to `de`.
    pub fn from_config(dispatcher: Arc<dyn DispatchService>, config: &OrchestratorConfig) -> Self {
        let locale = config.locale.parse::<Locale>().unwrap_or_else(|e: DispatchError| {
            warn!(error = %e, "Falling back to default locale");
            Locale::default()
        });
        Self::new(dispatcher)
            .with_batch_timeout(Duration::from_secs(config.batch_timeout_secs))
            .with_locale(locale)
            .with_pending(PendingRequests::from_config(config))
    }

    pub fn with_builder(mut self, builder: Arc<dyn RequestBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_batch_timeout(mut self, batch_timeout: Duration) -> Self {
        self.batch_timeout = batch_timeout;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_pending(mut self, pending: PendingRequests) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Copy of `base` carrying the user's pending record, if one was taken.
    async fn with_pending_record(&self, request_id: &str, base: &BaseContext) -> BaseContext {
        let mut base = base.clone();
        let (Some(pending), Some(user_id)) = (&self.pending, base.user_id.clone()) else {
            return base;
        };
        let user_id = user_id.as_str();

        match pending.take_pending(user_id).await {
            PendingOutcome::Done(Some(record)) => {
                debug!(request_id, user_id, agent = %record.agent, "Resuming pending request");
                match serde_json::to_value(&record) {
                    Ok(value) => {
                        base.metadata.insert(PENDING_METADATA_KEY.into(), value);
                    }
                    Err(e) => warn!(request_id, error = %e, "Dropping unserializable pending record"),
                }
            }
            PendingOutcome::Done(None) => {}
            PendingOutcome::Skipped => {
                debug!(request_id, user_id, "Pending check skipped");
            }
        }
        base
    }

    /// Process every intent concurrently under one shared deadline.
    pub async fn process(
        &self,
        request_id: &str,
        intents: Vec<Intent>,
        base: &BaseContext,
    ) -> MultiIntentResponse {
        if intents.is_empty() {
            warn!(request_id, "Multi-intent turn without intents");
            return MultiIntentResponse::failed(self.locale.no_intents(), false);
        }

        info!(request_id, intents = intents.len(), "Processing multi-intent turn");

        let base = self.with_pending_record(request_id, base).await;

        let mut results = Vec::with_capacity(intents.len());
        let mut launched = Vec::with_capacity(intents.len());
        let mut handles: Vec<JoinHandle<Result<DispatchResult, DispatchError>>> =
            Vec::with_capacity(intents.len());

        for (index, intent) in intents.into_iter().enumerate() {
            let request = match self.builder.build(&intent, base.clone()) {
                Ok(request) => request,
                Err(e) => {
                    results.push(self.failure(request_id, index, &intent.agent, intent.confidence, &e));
                    continue;
                }
            };

            let dispatcher = Arc::clone(&self.dispatcher);
            let sub_id = format!("{request_id}-{index}");
            debug!(request_id = %sub_id, agent = %intent.agent, "Launching intent");
            handles.push(tokio::spawn(async move {
                dispatcher.dispatch(&sub_id, &request).await
            }));
            launched.push(Launched {
                index,
                agent: intent.agent,
                confidence: intent.confidence,
            });
        }

        let outcomes = match timeout(self.batch_timeout, join_all(handles)).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                warn!(
                    request_id,
                    timeout_secs = self.batch_timeout.as_secs_f64(),
                    "Multi-intent batch timed out"
                );
                return MultiIntentResponse::failed(self.locale.batch_timed_out(), true);
            }
        };

        for (meta, joined) in launched.into_iter().zip(outcomes) {
            let outcome = joined.unwrap_or_else(|e| {
                Err(DispatchError::InvalidResult(format!("intent task aborted: {e}")))
            });
            results.push(match outcome {
                Ok(result) => IntentResult {
                    success: true,
                    agent: meta.agent,
                    content: result.content.clone(),
                    error: None,
                    confidence: meta.confidence,
                    processing_index: meta.index,
                    result: Some(result),
                },
                Err(e) => self.failure(request_id, meta.index, &meta.agent, meta.confidence, &e),
            });
        }

        let response = MultiIntentResponse::aggregate(results);
        info!(
            request_id,
            successful = response.successful_intents,
            failed = response.failed_intents,
            "Multi-intent turn finished"
        );
        response
    }

    fn failure(
        &self,
        request_id: &str,
        index: usize,
        agent: &str,
        confidence: f64,
        error: &DispatchError,
    ) -> IntentResult {
        warn!(request_id, agent, index, error = %error, "Intent failed");
        IntentResult {
            success: false,
            agent: agent.to_string(),
            content: None,
            error: Some(self.locale.intent_failed().to_string()),
            confidence,
            processing_index: index,
            result: None,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
