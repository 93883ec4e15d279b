//! Gruenerator agent layer — multi-intent turns on top of the dispatcher.
//!
//! This crate contains:
//! - **intent**: intents, the turn context, and the per-intent request builder
//! - **orchestrator**: concurrent fan-out of one turn under a shared deadline
//! - **pending**: the per-user pending-request lock and its record store
//! - **worker**: the bus-driven dispatch worker behind `gruenerator serve`

pub mod intent;
pub mod orchestrator;
pub mod pending;
pub mod worker;

pub use intent::{BaseContext, DefaultRequestBuilder, Intent, RequestBuilder};
pub use orchestrator::{IntentResult, Locale, MultiIntentOrchestrator, MultiIntentResponse};
pub use pending::{
    MemoryPendingStore, PendingGuard, PendingOutcome, PendingRecord, PendingRequestLock,
    PendingRequestStore, PendingRequests,
};
pub use worker::DispatchWorker;
