//! Dispatch worker — the process-boundary loop.
//!
//! Consumes [`WorkerRequest`]s from the [`RequestBus`], dispatches each one in
//! its own task, and publishes a [`WorkerReply`] correlated by `requestId`.
//! Replies may arrive in any order.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use gruenerator_core::bus::queue::RequestBus;
use gruenerator_core::bus::types::{WorkerReply, WorkerRequest};
use gruenerator_providers::dispatcher::DispatchService;

pub struct DispatchWorker {
    bus: Arc<RequestBus>,
    dispatcher: Arc<dyn DispatchService>,
}

impl DispatchWorker {
    pub fn new(bus: Arc<RequestBus>, dispatcher: Arc<dyn DispatchService>) -> Self {
        Self { bus, dispatcher }
    }

    /// Dispatch one request and build its reply.
    pub async fn handle(&self, request: WorkerRequest) -> WorkerReply {
        let WorkerRequest { request_id, data } = request;
        debug!(request_id = %request_id, request_type = %data.request_type, "Worker received request");
        let outcome = self.dispatcher.dispatch(&request_id, &data).await;
        if let Err(e) = &outcome {
            error!(request_id = %request_id, error = %e, "Dispatch failed");
        }
        WorkerReply::from_outcome(request_id, outcome)
    }

    /// Run until `shutdown` resolves or the request channel closes.
    ///
    /// Requests already buffered on the bus are still taken after shutdown is
    /// signalled. In-flight ones finish and publish their replies before this
    /// returns.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        info!("Dispatch worker started, waiting for requests");
        tokio::pin!(shutdown);
        let mut in_flight = JoinSet::new();

        loop {
            // buffered requests are taken before shutdown is honoured
            tokio::select! {
                biased;
                next = self.bus.consume_request() => match next {
                    Some(request) => {
                        let worker = Arc::clone(&self);
                        in_flight.spawn(async move {
                            let reply = worker.handle(request).await;
                            let request_id = reply.request_id().to_string();
                            if let Err(e) = worker.bus.publish_reply(reply).await {
                                error!(request_id = %request_id, error = %e, "Failed to publish reply");
                            }
                        });
                    }
                    None => {
                        info!("Request channel closed, dispatch worker exiting");
                        break;
                    }
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                _ = &mut shutdown => {
                    info!(in_flight = in_flight.len(), "Shutdown requested, draining");
                    break;
                }
            }
        }

        while in_flight.join_next().await.is_some() {}
        info!("Dispatch worker stopped");
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gruenerator_core::error::DispatchError;
    use gruenerator_core::types::{
        CanonicalRequest, DispatchResult, Message, ResponseMetadata, StopReason,
    };
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Echoes the user text; `fail` types error; `slow` types sleep first.
    struct EchoDispatcher;

    #[async_trait]
    impl DispatchService for EchoDispatcher {
        async fn dispatch(
            &self,
            _request_id: &str,
            request: &CanonicalRequest,
        ) -> Result<DispatchResult, DispatchError> {
            match request.request_type.as_str() {
                "fail" => Err(DispatchError::Config("provider 'claude' is not configured".into())),
                kind => {
                    if kind == "slow" {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                    Ok(DispatchResult::new(
                        Some(request.messages[0].text()),
                        StopReason::Stop,
                        vec![],
                        vec![],
                        ResponseMetadata::default(),
                    ))
                }
            }
        }
    }

    fn request(id: &str, kind: &str, text: &str) -> WorkerRequest {
        WorkerRequest::new(id, CanonicalRequest::new(kind, vec![Message::user(text)]))
    }

    #[tokio::test]
    async fn test_handle_success_and_error() {
        let worker = DispatchWorker::new(Arc::new(RequestBus::new(8)), Arc::new(EchoDispatcher));

        match worker.handle(request("a", "social", "Hallo")).await {
            WorkerReply::Response { request_id, data } => {
                assert_eq!(request_id, "a");
                assert_eq!(data.content.as_deref(), Some("Hallo"));
            }
            other => panic!("expected response, got {other:?}"),
        }

        let reply = worker.handle(request("b", "fail", "x")).await;
        assert!(reply.is_error());
        assert_eq!(reply.request_id(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_correlates_out_of_order_replies() {
        let bus = Arc::new(RequestBus::new(8));
        let worker = Arc::new(DispatchWorker::new(bus.clone(), Arc::new(EchoDispatcher)));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let runner = tokio::spawn(worker.run(async {
            let _ = stop_rx.await;
        }));

        bus.publish_request(request("slow-1", "slow", "langsam")).await.unwrap();
        bus.publish_request(request("fast-2", "social", "schnell")).await.unwrap();
        bus.publish_request(request("err-3", "fail", "x")).await.unwrap();

        let mut replies = HashMap::new();
        for _ in 0..3 {
            let reply = bus.consume_reply().await.unwrap();
            replies.insert(reply.request_id().to_string(), reply);
        }

        assert!(!replies["slow-1"].is_error());
        assert!(!replies["fast-2"].is_error());
        assert!(replies["err-3"].is_error());

        stop_tx.send(()).unwrap();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight() {
        let bus = Arc::new(RequestBus::new(8));
        let worker = Arc::new(DispatchWorker::new(bus.clone(), Arc::new(EchoDispatcher)));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let runner = tokio::spawn(worker.run(async {
            let _ = stop_rx.await;
        }));

        bus.publish_request(request("slow-1", "slow", "langsam")).await.unwrap();
        // let the worker pick it up before stopping
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop_tx.send(()).unwrap();
        runner.await.unwrap();

        let reply = bus.consume_reply().await.unwrap();
        assert_eq!(reply.request_id(), "slow-1");
    }
}
