//! Async request bus — connects request producers to the dispatch worker.
//!
//! Uses tokio::sync::mpsc bounded channels.

use super::types::{WorkerReply, WorkerRequest};
use tokio::sync::mpsc;

/// The bus between request producers and the dispatch worker.
///
/// - Producers publish to `requests`
/// - The worker consumes `requests`, dispatches, publishes to `replies`
/// - The transport consumes `replies` and routes them back by `requestId`
pub struct RequestBus {
    request_tx: mpsc::Sender<WorkerRequest>,
    request_rx: tokio::sync::Mutex<mpsc::Receiver<WorkerRequest>>,
    reply_tx: mpsc::Sender<WorkerReply>,
    reply_rx: tokio::sync::Mutex<mpsc::Receiver<WorkerReply>>,
}

impl RequestBus {
    /// Create a new request bus with the given buffer capacity.
    pub fn new(buffer_size: usize) -> Self {
        let (request_tx, request_rx) = mpsc::channel(buffer_size);
        let (reply_tx, reply_rx) = mpsc::channel(buffer_size);

        RequestBus {
            request_tx,
            request_rx: tokio::sync::Mutex::new(request_rx),
            reply_tx,
            reply_rx: tokio::sync::Mutex::new(reply_rx),
        }
    }

    /// Submit a request to the worker.
    pub async fn publish_request(
        &self,
        req: WorkerRequest,
    ) -> Result<(), mpsc::error::SendError<WorkerRequest>> {
        self.request_tx.send(req).await
    }

    /// Consume the next request (blocks until available).
    /// Returns None if all senders are dropped.
    pub async fn consume_request(&self) -> Option<WorkerRequest> {
        let mut rx = self.request_rx.lock().await;
        rx.recv().await
    }

    /// Publish a reply from the worker.
    pub async fn publish_reply(
        &self,
        reply: WorkerReply,
    ) -> Result<(), mpsc::error::SendError<WorkerReply>> {
        self.reply_tx.send(reply).await
    }

    /// Consume the next reply (blocks until available).
    pub async fn consume_reply(&self) -> Option<WorkerReply> {
        let mut rx = self.reply_rx.lock().await;
        rx.recv().await
    }

    /// Get a clone of the request sender (for producers to use).
    pub fn request_sender(&self) -> mpsc::Sender<WorkerRequest> {
        self.request_tx.clone()
    }
}
