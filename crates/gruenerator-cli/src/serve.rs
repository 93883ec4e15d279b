//! `gruenerator serve` — bridges stdin/stdout JSON lines to the dispatch worker.
//!
//! Startup sequence:
//! 1. Build the dispatcher from config, counting calls in [`ConnectionMetrics`]
//! 2. Create the request bus and the worker
//! 3. Reader task: stdin lines → `WorkerRequest` → bus
//! 4. Writer task: bus replies → stdout lines
//! 5. Run the worker until Ctrl+C or stdin EOF, then drain and log the counters

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use gruenerator_agent::DispatchWorker;
use gruenerator_core::bus::queue::RequestBus;
use gruenerator_core::bus::types::{WorkerReply, WorkerRequest};
use gruenerator_core::config::Config;
use gruenerator_providers::{ConnectionMetrics, DispatchService, Dispatcher};

use crate::helpers;

const BUS_CAPACITY: usize = 100;

/// Run the worker on stdin/stdout.
pub async fn run(config: &Config) -> Result<()> {
    helpers::print_banner("serve (JSON lines on stdin/stdout)");

    let metrics = Arc::new(ConnectionMetrics::new());
    let bus = Arc::new(RequestBus::new(BUS_CAPACITY));
    let worker = Arc::new(build_worker(config, bus.clone(), metrics.clone())?);

    let (eof_tx, eof_rx) = oneshot::channel::<()>();
    let reader = {
        let bus = bus.clone();
        tokio::spawn(async move {
            let count = read_requests(&bus, BufReader::new(tokio::io::stdin())).await;
            let _ = eof_tx.send(());
            count
        })
    };

    let (done_tx, done_rx) = oneshot::channel::<()>();
    let writer = {
        let bus = bus.clone();
        tokio::spawn(async move { write_replies(&bus, &mut tokio::io::stdout(), done_rx).await })
    };

    worker
        .run(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("  Shutting down...");
                    info!("received Ctrl+C, shutting down");
                }
                _ = eof_rx => info!("stdin closed, shutting down"),
            }
        })
        .await;

    reader.abort();
    let _ = done_tx.send(());
    let written = writer.await.context("reply writer task failed")??;

    let snapshot = metrics.snapshot();
    info!(
        replies = written,
        attempts = snapshot.attempts,
        successes = snapshot.successes,
        failures = snapshot.failures,
        retries = snapshot.retries,
        last_failure = ?snapshot.last_failure,
        "serve stopped"
    );
    eprintln!("  Worker stopped. Goodbye!");
    Ok(())
}

/// Worker over a config-built dispatcher that reports into `metrics`.
pub fn build_worker(
    config: &Config,
    bus: Arc<RequestBus>,
    metrics: Arc<ConnectionMetrics>,
) -> Result<DispatchWorker> {
    let dispatcher: Arc<dyn DispatchService> = Arc::new(
        Dispatcher::from_config(config)
            .context("failed to set up providers")?
            .with_metrics(metrics),
    );
    Ok(DispatchWorker::new(bus, dispatcher))
}

/// Publish every valid request line to the bus. Malformed lines get an error
/// reply straight away. Returns the number of requests published.
pub async fn read_requests<R>(bus: &RequestBus, input: R) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut published = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_request(&line) {
            Ok(request) => {
                if bus.publish_request(request).await.is_err() {
                    error!("request channel closed");
                    break;
                }
                published += 1;
            }
            Err(reply) => {
                warn!(request_id = %reply.request_id(), "rejecting malformed request line");
                if bus.publish_reply(reply).await.is_err() {
                    break;
                }
            }
        }
    }

    published
}

/// Parse one line; on failure return the error reply to send instead.
fn parse_request(line: &str) -> std::result::Result<WorkerRequest, WorkerReply> {
    let value: Value = serde_json::from_str(line).map_err(|e| WorkerReply::Error {
        request_id: "unknown".into(),
        error: format!("invalid JSON: {e}"),
    })?;

    let request_id = value
        .get("requestId")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    serde_json::from_value(value).map_err(|e| WorkerReply::Error {
        request_id,
        error: format!("invalid request: {e}"),
    })
}

/// Write replies as JSON lines until `done` fires and the reply queue is empty.
/// Returns the number of replies written.
pub async fn write_replies<W>(
    bus: &RequestBus,
    out: &mut W,
    mut done: oneshot::Receiver<()>,
) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    loop {
        tokio::select! {
            biased;
            Some(reply) = bus.consume_reply() => {
                let mut line = serde_json::to_string(&reply).map_err(std::io::Error::other)?;
                line.push('\n');
                out.write_all(line.as_bytes()).await?;
                out.flush().await?;
                written += 1;
            }
            _ = &mut done => break,
        }
    }
    Ok(written)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
