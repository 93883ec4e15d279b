//! Bus event types — requests flowing into the dispatch worker and replies flowing out.
//!
//! Both sides serialize as JSON so the worker can sit behind a line-oriented
//! transport (stdin/stdout, a socket, a job queue) without changing shape.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::types::{CanonicalRequest, DispatchResult};

/// A request submitted to the dispatch worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// Caller-chosen correlation id, echoed in the reply.
    pub request_id: String,
    pub data: CanonicalRequest,
}

impl WorkerRequest {
    pub fn new(request_id: impl Into<String>, data: CanonicalRequest) -> Self {
        WorkerRequest {
            request_id: request_id.into(),
            data,
        }
    }
}

/// The worker's answer to one [`WorkerRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerReply {
    Response {
        #[serde(rename = "requestId")]
        request_id: String,
        data: DispatchResult,
    },
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        error: String,
    },
}

impl WorkerReply {
    /// Build the reply for a finished dispatch.
    pub fn from_outcome(
        request_id: impl Into<String>,
        outcome: Result<DispatchResult, DispatchError>,
    ) -> Self {
        let request_id = request_id.into();
        match outcome {
            Ok(data) => WorkerReply::Response { request_id, data },
            Err(e) => WorkerReply::Error {
                request_id,
                error: e.to_string(),
            },
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            WorkerReply::Response { request_id, .. } | WorkerReply::Error { request_id, .. } => {
                request_id
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WorkerReply::Error { .. })
    }
}
