//! Request bus between producers and the dispatch worker.

pub mod queue;
pub mod types;

pub use queue::RequestBus;
pub use types::{WorkerReply, WorkerRequest};
