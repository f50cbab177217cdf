pub mod config;
pub mod logging;

pub mod archive;
pub mod artifact;
pub mod cleanup;
pub mod control;
pub mod error;
pub mod extractor;
pub mod job;
pub mod launcher;
pub mod naming;
pub mod outputs;
pub mod persist;
pub mod queue;
pub mod store;

pub use error::QueueError;
pub use job::{JobId, JobStatus, JobSummary, MediaFormat, SubmitRequest};
pub use queue::JobQueue;
