//! Errors returned by the queue API.

use crate::job::{JobId, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} is {status}; cannot {action}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job storage: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    pub(crate) fn invalid_state(id: &JobId, status: JobStatus, action: &'static str) -> Self {
        QueueError::InvalidState {
            id: id.clone(),
            status,
            action,
        }
    }
}
