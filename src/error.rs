use thiserror::Error;

use crate::puzzle::CodecError;
use crate::scheduler::job::{JobId, SolutionId};

#[derive(Error, Debug)]
pub enum EternityError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Solution not found: {0}")]
    SolutionNotFound(SolutionId),

    #[error("Job {job_id} is not assigned to worker {worker_id}")]
    LeaseConflict { job_id: JobId, worker_id: String },

    #[error("Admin token rejected")]
    Unauthorized,

    #[error("Invalid board payload: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid board: {0}")]
    InvalidBoard(String),

    #[error("Invalid request: {0}")]
    InvalidPayload(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Coordinator returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Solver task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EternityError {
    /// Connectivity failures a worker may retry without losing solver state.
    pub fn is_transient(&self) -> bool {
        match self {
            EternityError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            EternityError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EternityError>;
