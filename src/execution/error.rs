use thiserror::Error;

/// Static problems with a run request, detected before anything is launched.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Configuration error: no playbooks given")]
    NoPlaybooks,

    #[error("Configuration error: {kind} not found: {path}")]
    MissingInput { kind: String, path: String },

    #[error("Configuration error: {first} and {second} would both be mounted at {target}")]
    MountCollision {
        target: String,
        first: String,
        second: String,
    },

    #[error("Configuration error: results directory {path} is not usable: {reason}")]
    ResultsDirectory { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
