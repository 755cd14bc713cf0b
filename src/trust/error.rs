use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed for {user}@{host}")]
    AuthenticationFailed { host: String, user: String },

    #[error("{operation} on {host} timed out after {timeout:?}")]
    Timeout {
        host: String,
        operation: String,
        timeout: Duration,
    },

    #[error("Failed to create {path} on {host}: {reason}")]
    DirectoryFailed {
        host: String,
        path: String,
        reason: String,
    },

    #[error("Remote command failed on {host} (exit {exit_code}): {command}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("SSH session error on {host}: {reason}")]
    Session { host: String, reason: String },
}

impl TrustError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TrustError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrustError>;
