use crate::types::MountSpec;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Everything a backend needs to start one disposable container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerLaunch {
    pub image: String,
    pub command: Vec<String>,
    pub mounts: Vec<MountSpec>,
    pub remove_on_exit: bool,
    /// Backends may use this to stop the container early; the orchestrator
    /// enforces it regardless.
    pub timeout: Option<Duration>,
}

/// Exit status and captured streams of a container that ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Both streams line by line in the order they arrived.
    pub combined: String,
}

impl BackendOutput {
    /// Output for a run whose streams were captured separately; `combined`
    /// is stdout followed by stderr.
    pub fn from_streams(
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        let stdout = stdout.into();
        let stderr = stderr.into();
        Self {
            exit_code,
            combined: format!("{stdout}{stderr}"),
            stdout,
            stderr,
        }
    }
}

/// The container could not be created, started or waited on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{0}")]
    Unavailable(String),

    #[error("container did not finish within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn launch(&self, launch: &ContainerLaunch) -> Result<BackendOutput, BackendError>;
}
