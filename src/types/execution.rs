use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A playbook run to perform inside an isolated container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub playbooks: Vec<PathBuf>,
    pub inventory: PathBuf,
    /// Base for resolving relative input paths.
    pub working_directory: PathBuf,
    pub results_directory: PathBuf,
    /// Passed through to the engine untouched.
    pub extra_vars: Option<String>,
    pub entry_point: EntryPoint,
}

impl ExecutionRequest {
    pub fn new(playbooks: Vec<PathBuf>, inventory: impl Into<PathBuf>) -> Self {
        Self {
            playbooks,
            inventory: inventory.into(),
            working_directory: PathBuf::from("."),
            results_directory: PathBuf::from("results"),
            extra_vars: None,
            entry_point: EntryPoint::Playbook,
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn with_results_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_directory = dir.into();
        self
    }

    pub fn with_extra_vars(mut self, extra_vars: impl Into<String>) -> Self {
        self.extra_vars = Some(extra_vars.into());
        self
    }

    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.entry_point = entry_point;
        self
    }
}

/// What gets invoked inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPoint {
    /// `ansible-playbook <playbooks...>`
    Playbook,
    /// A runner script mounted next to the playbooks and started with
    /// `interpreter`. The script decides which playbooks to load.
    Script {
        path: PathBuf,
        interpreter: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "ro",
            MountMode::ReadWrite => "rw",
        }
    }
}

/// Bind mount of an absolute host path to a path inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub source: PathBuf,
    pub target: String,
    pub mode: MountMode,
}

impl MountSpec {
    /// `source:target:mode`, the `-v` argument form.
    pub fn to_volume_arg(&self) -> String {
        format!(
            "{}:{}:{}",
            self.source.display(),
            self.target,
            self.mode.as_str()
        )
    }
}

/// Terminal outcome of a run. Exactly one is produced per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// The engine ran and exited cleanly.
    Success { output: String },
    /// The engine ran and reported an error.
    EngineFailure { exit_code: i32, stderr: String },
    /// The engine never ran: the container could not be created or reached.
    InfrastructureFailure {
        kind: InfrastructureKind,
        message: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn phase(&self) -> RunPhase {
        match self {
            ExecutionResult::Success { .. } => RunPhase::Succeeded,
            ExecutionResult::EngineFailure { .. } => RunPhase::EngineFailed,
            ExecutionResult::InfrastructureFailure { .. } => RunPhase::InfrastructureFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfrastructureKind {
    Unavailable,
    Timeout,
}

/// Lifecycle of a single orchestrator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    Validating,
    Launching,
    Succeeded,
    EngineFailed,
    InfrastructureFailed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::Launching => "launching",
            RunPhase::Succeeded => "succeeded",
            RunPhase::EngineFailed => "engine-failed",
            RunPhase::InfrastructureFailed => "infrastructure-failed",
        };
        f.write_str(name)
    }
}
