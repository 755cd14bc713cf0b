use crate::execution::{
    BackendError, BackendOutput, ContainerLaunch, ContextLayout, ExecutionBackend, MountPlan,
    Result,
};
use crate::types::{ExecutionRequest, ExecutionResult, InfrastructureKind, RunPhase};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Pinned image the engine runs in.
    pub image: String,
    pub layout: ContextLayout,
    pub run_timeout: Option<Duration>,
    pub remove_on_exit: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            image: "ansible-v2".to_string(),
            layout: ContextLayout::default(),
            run_timeout: None,
            remove_on_exit: true,
        }
    }
}

/// Runs playbooks in a disposable container and classifies the outcome.
///
/// `Err` is returned only for request problems found before launch. Once a
/// launch is attempted the outcome is always an `ExecutionResult`: the
/// engine ran and succeeded, the engine ran and failed, or the engine never
/// ran. No retries.
pub struct ExecutionOrchestrator {
    backend: Arc<dyn ExecutionBackend>,
    settings: OrchestratorSettings,
    span: Span,
}

impl ExecutionOrchestrator {
    pub fn new(backend: Arc<dyn ExecutionBackend>, settings: OrchestratorSettings) -> Self {
        Self {
            backend,
            settings,
            span: info_span!("execution"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Validate the request and assemble the container launch without
    /// starting anything.
    pub fn prepare(&self, request: &ExecutionRequest) -> Result<ContainerLaunch> {
        let plan = MountPlan::build(request, &self.settings.layout)?;
        let command = plan.command(&request.entry_point, request.extra_vars.as_deref());

        Ok(ContainerLaunch {
            image: self.settings.image.clone(),
            command,
            mounts: plan.mounts,
            remove_on_exit: self.settings.remove_on_exit,
            timeout: self.settings.run_timeout,
        })
    }

    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.run_inner(request).instrument(self.span.clone()).await
    }

    async fn run_inner(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let mut phase = RunPhase::Idle;

        advance(&mut phase, RunPhase::Validating);
        info!(
            "Running {} playbook(s) with inventory {} (extra vars: {})",
            request.playbooks.len(),
            request.inventory.display(),
            if request.extra_vars.is_some() { "yes" } else { "no" }
        );
        let launch = self.prepare(request).inspect_err(|e| {
            error!("Run rejected before launch: {}", e);
        })?;

        advance(&mut phase, RunPhase::Launching);
        debug!(
            "Starting {} with command {:?}",
            launch.image, launch.command
        );

        let result = classify(self.launch_with_deadline(&launch).await);
        advance(&mut phase, result.phase());

        match &result {
            ExecutionResult::Success { .. } => info!("Ansible playbook executed successfully"),
            ExecutionResult::EngineFailure { exit_code, stderr } => {
                warn!(
                    "Ansible playbook failed with exit code {}: {}",
                    exit_code,
                    stderr.trim()
                )
            }
            ExecutionResult::InfrastructureFailure { kind, message } => {
                warn!("Automation backend failure ({:?}): {}", kind, message)
            }
        }

        Ok(result)
    }

    async fn launch_with_deadline(
        &self,
        launch: &ContainerLaunch,
    ) -> std::result::Result<BackendOutput, BackendError> {
        match launch.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.backend.launch(launch))
                .await
                .unwrap_or(Err(BackendError::Timeout(timeout))),
            None => self.backend.launch(launch).await,
        }
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    debug!("Run phase {} -> {}", phase, next);
    *phase = next;
}

fn classify(
    outcome: std::result::Result<BackendOutput, BackendError>,
) -> ExecutionResult {
    match outcome {
        Ok(output) if output.exit_code == 0 => ExecutionResult::Success {
            output: output.combined,
        },
        Ok(output) => ExecutionResult::EngineFailure {
            exit_code: output.exit_code,
            stderr: output.stderr,
        },
        Err(BackendError::Timeout(timeout)) => ExecutionResult::InfrastructureFailure {
            kind: InfrastructureKind::Timeout,
            message: format!("automation run did not finish within {timeout:?}"),
        },
        Err(BackendError::Unavailable(message)) => ExecutionResult::InfrastructureFailure {
            kind: InfrastructureKind::Unavailable,
            message,
        },
    }
}
