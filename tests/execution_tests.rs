//! Orchestrator behaviour against a scripted backend

use async_trait::async_trait;
use rustle_provision::execution::{
    BackendError, BackendOutput, ContainerLaunch, ExecutionBackend, ExecutionError,
    ExecutionOrchestrator, OrchestratorSettings,
};
use rustle_provision::{
    EntryPoint, ExecutionRequest, ExecutionResult, InfrastructureKind, MountMode,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

enum Script {
    Exit(i32, &'static str, &'static str),
    Fail(&'static str),
    Hang,
}

struct ScriptedBackend {
    script: Script,
    launches: Mutex<Vec<ContainerLaunch>>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            launches: Mutex::new(Vec::new()),
        })
    }

    fn launches(&self) -> Vec<ContainerLaunch> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn launch(&self, launch: &ContainerLaunch) -> Result<BackendOutput, BackendError> {
        self.launches.lock().unwrap().push(launch.clone());
        match &self.script {
            Script::Exit(exit_code, stdout, stderr) => {
                Ok(BackendOutput::from_streams(*exit_code, *stdout, *stderr))
            }
            Script::Fail(message) => Err(BackendError::Unavailable(message.to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(BackendOutput::default())
            }
        }
    }
}

fn workspace(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "---\n").unwrap();
    }
    dir
}

fn request(dir: &Path, playbooks: &[&str]) -> ExecutionRequest {
    ExecutionRequest::new(
        playbooks.iter().map(|p| PathBuf::from(*p)).collect(),
        "inventory.ini",
    )
    .with_working_directory(dir)
}

fn orchestrator(backend: Arc<ScriptedBackend>) -> ExecutionOrchestrator {
    ExecutionOrchestrator::new(backend, OrchestratorSettings::default())
}

#[tokio::test]
async fn test_success_mounts_inputs_read_only_and_results_read_write() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "PLAY RECAP ok=3", ""));

    let result = orchestrator(backend.clone())
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap();

    assert_eq!(
        result,
        ExecutionResult::Success {
            output: "PLAY RECAP ok=3".to_string()
        }
    );

    let launches = backend.launches();
    assert_eq!(launches.len(), 1);
    let launch = &launches[0];
    assert_eq!(launch.image, "ansible-v2");
    assert!(launch.remove_on_exit);
    assert_eq!(
        launch.command,
        vec![
            "ansible-playbook",
            "/home/ansible/site.yml",
            "-i",
            "/home/ansible/inventory.ini"
        ]
    );

    let results = launch
        .mounts
        .iter()
        .find(|m| m.target == "/tmp")
        .unwrap();
    assert_eq!(results.mode, MountMode::ReadWrite);
    assert!(results.source.ends_with("results"));
    assert!(dir.path().join("results").is_dir());
    assert_eq!(
        launch
            .mounts
            .iter()
            .filter(|m| m.mode == MountMode::ReadOnly)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_success_output_keeps_warnings_from_stderr() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(
        0,
        "PLAY RECAP ok=1\n",
        "[WARNING]: provided hosts list is empty\n",
    ));

    let result = orchestrator(backend)
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap();

    match result {
        ExecutionResult::Success { output } => {
            assert!(output.contains("PLAY RECAP ok=1"));
            assert!(output.contains("[WARNING]: provided hosts list is empty"));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_playbook_never_reaches_backend() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "", ""));

    let err = orchestrator(backend.clone())
        .run(&request(dir.path(), &["site.yml", "missing.yml"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::MissingInput { ref kind, .. } if kind == "playbook"));
    assert!(err.to_string().starts_with("Configuration error"));
    assert!(backend.launches().is_empty());
}

#[tokio::test]
async fn test_missing_inventory_never_reaches_backend() {
    let dir = workspace(&["site.yml"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "", ""));

    let err = orchestrator(backend.clone())
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::MissingInput { ref kind, .. } if kind == "inventory"));
    assert!(backend.launches().is_empty());
}

#[tokio::test]
async fn test_no_playbooks_is_rejected() {
    let dir = workspace(&["inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "", ""));

    let err = orchestrator(backend.clone())
        .run(&request(dir.path(), &[]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::NoPlaybooks));
    assert!(backend.launches().is_empty());
}

#[tokio::test]
async fn test_playbook_basename_collision_is_rejected() {
    let dir = workspace(&["linux/site.yml", "windows/site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "", ""));

    let err = orchestrator(backend.clone())
        .run(&request(dir.path(), &["linux/site.yml", "windows/site.yml"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::MountCollision { ref target, .. } if target == "/home/ansible/site.yml"));
    assert!(backend.launches().is_empty());
}

#[tokio::test]
async fn test_engine_failure_keeps_exit_code_and_stderr() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(2, "", "unreachable host"));

    let result = orchestrator(backend)
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap();

    assert_eq!(
        result,
        ExecutionResult::EngineFailure {
            exit_code: 2,
            stderr: "unreachable host".to_string()
        }
    );
}

#[tokio::test]
async fn test_backend_error_is_infrastructure_failure() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Fail("cannot connect to runtime"));

    let result = orchestrator(backend)
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap();

    assert_eq!(
        result,
        ExecutionResult::InfrastructureFailure {
            kind: InfrastructureKind::Unavailable,
            message: "cannot connect to runtime".to_string()
        }
    );
}

#[tokio::test]
async fn test_hung_backend_hits_run_deadline() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Hang);
    let settings = OrchestratorSettings {
        run_timeout: Some(Duration::from_millis(200)),
        ..OrchestratorSettings::default()
    };

    let result = ExecutionOrchestrator::new(backend, settings)
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap();

    assert!(matches!(
        result,
        ExecutionResult::InfrastructureFailure {
            kind: InfrastructureKind::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn test_extra_vars_appended_only_when_given() {
    let dir = workspace(&["site.yml", "inventory.ini"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "", ""));
    let orchestrator = orchestrator(backend.clone());

    orchestrator
        .run(&request(dir.path(), &["site.yml"]))
        .await
        .unwrap();
    orchestrator
        .run(&request(dir.path(), &["site.yml"]).with_extra_vars("env=prod"))
        .await
        .unwrap();

    let launches = backend.launches();
    assert!(!launches[0].command.contains(&"--extra-vars".to_string()));
    assert_eq!(
        &launches[1].command[launches[1].command.len() - 2..],
        &["--extra-vars".to_string(), "env=prod".to_string()]
    );
}

#[tokio::test]
async fn test_script_entry_point_runs_interpreter() {
    let dir = workspace(&["site.yml", "inventory.ini", "ansible-runner.py"]);
    let backend = ScriptedBackend::new(Script::Exit(0, "", ""));

    let request = request(dir.path(), &["site.yml"]).with_entry_point(EntryPoint::Script {
        path: "ansible-runner.py".into(),
        interpreter: "python3".to_string(),
    });
    orchestrator(backend.clone()).run(&request).await.unwrap();

    let command = &backend.launches()[0].command;
    assert_eq!(command[0], "python3");
    assert_eq!(command[1], "/home/ansible/ansible-runner.py");
}
