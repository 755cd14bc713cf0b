use crate::execution::{BackendError, BackendOutput, ContainerLaunch, ExecutionBackend};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use uuid::Uuid;

/// Exit codes `docker run` (and `podman run`) use for failures of the
/// runtime itself rather than of the containerized command.
const RUNTIME_ERROR: i32 = 125;
const COMMAND_NOT_INVOKABLE: i32 = 126;
const COMMAND_NOT_FOUND: i32 = 127;

/// Runs containers through a Docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerCliBackend {
    program: String,
}

impl Default for DockerCliBackend {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn locate(&self) -> Result<PathBuf, BackendError> {
        which::which(&self.program).map_err(|e| {
            BackendError::Unavailable(format!(
                "container runtime '{}' not found: {e}",
                self.program
            ))
        })
    }

    /// A fresh container name for one launch.
    pub fn container_name() -> String {
        format!("rustle-provision-{}", Uuid::new_v4().simple())
    }

    /// The shell-quoted command line `launch` starts a container with.
    pub fn command_line(&self, launch: &ContainerLaunch, name: &str) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(self.run_args(launch, name));
        shell_words::join(words)
    }

    pub fn run_args(&self, launch: &ContainerLaunch, name: &str) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if launch.remove_on_exit {
            args.push("--rm".to_string());
        }
        args.push("--name".to_string());
        args.push(name.to_string());
        for mount in &launch.mounts {
            args.push("-v".to_string());
            args.push(mount.to_volume_arg());
        }
        args.push(launch.image.clone());
        args.extend(launch.command.iter().cloned());
        args
    }
}

#[async_trait]
impl ExecutionBackend for DockerCliBackend {
    async fn launch(&self, launch: &ContainerLaunch) -> Result<BackendOutput, BackendError> {
        let program = self.locate()?;
        let name = Self::container_name();
        debug!("Starting container: {}", self.command_line(launch, &name));

        let mut child = Command::new(&program)
            .args(self.run_args(launch, &name))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::Unavailable(format!("failed to execute {}: {e}", self.program))
            })?;

        let mut guard = ContainerGuard {
            program,
            name,
            armed: true,
        };

        let collect = collect_output(&mut child);
        let (status, output) = match launch.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, collect).await {
                Ok(collected) => collected,
                Err(_) => return Err(BackendError::Timeout(timeout)),
            },
            None => collect.await,
        }
        .map_err(|e| BackendError::Unavailable(format!("failed to wait for container: {e}")))?;
        guard.armed = false;

        match status.code() {
            None => Err(BackendError::Unavailable(format!(
                "{} was terminated by a signal",
                self.program
            ))),
            Some(code @ (RUNTIME_ERROR | COMMAND_NOT_INVOKABLE | COMMAND_NOT_FOUND)) => {
                let detail = output.stderr.trim();
                Err(BackendError::Unavailable(if detail.is_empty() {
                    format!("{} run failed with exit code {code}", self.program)
                } else {
                    detail.to_string()
                }))
            }
            Some(exit_code) => Ok(BackendOutput {
                exit_code,
                ..output
            }),
        }
    }
}

/// Drain both pipes concurrently, keeping each stream on its own and both
/// together in arrival order, then reap the child.
async fn collect_output(
    child: &mut Child,
) -> std::io::Result<(std::process::ExitStatus, BackendOutput)> {
    let mut stdout = child.stdout.take().map(line_reader);
    let mut stderr = child.stderr.take().map(line_reader);
    let mut output = BackendOutput::default();

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            line = next_line(&mut stdout), if stdout.is_some() => match line? {
                Some(line) => {
                    output.stdout.push_str(&line);
                    output.combined.push_str(&line);
                }
                None => stdout = None,
            },
            line = next_line(&mut stderr), if stderr.is_some() => match line? {
                Some(line) => {
                    output.stderr.push_str(&line);
                    output.combined.push_str(&line);
                }
                None => stderr = None,
            },
        }
    }

    let status = child.wait().await?;
    Ok((status, output))
}

type LineReader = tokio::io::Split<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

fn line_reader(pipe: impl AsyncRead + Send + Unpin + 'static) -> LineReader {
    let pipe: Box<dyn AsyncRead + Send + Unpin> = Box::new(pipe);
    BufReader::new(pipe).split(b'\n')
}

/// Next line including its newline, or `None` at end of stream.
async fn next_line(reader: &mut Option<LineReader>) -> std::io::Result<Option<String>> {
    let Some(reader) = reader.as_mut() else {
        return Ok(None);
    };
    Ok(reader.next_segment().await?.map(|mut segment| {
        segment.push(b'\n');
        String::from_utf8_lossy(&segment).into_owned()
    }))
}

/// Force-removes the named container if the launch is abandoned before the
/// container exits (deadline or caller cancellation). Killing the CLI
/// client alone leaves the container running.
struct ContainerGuard {
    program: PathBuf,
    name: String,
    armed: bool,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Removing abandoned container {}", self.name);
        if let Err(e) = std::process::Command::new(&self.program)
            .args(["rm", "-f", &self.name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            warn!("Failed to remove container {}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MountMode, MountSpec};

    #[test]
    fn test_run_args_layout() {
        let backend = DockerCliBackend::default();
        let launch = ContainerLaunch {
            image: "ansible-v2".to_string(),
            command: vec![
                "ansible-playbook".to_string(),
                "/home/ansible/site.yml".to_string(),
            ],
            mounts: vec![MountSpec {
                source: PathBuf::from("/srv/site.yml"),
                target: "/home/ansible/site.yml".to_string(),
                mode: MountMode::ReadOnly,
            }],
            remove_on_exit: true,
            timeout: None,
        };

        assert_eq!(
            backend.run_args(&launch, "c1"),
            vec![
                "run",
                "--rm",
                "--name",
                "c1",
                "-v",
                "/srv/site.yml:/home/ansible/site.yml:ro",
                "ansible-v2",
                "ansible-playbook",
                "/home/ansible/site.yml",
            ]
        );
    }

    #[test]
    fn test_command_line_matches_run_args() {
        let backend = DockerCliBackend::new("podman");
        let launch = ContainerLaunch {
            image: "ansible-v2".to_string(),
            command: vec!["ansible-playbook".to_string(), "site.yml".to_string()],
            mounts: vec![],
            remove_on_exit: true,
            timeout: None,
        };
        assert_eq!(
            backend.command_line(&launch, "c1"),
            "podman run --rm --name c1 ansible-v2 ansible-playbook site.yml"
        );
        assert!(DockerCliBackend::container_name().starts_with("rustle-provision-"));
    }

    #[tokio::test]
    async fn test_missing_runtime_is_unavailable() {
        let backend = DockerCliBackend::new("definitely-not-a-container-runtime");
        let launch = ContainerLaunch {
            image: "img".to_string(),
            command: vec![],
            mounts: vec![],
            remove_on_exit: true,
            timeout: None,
        };
        let err = backend.launch(&launch).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(msg) if msg.contains("not found")));
    }
}
