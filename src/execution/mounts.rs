use crate::execution::{ExecutionError, Result};
use crate::types::{EntryPoint, ExecutionRequest, MountMode, MountSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const INVENTORY_FILE_NAME: &str = "inventory.ini";
pub const PLAYBOOK_PROGRAM: &str = "ansible-playbook";

/// Where inputs live inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLayout {
    pub context_root: String,
    pub results_mount: String,
}

impl Default for ContextLayout {
    fn default() -> Self {
        Self {
            context_root: "/home/ansible".to_string(),
            results_mount: "/tmp".to_string(),
        }
    }
}

impl ContextLayout {
    fn path_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.context_root.trim_end_matches('/'), file_name)
    }
}

/// Validated mounts and in-container paths for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    pub mounts: Vec<MountSpec>,
    pub playbooks: Vec<String>,
    pub inventory: String,
    pub script: Option<String>,
}

impl MountPlan {
    /// Resolve every input to an absolute path, check it exists, and assign
    /// each a distinct location under the context root.
    pub fn build(request: &ExecutionRequest, layout: &ContextLayout) -> Result<Self> {
        if request.playbooks.is_empty() && request.entry_point == EntryPoint::Playbook {
            return Err(ExecutionError::NoPlaybooks);
        }

        let base = absolute_base(&request.working_directory)?;
        let mut planner = Planner::new(layout);

        let script = match &request.entry_point {
            EntryPoint::Script { path, .. } => {
                let source = resolve_input(&base, path, "entry script")?;
                Some(planner.read_only(source)?)
            }
            EntryPoint::Playbook => None,
        };

        let inventory_source = resolve_input(&base, &request.inventory, "inventory")?;
        let inventory = planner.read_only_as(inventory_source, INVENTORY_FILE_NAME)?;

        let mut playbooks = Vec::with_capacity(request.playbooks.len());
        for playbook in &request.playbooks {
            let source = resolve_input(&base, playbook, "playbook")?;
            playbooks.push(planner.read_only(source)?);
        }

        let results = prepare_results_directory(&base.join(&request.results_directory))?;
        planner.mounts.push(MountSpec {
            source: results,
            target: layout.results_mount.clone(),
            mode: MountMode::ReadWrite,
        });

        for mount in &planner.mounts {
            debug!("Mount {}", mount.to_volume_arg());
        }

        Ok(Self {
            mounts: planner.mounts,
            playbooks,
            inventory,
            script,
        })
    }

    /// Entry point, inventory flag, then `--extra-vars` when given.
    pub fn command(&self, entry_point: &EntryPoint, extra_vars: Option<&str>) -> Vec<String> {
        let mut command = match (entry_point, &self.script) {
            (EntryPoint::Script { interpreter, .. }, Some(script)) => {
                vec![interpreter.clone(), script.clone()]
            }
            _ => {
                let mut command = vec![PLAYBOOK_PROGRAM.to_string()];
                command.extend(self.playbooks.iter().cloned());
                command
            }
        };

        command.push("-i".to_string());
        command.push(self.inventory.clone());

        if let Some(extra_vars) = extra_vars.filter(|v| !v.is_empty()) {
            command.push("--extra-vars".to_string());
            command.push(extra_vars.to_string());
        }
        command
    }
}

struct Planner<'a> {
    layout: &'a ContextLayout,
    mounts: Vec<MountSpec>,
    targets: HashMap<String, PathBuf>,
}

impl<'a> Planner<'a> {
    fn new(layout: &'a ContextLayout) -> Self {
        Self {
            layout,
            mounts: Vec::new(),
            targets: HashMap::new(),
        }
    }

    fn read_only(&mut self, source: PathBuf) -> Result<String> {
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        self.read_only_as(source, &file_name)
    }

    fn read_only_as(&mut self, source: PathBuf, file_name: &str) -> Result<String> {
        let target = self.layout.path_for(file_name);

        if let Some(existing) = self.targets.get(&target) {
            if existing == &source {
                return Ok(target);
            }
            return Err(ExecutionError::MountCollision {
                target,
                first: existing.display().to_string(),
                second: source.display().to_string(),
            });
        }

        self.targets.insert(target.clone(), source.clone());
        self.mounts.push(MountSpec {
            source,
            target: target.clone(),
            mode: MountMode::ReadOnly,
        });
        Ok(target)
    }
}

fn absolute_base(working_directory: &Path) -> Result<PathBuf> {
    if working_directory.is_absolute() {
        Ok(working_directory.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(working_directory))
    }
}

fn resolve_input(base: &Path, path: &Path, kind: &str) -> Result<PathBuf> {
    let candidate = base.join(path);
    if !candidate.is_file() {
        return Err(ExecutionError::MissingInput {
            kind: kind.to_string(),
            path: candidate.display().to_string(),
        });
    }
    Ok(candidate.canonicalize()?)
}

fn prepare_results_directory(path: &Path) -> Result<PathBuf> {
    let unusable = |reason: String| ExecutionError::ResultsDirectory {
        path: path.display().to_string(),
        reason,
    };

    if path.exists() && !path.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }
    std::fs::create_dir_all(path).map_err(|e| unusable(e.to_string()))?;
    tempfile::tempfile_in(path).map_err(|e| unusable(format!("not writable: {e}")))?;

    Ok(path.canonicalize()?)
}
