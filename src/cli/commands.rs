use crate::cli::options::{InventoryArgs, RunArgs, SetupArgs};
use crate::config::ProvisionConfig;
use crate::credentials::{read_public_key, KeyGenerator, KeyManager};
use crate::error::{ProvisionError, Result};
use crate::execution::{
    ContainerLaunch, ContextLayout, ExecutionBackend, ExecutionOrchestrator, OrchestratorSettings,
};
use crate::inventory::{
    load_hosts_file, GroupedHosts, InventoryBuilder, InventoryDocument, InventoryError, ProfileSet,
};
use crate::trust::{Deadlines, DistributionSummary, RemoteConnector, TrustDistributor};
use crate::types::{EntryPoint, ExecutionRequest, ExecutionResult, HostClass, KeyPair};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_ENGINE_FAILURE: u8 = 2;
pub const EXIT_INFRASTRUCTURE_FAILURE: u8 = 3;
pub const EXIT_HOST_FAILURES: u8 = 4;

/// What a `setup` invocation did.
#[derive(Debug, Clone, Serialize)]
pub struct SetupReport {
    pub key_pair: KeyPair,
    pub key_fingerprint: String,
    pub distribution: Option<DistributionSummary>,
    pub inventory_path: Option<PathBuf>,
}

impl SetupReport {
    pub fn exit_code(&self) -> u8 {
        match &self.distribution {
            Some(summary) if summary.failed() > 0 => EXIT_HOST_FAILURES,
            _ => EXIT_SUCCESS,
        }
    }
}

pub fn run_exit_code(result: &ExecutionResult) -> u8 {
    match result {
        ExecutionResult::Success { .. } => EXIT_SUCCESS,
        ExecutionResult::EngineFailure { .. } => EXIT_ENGINE_FAILURE,
        ExecutionResult::InfrastructureFailure { .. } => EXIT_INFRASTRUCTURE_FAILURE,
    }
}

/// Credentials, optional key upload and optional flat inventory.
///
/// Flag combinations and input files are checked before any key is
/// generated or any host is contacted.
pub async fn run_setup(
    config: &ProvisionConfig,
    args: &SetupArgs,
    connector: Arc<dyn RemoteConnector>,
    keygen: Arc<dyn KeyGenerator>,
) -> Result<SetupReport> {
    let hosts_file = validate_setup(args)?;

    let user = args.user.as_deref().unwrap_or(&config.connection.user);
    let password = args
        .password
        .as_deref()
        .unwrap_or(&config.connection.password);
    let port = args.port.unwrap_or(config.connection.port);

    let hosts = match &hosts_file {
        Some(path) => load_hosts_file(path)?,
        None => Vec::new(),
    };

    let manager = KeyManager::with_generator(keygen).with_bits(config.keys.bits);
    let key_pair = match &args.import_key {
        Some(path) => manager.import_key_pair(path)?,
        None => {
            let dir = args.key_dir.as_ref().unwrap_or(&config.keys.directory);
            let name = args.key_name.as_deref().unwrap_or(&config.keys.name);
            manager.ensure_key_pair(dir, name).await?
        }
    };
    let public_key = read_public_key(&key_pair)?;

    let distribution = if args.upload_key {
        let distributor = TrustDistributor::new(connector)
            .with_deadlines(Deadlines {
                session: config.timeouts.session,
                command: config.timeouts.command,
            })
            .with_span(info_span!("setup.trust"));
        let summary = distributor
            .distribute_with_summary(&hosts, user, password, &public_key, port)
            .await;
        info!(
            "Key upload finished: {} installed, {} already present, {} failed",
            summary.installed(),
            summary.already_present(),
            summary.failed()
        );
        Some(summary)
    } else {
        None
    };

    let inventory_path = if args.generate_inventory {
        let grouped = GroupedHosts::new().with(HostClass::All, hosts);
        let profiles = ProfileSet::flat(user, password, port, Some(&key_pair));
        let builder = InventoryBuilder::new().with_span(info_span!("setup.inventory"));
        let document = builder.build(&grouped, &profiles);
        document.write_atomic(&args.inventory_path)?;
        info!("Created inventory file: {}", args.inventory_path.display());
        Some(args.inventory_path.clone())
    } else {
        None
    };

    Ok(SetupReport {
        key_fingerprint: public_key.fingerprint(),
        key_pair,
        distribution,
        inventory_path,
    })
}

fn validate_setup(args: &SetupArgs) -> Result<Option<PathBuf>> {
    match (args.generate_key, &args.import_key) {
        (true, Some(_)) => {
            return Err(ProvisionError::Configuration(
                "--generate-key and --import-key are mutually exclusive".to_string(),
            ))
        }
        (false, None) => {
            return Err(ProvisionError::Configuration(
                "one of --generate-key or --import-key is required".to_string(),
            ))
        }
        _ => {}
    }

    let needs_hosts = args.upload_key || args.generate_inventory;
    match &args.hosts_file {
        None if needs_hosts => Err(ProvisionError::Configuration(
            "--hosts-file is required with --upload-key or --generate-inventory".to_string(),
        )),
        Some(path) if needs_hosts && !path.is_file() => {
            Err(ProvisionError::Inventory(InventoryError::MissingHostsFile {
                path: path.display().to_string(),
            }))
        }
        Some(_) if needs_hosts => Ok(args.hosts_file.clone()),
        _ => Ok(None),
    }
}

/// Grouped UNIX/WINDOWS/SSH inventory from three host-list files.
pub fn run_inventory(config: &ProvisionConfig, args: &InventoryArgs) -> Result<InventoryDocument> {
    let user = args.user.as_deref().unwrap_or(&config.connection.user);
    let password = args
        .password
        .as_deref()
        .unwrap_or(&config.connection.password);
    let port = args.port.unwrap_or(config.connection.port);

    let private_key = args
        .private_key
        .clone()
        .unwrap_or_else(|| config.keys.directory.join(&config.keys.name));
    let mut key_pair = KeyPair::locate(private_key);
    if let Some(public_key) = &args.public_key {
        key_pair.public_key_path = public_key.clone();
    }

    let sources = [
        (HostClass::Unix, args.unix_hosts_file.clone()),
        (HostClass::Windows, args.windows_hosts_file.clone()),
        (HostClass::Ssh, args.ssh_hosts_file.clone()),
    ];
    let profiles = ProfileSet::standard(user, password, port, Some(&key_pair));

    let document = InventoryBuilder::new().generate(&sources, &profiles, &args.inventory_path)?;
    Ok(document)
}

pub fn build_orchestrator(
    config: &ProvisionConfig,
    args: &RunArgs,
    backend: Arc<dyn ExecutionBackend>,
) -> ExecutionOrchestrator {
    let settings = OrchestratorSettings {
        image: args
            .image
            .clone()
            .unwrap_or_else(|| config.execution.image.clone()),
        layout: ContextLayout {
            context_root: config.execution.context_root.clone(),
            results_mount: config.execution.results_mount.clone(),
        },
        run_timeout: args.timeout.map(Duration::from_secs).or(config.timeouts.run),
        remove_on_exit: true,
    };
    ExecutionOrchestrator::new(backend, settings)
}

pub fn execution_request(config: &ProvisionConfig, args: &RunArgs) -> ExecutionRequest {
    let mut request = ExecutionRequest::new(args.playbooks.clone(), args.inventory.clone())
        .with_working_directory(args.working_directory.clone())
        .with_results_directory(
            args.results_dir
                .clone()
                .unwrap_or_else(|| config.execution.results_directory.clone()),
        );

    if let Some(extra_vars) = &args.extra_vars {
        request = request.with_extra_vars(extra_vars.clone());
    }
    if let Some(script) = &args.script {
        request = request.with_entry_point(EntryPoint::Script {
            path: script.clone(),
            interpreter: args
                .interpreter
                .clone()
                .unwrap_or_else(|| config.execution.interpreter.clone()),
        });
    }
    request
}

/// Validate inputs and return the launch without starting a container.
pub fn plan_playbooks(
    config: &ProvisionConfig,
    args: &RunArgs,
    backend: Arc<dyn ExecutionBackend>,
) -> Result<ContainerLaunch> {
    let orchestrator = build_orchestrator(config, args, backend);
    Ok(orchestrator.prepare(&execution_request(config, args))?)
}

pub async fn run_playbooks(
    config: &ProvisionConfig,
    args: &RunArgs,
    backend: Arc<dyn ExecutionBackend>,
) -> Result<ExecutionResult> {
    let orchestrator = build_orchestrator(config, args, backend);
    Ok(orchestrator.run(&execution_request(config, args)).await?)
}
