use anyhow::{Context, Result};
use clap::Parser;
use rustle_provision::cli::{
    failure_diagnostic, plan_playbooks, print_execution_result, print_inventory_summary,
    print_json, print_launch, print_setup_report, report_host_failures, run_exit_code,
    run_inventory, run_playbooks, run_setup, untouched_notice, Commands, OutputFormat,
    ProvisionCli, RunArgs, SetupArgs, EXIT_ERROR,
};
use rustle_provision::credentials::SshKeygen;
use rustle_provision::execution::DockerCliBackend;
use rustle_provision::trust::Ssh2Connector;
use rustle_provision::ProvisionConfig;
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = ProvisionCli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(EXIT_ERROR);
    }

    info!("Starting rustle-provision v{}", env!("CARGO_PKG_VERSION"));

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            if let Some(notice) = untouched_notice(&e) {
                eprintln!("{notice}");
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing(cli: &ProvisionCli) -> Result<()> {
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn dispatch(cli: ProvisionCli) -> Result<u8> {
    let config =
        ProvisionConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Setup(args) => setup(&config, &args).await,
        Commands::Inventory(args) => {
            let document = run_inventory(&config, &args)?;
            print_inventory_summary(&args.inventory_path, &document);
            Ok(0)
        }
        Commands::Run(args) => run(&config, &args).await,
    }
}

async fn setup(config: &ProvisionConfig, args: &SetupArgs) -> Result<u8> {
    let connector = Arc::new(Ssh2Connector::new(
        config
            .timeouts
            .session
            .unwrap_or(std::time::Duration::from_secs(30)),
    ));
    let keygen = Arc::new(SshKeygen::new());

    let report = run_setup(config, args, connector, keygen).await?;

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_setup_report(&report),
    }
    if let Some(summary) = &report.distribution {
        report_host_failures(summary);
    }
    Ok(report.exit_code())
}

async fn run(config: &ProvisionConfig, args: &RunArgs) -> Result<u8> {
    let runtime = args
        .runtime
        .clone()
        .unwrap_or_else(|| config.execution.runtime.clone());
    let backend = DockerCliBackend::new(runtime);

    if args.dry_run {
        let launch = plan_playbooks(config, args, Arc::new(backend.clone()))?;
        match args.format {
            OutputFormat::Json => print_json(&launch)?,
            OutputFormat::Text => print_launch(&backend, &launch),
        }
        return Ok(0);
    }

    let result = run_playbooks(config, args, Arc::new(backend)).await?;

    match args.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_execution_result(&result),
    }
    if let Some(diagnostic) = failure_diagnostic(&result) {
        eprintln!("{diagnostic}");
    }
    Ok(run_exit_code(&result))
}
