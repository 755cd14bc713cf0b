use crate::cli::commands::SetupReport;
use crate::error::ProvisionError;
use crate::execution::{ContainerLaunch, DockerCliBackend};
use crate::inventory::InventoryDocument;
use crate::trust::{DistributionSummary, HostStatus};
use crate::types::{ExecutionResult, InfrastructureKind};
use serde::Serialize;
use std::path::Path;

pub const BACKEND_UNAVAILABLE_PREFIX: &str = "automation backend unavailable:";
pub const BACKEND_TIMEOUT_PREFIX: &str = "automation backend timed out:";
pub const ENGINE_FAILURE_PREFIX: &str = "automation engine reported an error";
pub const HOST_UNREACHABLE_PREFIX: &str = "host unreachable:";
pub const UNTOUCHED_NOTICE: &str =
    "Nothing was changed: no host was contacted and no container was started.";

/// Notice for a fatal error caught from static inputs alone.
pub fn untouched_notice(error: &anyhow::Error) -> Option<&'static str> {
    error
        .downcast_ref::<ProvisionError>()
        .filter(|e| e.is_static())
        .map(|_| UNTOUCHED_NOTICE)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_setup_report(report: &SetupReport) {
    println!("🔑 SSH key pair");
    println!("  • private: {}", report.key_pair.private_key_path.display());
    println!("  • public:  {}", report.key_pair.public_key_path.display());
    println!("  • fingerprint: {}", report.key_fingerprint);

    if let Some(summary) = &report.distribution {
        println!();
        print_distribution(summary);
    }

    if let Some(path) = &report.inventory_path {
        println!();
        println!("📋 Inventory written to {}", path.display());
    }
}

fn print_distribution(summary: &DistributionSummary) {
    println!("📤 Key upload ({} host(s)):", summary.outcomes.len());
    for outcome in &summary.outcomes {
        match &outcome.status {
            HostStatus::Installed => println!("  ✅ {}: installed", outcome.host),
            HostStatus::AlreadyPresent => println!("  ✅ {}: already present", outcome.host),
            HostStatus::Failed { stage, reason, .. } => {
                println!("  ❌ {}: failed at {:?}: {}", outcome.host, stage, reason)
            }
        }
    }
    println!(
        "  {} installed, {} already present, {} failed",
        summary.installed(),
        summary.already_present(),
        summary.failed()
    );
}

/// One stderr line per host whose upload failed.
pub fn report_host_failures(summary: &DistributionSummary) {
    for outcome in summary.failures() {
        if let HostStatus::Failed { reason, .. } = &outcome.status {
            eprintln!("{} {}: {}", HOST_UNREACHABLE_PREFIX, outcome.host, reason);
        }
    }
}

pub fn print_inventory_summary(path: &Path, document: &InventoryDocument) {
    println!("📋 Inventory written to {}", path.display());
    for section in document.sections().iter().filter(|s| !s.is_vars()) {
        println!("  • [{}] {} host(s)", section.name, section.entries.len());
    }
}

/// Print the exact invocation `backend` would run for `launch`.
pub fn print_launch(backend: &DockerCliBackend, launch: &ContainerLaunch) {
    println!("🐳 Container invocation (dry run):");
    let name = DockerCliBackend::container_name();
    println!("  {}", backend.command_line(launch, &name));
}

pub fn print_execution_result(result: &ExecutionResult) {
    match result {
        ExecutionResult::Success { output } => {
            print!("{output}");
            if !output.is_empty() && !output.ends_with('\n') {
                println!();
            }
            println!("✅ Ansible playbook executed successfully");
        }
        ExecutionResult::EngineFailure { exit_code, .. } => {
            println!("❌ Ansible playbook failed (exit code {exit_code})");
        }
        ExecutionResult::InfrastructureFailure { kind, .. } => {
            println!("❌ Automation backend failure ({kind:?})");
        }
    }
}

/// Stderr diagnostic for a failed run. Each failure kind has its own prefix.
pub fn failure_diagnostic(result: &ExecutionResult) -> Option<String> {
    match result {
        ExecutionResult::Success { .. } => None,
        ExecutionResult::EngineFailure { exit_code, stderr } => {
            let detail = stderr.trim();
            Some(if detail.is_empty() {
                format!("{ENGINE_FAILURE_PREFIX} (exit code {exit_code})")
            } else {
                format!("{ENGINE_FAILURE_PREFIX} (exit code {exit_code}): {detail}")
            })
        }
        ExecutionResult::InfrastructureFailure { kind, message } => {
            let prefix = match kind {
                InfrastructureKind::Unavailable => BACKEND_UNAVAILABLE_PREFIX,
                InfrastructureKind::Timeout => BACKEND_TIMEOUT_PREFIX,
            };
            Some(format!("{prefix} {message}"))
        }
    }
}
