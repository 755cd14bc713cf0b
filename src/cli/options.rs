use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Main rustle-provision CLI interface
#[derive(Parser)]
#[command(name = "rustle-provision")]
#[command(about = "Prepare hosts for Ansible connections and run playbooks in a container")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ProvisionCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Prepare hosts: create or import a key, upload it, write an inventory
    Setup(SetupArgs),

    /// Generate a grouped UNIX/WINDOWS/SSH inventory from host-list files
    Inventory(InventoryArgs),

    /// Run playbooks inside the automation container
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SetupArgs {
    /// Generate a new SSH key pair (kept if it already exists)
    #[arg(long, conflicts_with = "import_key")]
    pub generate_key: bool,

    /// Path to an existing private SSH key
    #[arg(long, value_name = "PATH")]
    pub import_key: Option<PathBuf>,

    /// Directory for a generated key pair
    #[arg(long)]
    pub key_dir: Option<PathBuf>,

    /// File name of a generated private key
    #[arg(long)]
    pub key_name: Option<String>,

    /// Upload the public key to every host in --hosts-file
    #[arg(long)]
    pub upload_key: bool,

    /// Write a flat inventory for the hosts in --hosts-file
    #[arg(long)]
    pub generate_inventory: bool,

    /// File listing one host per line
    #[arg(long)]
    pub hosts_file: Option<PathBuf>,

    /// SSH port used for uploading keys and written to the inventory
    #[arg(long)]
    pub port: Option<u16>,

    /// Remote login user
    #[arg(long)]
    pub user: Option<String>,

    /// Remote login password
    #[arg(long)]
    pub password: Option<String>,

    /// Inventory file to write
    #[arg(long, default_value = "inventory.ini")]
    pub inventory_path: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct InventoryArgs {
    /// Path to the UNIX hosts file
    #[arg(long, default_value = "unix_hosts.txt")]
    pub unix_hosts_file: PathBuf,

    /// Path to the Windows hosts file
    #[arg(long, default_value = "win_hosts.txt")]
    pub windows_hosts_file: PathBuf,

    /// Path to the SSH hosts file
    #[arg(long, default_value = "ssh_hosts.txt")]
    pub ssh_hosts_file: PathBuf,

    /// Ansible user name
    #[arg(long)]
    pub user: Option<String>,

    /// Ansible password
    #[arg(long)]
    pub password: Option<String>,

    /// Ansible SSH port
    #[arg(long)]
    pub port: Option<u16>,

    /// SSH private key file (defaults to the configured key)
    #[arg(long)]
    pub private_key: Option<PathBuf>,

    /// SSH public key file (defaults to <private key>.pub)
    #[arg(long)]
    pub public_key: Option<PathBuf>,

    /// Inventory file to write
    #[arg(long, default_value = "inventory.ini")]
    pub inventory_path: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Playbook to run (repeatable)
    #[arg(long = "playbook", value_name = "PATH", required_unless_present = "script")]
    pub playbooks: Vec<PathBuf>,

    /// Inventory file to use
    #[arg(long, default_value = "inventory.ini")]
    pub inventory: PathBuf,

    /// Additional variables passed through to the playbook
    #[arg(long)]
    pub extra_vars: Option<String>,

    /// Base directory for relative input paths
    #[arg(long, default_value = ".")]
    pub working_directory: PathBuf,

    /// Directory the container writes results into
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Runner script to invoke instead of ansible-playbook
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Interpreter for --script
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Container image
    #[arg(long)]
    pub image: Option<String>,

    /// Container CLI (docker, podman)
    #[arg(long)]
    pub runtime: Option<String>,

    /// Abort the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the container invocation instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
