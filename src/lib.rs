//! Rustle Provision - host trust, inventory generation and containerized
//! playbook execution
//!
//! This crate prepares a fleet of UNIX, Windows and plain SSH hosts for
//! Ansible-style automation (key pair lifecycle, public key distribution,
//! grouped INI inventories) and runs playbooks against them inside a
//! disposable container, reporting engine failures separately from failures
//! to start the engine at all.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod execution;
pub mod inventory;
pub mod trust;
pub mod types;

pub use config::ProvisionConfig;
pub use error::{ProvisionError, Result};
pub use types::*;
