use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::execution::ExecutionError;
use crate::inventory::InventoryError;
use thiserror::Error;

/// Fatal errors. Per-host trust failures and engine/backend failures are
/// not errors: they are reported as outcomes and results.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ProvisionError {
    /// Whether the error was detected from static inputs, before any remote
    /// or container I/O.
    pub fn is_static(&self) -> bool {
        match self {
            ProvisionError::Configuration(_) | ProvisionError::Config(_) => true,
            ProvisionError::Credential(e) => matches!(e, CredentialError::MissingKeyFile { .. }),
            ProvisionError::Inventory(e) => matches!(e, InventoryError::MissingHostsFile { .. }),
            ProvisionError::Execution(e) => !matches!(e, ExecutionError::Io(_)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
