use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Hosts file not found: {path}")]
    MissingHostsFile { path: String },

    #[error("Invalid INI format at line {line}: {reason}")]
    InvalidIni { line: usize, reason: String },

    #[error("Failed to write inventory {path}: {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
