use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Key file not found: {path}")]
    MissingKeyFile { path: String },

    #[error("Key generation failed for {path}: {reason}")]
    KeyGeneration { path: String, reason: String },

    #[error("Invalid public key in {path}: {reason}")]
    InvalidPublicKey { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
