use crate::credentials::{CredentialError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Produces a new passphrase-less key pair at `private_key_path` and
/// `<private_key_path>.pub`.
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    async fn generate(&self, private_key_path: &Path, bits: u32) -> Result<()>;
}

/// Generates RSA keys with the local `ssh-keygen` binary.
#[derive(Debug, Clone)]
pub struct SshKeygen {
    program: String,
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::new()
    }
}

impl SshKeygen {
    pub fn new() -> Self {
        Self {
            program: "ssh-keygen".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl KeyGenerator for SshKeygen {
    async fn generate(&self, private_key_path: &Path, bits: u32) -> Result<()> {
        let path_display = private_key_path.display().to_string();
        debug!("Running {} for {}", self.program, path_display);

        let output = Command::new(&self.program)
            .arg("-t")
            .arg("rsa")
            .arg("-b")
            .arg(bits.to_string())
            .arg("-f")
            .arg(private_key_path)
            .arg("-q")
            .arg("-N")
            .arg("")
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| CredentialError::KeyGeneration {
                path: path_display.clone(),
                reason: format!("Failed to execute {}: {e}", self.program),
            })?;

        if !output.status.success() {
            return Err(CredentialError::KeyGeneration {
                path: path_display,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
