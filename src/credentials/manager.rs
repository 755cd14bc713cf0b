use crate::credentials::{CredentialError, KeyGenerator, PublicKey, Result, SshKeygen};
use crate::types::KeyPair;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_KEY_BITS: u32 = 2048;

/// Creates or imports the key pair used to reach managed hosts.
///
/// An existing pair is never regenerated: hosts already trusting the public
/// key would silently stop accepting the new one.
pub struct KeyManager {
    generator: Arc<dyn KeyGenerator>,
    bits: u32,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyManager {
    pub fn new() -> Self {
        Self::with_generator(Arc::new(SshKeygen::new()))
    }

    pub fn with_generator(generator: Arc<dyn KeyGenerator>) -> Self {
        Self {
            generator,
            bits: DEFAULT_KEY_BITS,
        }
    }

    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Return the pair at `dir/name`, generating it only when it is absent.
    pub async fn ensure_key_pair(&self, dir: &Path, name: &str) -> Result<KeyPair> {
        let pair = KeyPair::from_private_key(dir.join(name));

        if pair.exists() {
            info!(
                "SSH key pair already exists: {} and {}",
                pair.private_key_path.display(),
                pair.public_key_path.display()
            );
            return Ok(pair);
        }

        // An existing private key may already be trusted somewhere; never
        // replace it. An orphaned public half is cleared since ssh-keygen
        // prompts before overwriting.
        if pair.private_key_path.is_file() {
            return Err(CredentialError::MissingKeyFile {
                path: pair.public_key_path.display().to_string(),
            });
        }
        if pair.public_key_path.is_file() {
            warn!(
                "Removing public key without a private key: {}",
                pair.public_key_path.display()
            );
            std::fs::remove_file(&pair.public_key_path)?;
        }

        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }

        self.generator
            .generate(&pair.private_key_path, self.bits)
            .await?;

        if let Some(missing) = pair.missing_files().first() {
            return Err(CredentialError::KeyGeneration {
                path: pair.private_key_path.display().to_string(),
                reason: format!("generator did not produce {}", missing.display()),
            });
        }

        restrict_private_key(&pair.private_key_path)?;

        info!(
            "Generated SSH key pair: {} and {}",
            pair.private_key_path.display(),
            pair.public_key_path.display()
        );
        Ok(pair)
    }

    /// Adopt an existing private key and its public sibling, named either
    /// `<private>.pub` or `<stem>.pub`. Fails instead of generating a
    /// replacement when either file is missing.
    pub fn import_key_pair(&self, private_key_path: &Path) -> Result<KeyPair> {
        let pair = KeyPair::locate(private_key_path);

        if let Some(missing) = pair.missing_files().first() {
            return Err(CredentialError::MissingKeyFile {
                path: missing.display().to_string(),
            });
        }

        debug!(
            "Imported SSH key pair {} ({})",
            pair.private_key_path.display(),
            describe_public_key(&pair)
        );
        Ok(pair)
    }
}

/// Load the public half of a pair.
pub fn read_public_key(pair: &KeyPair) -> Result<PublicKey> {
    PublicKey::from_file(&pair.public_key_path)
}

fn describe_public_key(pair: &KeyPair) -> String {
    match read_public_key(pair) {
        Ok(key) => key.fingerprint(),
        Err(e) => format!("unreadable public key: {e}"),
    }
}

#[cfg(unix)]
fn restrict_private_key(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_private_key(_path: &Path) -> Result<()> {
    Ok(())
}
