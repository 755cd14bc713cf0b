use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension appended to a private key path to locate its public half.
pub const PUBLIC_KEY_SUFFIX: &str = ".pub";

/// Private/public key file pair on the local filesystem.
///
/// A pair is only considered usable when both files are present. Instances
/// are produced by the credential manager and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

impl KeyPair {
    /// Build a pair from a private key path, deriving the public key path by
    /// the `ssh-keygen` convention (`<private>.pub`).
    pub fn from_private_key(private_key_path: impl Into<PathBuf>) -> Self {
        let private_key_path = private_key_path.into();
        let public_key_path = public_key_path_for(&private_key_path);
        Self {
            private_key_path,
            public_key_path,
        }
    }

    /// Pair for an existing private key whose public half may be named
    /// either `<private>.pub` or `<stem>.pub`. The first candidate on disk
    /// wins; with neither present the pair points at `<private>.pub`.
    pub fn locate(private_key_path: impl Into<PathBuf>) -> Self {
        let private_key_path = private_key_path.into();
        let candidates = public_key_candidates(&private_key_path);
        let public_key_path = candidates
            .iter()
            .find(|path| path.is_file())
            .unwrap_or(&candidates[0])
            .clone();
        Self {
            private_key_path,
            public_key_path,
        }
    }

    pub fn exists(&self) -> bool {
        self.private_key_path.is_file() && self.public_key_path.is_file()
    }

    /// Paths of the pair that are not present on disk.
    pub fn missing_files(&self) -> Vec<&Path> {
        [&self.private_key_path, &self.public_key_path]
            .into_iter()
            .filter(|path| !path.is_file())
            .map(PathBuf::as_path)
            .collect()
    }
}

pub fn public_key_path_for(private_key_path: &Path) -> PathBuf {
    let mut raw = private_key_path.as_os_str().to_os_string();
    raw.push(PUBLIC_KEY_SUFFIX);
    PathBuf::from(raw)
}

/// Public key paths tried for a private key, in order: the suffix appended,
/// then the extension replaced when that names a different file.
pub fn public_key_candidates(private_key_path: &Path) -> Vec<PathBuf> {
    let appended = public_key_path_for(private_key_path);
    let replaced = private_key_path.with_extension("pub");
    if replaced == appended || replaced == private_key_path {
        vec![appended]
    } else {
        vec![appended, replaced]
    }
}
