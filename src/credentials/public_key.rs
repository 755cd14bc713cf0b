use crate::credentials::{CredentialError, Result};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// One OpenSSH public key line: `<type> <base64 blob> [comment]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: String,
    pub blob: String,
    pub comment: Option<String>,
}

impl PublicKey {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let key_type = parts.next()?;
        let blob = parts.next()?;
        if !key_type.starts_with("ssh-")
            && !key_type.starts_with("ecdsa-")
            && !key_type.starts_with("sk-")
        {
            return None;
        }
        STANDARD.decode(blob).ok()?;

        let comment = parts.collect::<Vec<_>>().join(" ");
        Some(Self {
            key_type: key_type.to_string(),
            blob: blob.to_string(),
            comment: if comment.is_empty() {
                None
            } else {
                Some(comment)
            },
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let line = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();
        Self::parse(line).ok_or_else(|| CredentialError::InvalidPublicKey {
            path: path.display().to_string(),
            reason: "expected '<type> <base64> [comment]'".to_string(),
        })
    }

    /// Same key material, regardless of comment.
    pub fn same_key(&self, other: &PublicKey) -> bool {
        self.key_type == other.key_type && self.blob == other.blob
    }

    /// `SHA256:<base64>` fingerprint as printed by `ssh-keygen -l`.
    pub fn fingerprint(&self) -> String {
        let raw = STANDARD.decode(&self.blob).unwrap_or_default();
        let digest = Sha256::digest(&raw);
        format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key_type, self.blob)?;
        if let Some(comment) = &self.comment {
            write!(f, " {comment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAABAgMEBQYHCAkKCwwNDg8QERITFBUWFxgZGhscHR4f ops@bastion";

    #[test]
    fn test_parse_with_comment() {
        let key = PublicKey::parse(KEY).unwrap();
        assert_eq!(key.key_type, "ssh-ed25519");
        assert_eq!(key.comment.as_deref(), Some("ops@bastion"));
        assert_eq!(key.to_string(), KEY);
    }

    #[test]
    fn test_same_key_ignores_comment() {
        let a = PublicKey::parse(KEY).unwrap();
        let mut b = a.clone();
        b.comment = Some("someone-else".to_string());
        assert!(a.same_key(&b));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(PublicKey::parse("not a key").is_none());
        assert!(PublicKey::parse("ssh-rsa !!!notbase64").is_none());
        assert!(PublicKey::parse("").is_none());
    }

    #[test]
    fn test_fingerprint_format() {
        let key = PublicKey::parse(KEY).unwrap();
        let fp = key.fingerprint();
        assert!(fp.starts_with("SHA256:"));
        assert!(!fp.ends_with('='));
    }
}
