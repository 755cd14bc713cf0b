//! Key pair lifecycle with a counting generator

use async_trait::async_trait;
use rustle_provision::credentials::{
    read_public_key, CredentialError, KeyGenerator, KeyManager, Result,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const PUBLIC_KEY: &str =
    "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIAABAgMEBQYHCAkKCwwNDg8QERITFBUWFxgZGhscHR4f ansible@control\n";

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl KeyGenerator for CountingGenerator {
    async fn generate(&self, private_key_path: &Path, bits: u32) -> Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(
            private_key_path,
            format!("-----PRIVATE KEY {bits} #{n}-----\n"),
        )?;
        let mut public = private_key_path.as_os_str().to_os_string();
        public.push(".pub");
        std::fs::write(public, PUBLIC_KEY)?;
        Ok(())
    }
}

/// Writes only the private half, like a generator killed mid-way.
struct HalfGenerator;

#[async_trait]
impl KeyGenerator for HalfGenerator {
    async fn generate(&self, private_key_path: &Path, _bits: u32) -> Result<()> {
        std::fs::write(private_key_path, "private")?;
        Ok(())
    }
}

#[tokio::test]
async fn test_ensure_twice_keeps_files_and_skips_generator() {
    let dir = TempDir::new().unwrap();
    let generator = Arc::new(CountingGenerator::default());
    let manager = KeyManager::with_generator(generator.clone());

    let first = manager.ensure_key_pair(dir.path(), "ansible_key").await.unwrap();
    let private_before = std::fs::read(&first.private_key_path).unwrap();
    let public_before = std::fs::read(&first.public_key_path).unwrap();

    let second = manager.ensure_key_pair(dir.path(), "ansible_key").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&second.private_key_path).unwrap(), private_before);
    assert_eq!(std::fs::read(&second.public_key_path).unwrap(), public_before);
    assert_eq!(
        second.public_key_path,
        dir.path().join("ansible_key.pub")
    );
}

#[tokio::test]
async fn test_ensure_creates_missing_directory_and_uses_bits() {
    let dir = TempDir::new().unwrap();
    let key_dir = dir.path().join("keys/nested");
    let manager =
        KeyManager::with_generator(Arc::new(CountingGenerator::default())).with_bits(4096);

    let pair = manager.ensure_key_pair(&key_dir, "id_fleet").await.unwrap();

    assert!(pair.exists());
    let private = std::fs::read_to_string(&pair.private_key_path).unwrap();
    assert!(private.contains("4096"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&pair.private_key_path)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn test_private_key_without_public_half_is_kept() {
    let dir = TempDir::new().unwrap();
    let private = dir.path().join("ansible_key");
    std::fs::write(&private, "trusted elsewhere").unwrap();
    let generator = Arc::new(CountingGenerator::default());
    let manager = KeyManager::with_generator(generator.clone());

    let err = manager
        .ensure_key_pair(dir.path(), "ansible_key")
        .await
        .unwrap_err();

    match err {
        CredentialError::MissingKeyFile { path } => assert!(path.ends_with("ansible_key.pub")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        std::fs::read_to_string(&private).unwrap(),
        "trusted elsewhere"
    );
}

#[tokio::test]
async fn test_orphaned_public_key_is_regenerated() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ansible_key.pub"), "ssh-rsa AAAA old@host\n").unwrap();
    let generator = Arc::new(CountingGenerator::default());
    let manager = KeyManager::with_generator(generator.clone());

    let pair = manager.ensure_key_pair(dir.path(), "ansible_key").await.unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        std::fs::read_to_string(&pair.public_key_path).unwrap(),
        PUBLIC_KEY
    );
}

#[tokio::test]
async fn test_generator_that_skips_public_half_is_an_error() {
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::with_generator(Arc::new(HalfGenerator));

    let err = manager
        .ensure_key_pair(dir.path(), "ansible_key")
        .await
        .unwrap_err();

    assert!(matches!(err, CredentialError::KeyGeneration { .. }));
}

#[test]
fn test_import_requires_both_files() {
    let dir = TempDir::new().unwrap();
    let private = dir.path().join("deploy");
    std::fs::write(&private, "private").unwrap();
    let manager = KeyManager::with_generator(Arc::new(CountingGenerator::default()));

    let err = manager.import_key_pair(&private).unwrap_err();
    match err {
        CredentialError::MissingKeyFile { path } => assert!(path.ends_with("deploy.pub")),
        other => panic!("unexpected error: {other}"),
    }

    std::fs::write(dir.path().join("deploy.pub"), PUBLIC_KEY).unwrap();
    let pair = manager.import_key_pair(&private).unwrap();
    let key = read_public_key(&pair).unwrap();
    assert_eq!(key.comment.as_deref(), Some("ansible@control"));
}

#[test]
fn test_import_missing_private_key_names_it() {
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::with_generator(Arc::new(CountingGenerator::default()));

    let err = manager
        .import_key_pair(&dir.path().join("absent"))
        .unwrap_err();

    assert!(err.to_string().contains("absent"));
}

#[test]
fn test_import_accepts_public_key_with_replaced_extension() {
    let dir = TempDir::new().unwrap();
    let private = dir.path().join("deploy.rsa");
    std::fs::write(&private, "private").unwrap();
    std::fs::write(dir.path().join("deploy.pub"), PUBLIC_KEY).unwrap();
    let manager = KeyManager::with_generator(Arc::new(CountingGenerator::default()));

    let pair = manager.import_key_pair(&private).unwrap();

    assert_eq!(pair.public_key_path, dir.path().join("deploy.pub"));
    assert!(read_public_key(&pair).is_ok());
}

#[test]
fn test_import_without_any_public_key_names_appended_path() {
    let dir = TempDir::new().unwrap();
    let private = dir.path().join("deploy.rsa");
    std::fs::write(&private, "private").unwrap();
    let manager = KeyManager::with_generator(Arc::new(CountingGenerator::default()));

    let err = manager.import_key_pair(&private).unwrap_err();

    assert!(err.to_string().contains("deploy.rsa.pub"));
}
