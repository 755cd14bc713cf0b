use crate::trust::Result;
use crate::types::Host;
use async_trait::async_trait;
use std::fmt;

/// Login details for one host.
#[derive(Clone)]
pub struct SessionTarget {
    pub host: Host,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opens authenticated sessions to remote hosts.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn RemoteSession>>;
}

/// An open, authenticated session. Paths are relative to the login user's
/// home directory.
#[async_trait]
pub trait RemoteSession: Send {
    /// Create a directory. An existing directory is reported, not an error.
    async fn create_dir(&mut self, path: &str, mode: i32) -> Result<DirStatus>;

    async fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    async fn close(&mut self) -> Result<()>;
}
