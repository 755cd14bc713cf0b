//! Layered settings: built-in defaults, an optional YAML file, then CLI flags
//! applied by the command handlers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_DIR_NAME: &str = "rustle-provision";
pub const CONFIG_FILE_NAME: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub connection: ConnectionDefaults,
    pub keys: KeyDefaults,
    pub execution: ExecutionDefaults,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDefaults {
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            user: "ansible".to_string(),
            password: "ansible".to_string(),
            port: 22,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDefaults {
    pub directory: PathBuf,
    pub name: String,
    pub bits: u32,
}

impl Default for KeyDefaults {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            name: "ansible_key".to_string(),
            bits: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionDefaults {
    /// Container CLI to drive (`docker` or `podman`).
    pub runtime: String,
    pub image: String,
    /// Directory inside the container holding the mounted inputs.
    pub context_root: String,
    pub results_mount: String,
    pub interpreter: String,
    pub results_directory: PathBuf,
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "ansible-v2".to_string(),
            context_root: "/home/ansible".to_string(),
            results_mount: "/tmp".to_string(),
            interpreter: "python3".to_string(),
            results_directory: PathBuf::from("results"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "serde_duration_opt")]
    pub session: Option<Duration>,
    #[serde(with = "serde_duration_opt")]
    pub command: Option<Duration>,
    #[serde(with = "serde_duration_opt")]
    pub run: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            session: Some(Duration::from_secs(30)),
            command: Some(Duration::from_secs(60)),
            run: None,
        }
    }
}

impl ProvisionConfig {
    /// Load from `path` if given, else from the per-user config file when it
    /// exists, else fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path),
                None => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => Some(d.as_secs()).serialize(serializer),
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
