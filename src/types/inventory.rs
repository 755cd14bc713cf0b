use crate::types::credentials::KeyPair;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class a host belongs to. Every class maps to one inventory group.
///
/// The declaration order is the order groups appear in a rendered inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HostClass {
    /// Flat `all` group used when hosts are not classified.
    All,
    Unix,
    Windows,
    Ssh,
}

impl HostClass {
    pub const CLASSIFIED: [HostClass; 3] = [HostClass::Unix, HostClass::Windows, HostClass::Ssh];

    pub fn group_name(&self) -> &'static str {
        match self {
            HostClass::All => "all",
            HostClass::Unix => "UNIX",
            HostClass::Windows => "WINDOWS",
            HostClass::Ssh => "SSH",
        }
    }

    pub fn vars_section(&self) -> String {
        format!("{}:vars", self.group_name())
    }
}

impl fmt::Display for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_name())
    }
}

impl FromStr for HostClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(HostClass::All),
            "UNIX" | "unix" => Ok(HostClass::Unix),
            "WINDOWS" | "windows" => Ok(HostClass::Windows),
            "SSH" | "ssh" => Ok(HostClass::Ssh),
            other => Err(format!("unknown host class: {other}")),
        }
    }
}

/// Connection address of a managed host (hostname or IP).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn address(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Host {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// Group-level connection variables shared by every host of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub user: String,
    pub password: String,
    pub port: u16,
    pub transport: Transport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    Ssh {
        key_pair: Option<KeyPair>,
        disable_host_key_checking: bool,
    },
    WinRm {
        ignore_cert_validation: bool,
        auth: WinRmAuth,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinRmAuth {
    Ntlm,
    Basic,
    Kerberos,
}

impl WinRmAuth {
    pub fn as_str(&self) -> &'static str {
        match self {
            WinRmAuth::Ntlm => "ntlm",
            WinRmAuth::Basic => "basic",
            WinRmAuth::Kerberos => "kerberos",
        }
    }
}

/// Value passed to ssh through `ansible_ssh_common_args` when host key
/// checking is disabled. The quotes are part of the value.
pub const STRICT_HOST_KEY_CHECKING_OFF: &str = "'-o StrictHostKeyChecking=no'";

impl ConnectionProfile {
    pub fn ssh(
        user: impl Into<String>,
        password: impl Into<String>,
        port: u16,
        key_pair: Option<KeyPair>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            port,
            transport: Transport::Ssh {
                key_pair,
                disable_host_key_checking: true,
            },
        }
    }

    pub fn winrm(user: impl Into<String>, password: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            port,
            transport: Transport::WinRm {
                ignore_cert_validation: true,
                auth: WinRmAuth::Ntlm,
            },
        }
    }

    pub fn connection_type(&self) -> &'static str {
        match self.transport {
            Transport::Ssh { .. } => "ssh",
            Transport::WinRm { .. } => "winrm",
        }
    }

    /// Inventory variables in their rendered order: user, password,
    /// connection, port, key paths, transport-specific arguments.
    pub fn variables(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("ansible_user".to_string(), self.user.clone()),
            ("ansible_password".to_string(), self.password.clone()),
            (
                "ansible_connection".to_string(),
                self.connection_type().to_string(),
            ),
        ];

        match &self.transport {
            Transport::Ssh {
                key_pair,
                disable_host_key_checking,
            } => {
                vars.push(("ansible_port".to_string(), self.port.to_string()));
                if let Some(keys) = key_pair {
                    vars.push((
                        "ansible_ssh_private_key_file".to_string(),
                        keys.private_key_path.display().to_string(),
                    ));
                    vars.push((
                        "ansible_ssh_public_key_file".to_string(),
                        keys.public_key_path.display().to_string(),
                    ));
                }
                if *disable_host_key_checking {
                    vars.push((
                        "ansible_ssh_common_args".to_string(),
                        STRICT_HOST_KEY_CHECKING_OFF.to_string(),
                    ));
                }
            }
            Transport::WinRm {
                ignore_cert_validation,
                auth,
            } => {
                if *ignore_cert_validation {
                    vars.push((
                        "ansible_winrm_server_cert_validation".to_string(),
                        "ignore".to_string(),
                    ));
                }
                vars.push((
                    "ansible_winrm_transport".to_string(),
                    auth.as_str().to_string(),
                ));
            }
        }

        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_profile_variable_order() {
        let profile = ConnectionProfile::ssh(
            "ansible",
            "x",
            22,
            Some(KeyPair::from_private_key("/k")),
        );
        let keys: Vec<_> = profile.variables().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "ansible_user",
                "ansible_password",
                "ansible_connection",
                "ansible_port",
                "ansible_ssh_private_key_file",
                "ansible_ssh_public_key_file",
                "ansible_ssh_common_args",
            ]
        );
    }

    #[test]
    fn test_winrm_profile_never_carries_key_paths() {
        let profile = ConnectionProfile::winrm("admin", "secret", 5986);
        let vars = profile.variables();
        assert!(vars.iter().all(|(k, _)| !k.contains("key_file")));
        assert!(vars.contains(&("ansible_winrm_transport".to_string(), "ntlm".to_string())));
        assert_eq!(vars.len(), 5);
    }

    #[test]
    fn test_host_class_parsing() {
        assert_eq!("UNIX".parse::<HostClass>().unwrap(), HostClass::Unix);
        assert_eq!("all".parse::<HostClass>().unwrap(), HostClass::All);
        assert!("mainframe".parse::<HostClass>().is_err());
    }
}
