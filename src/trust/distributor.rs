use crate::credentials::PublicKey;
use crate::trust::{
    append_command, contains_key, permissions_command, read_command, DirStatus, RemoteConnector,
    RemoteSession, Result, SessionTarget, TrustError, SSH_DIR, SSH_DIR_MODE,
};
use crate::types::Host;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Step of the per-host trust sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStage {
    Connect,
    PrepareDirectory,
    InstallKey,
    FixPermissions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HostStatus {
    /// Key appended to the host's store.
    Installed,
    /// Store already trusted the key; nothing appended.
    AlreadyPresent,
    Failed {
        stage: TrustStage,
        reason: String,
        timed_out: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct HostOutcome {
    pub host: Host,
    #[serde(flatten)]
    pub status: HostStatus,
    pub completed_at: DateTime<Utc>,
}

impl HostOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, HostStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionSummary {
    pub key_fingerprint: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<HostOutcome>,
}

impl DistributionSummary {
    pub fn installed(&self) -> usize {
        self.count(|s| matches!(s, HostStatus::Installed))
    }

    pub fn already_present(&self) -> usize {
        self.count(|s| matches!(s, HostStatus::AlreadyPresent))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, HostStatus::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &HostOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    fn count(&self, pred: impl Fn(&HostStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Deadlines {
    pub session: Option<Duration>,
    pub command: Option<Duration>,
}

/// Installs a public key on a batch of hosts, one host at a time and in the
/// given order. A failure on one host is recorded and the batch continues.
pub struct TrustDistributor {
    connector: Arc<dyn RemoteConnector>,
    deadlines: Deadlines,
    span: Span,
}

impl TrustDistributor {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            deadlines: Deadlines::default(),
            span: info_span!("trust"),
        }
    }

    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn distribute(
        &self,
        hosts: &[Host],
        username: &str,
        password: &str,
        public_key: &PublicKey,
        port: u16,
    ) -> Vec<HostOutcome> {
        let mut outcomes = Vec::with_capacity(hosts.len());

        for host in hosts {
            let target = SessionTarget {
                host: host.clone(),
                port,
                username: username.to_string(),
                password: password.to_string(),
            };
            let span = info_span!(parent: &self.span, "host", host = %host);
            let outcome = self
                .distribute_to_host(&target, public_key)
                .instrument(span)
                .await;
            outcomes.push(outcome);
        }

        outcomes
    }

    pub async fn distribute_with_summary(
        &self,
        hosts: &[Host],
        username: &str,
        password: &str,
        public_key: &PublicKey,
        port: u16,
    ) -> DistributionSummary {
        let started_at = Utc::now();
        let key_fingerprint = public_key.fingerprint();
        self.span.in_scope(|| {
            info!(
                "Distributing key {} to {} host(s) on port {}",
                key_fingerprint,
                hosts.len(),
                port
            )
        });

        let outcomes = self
            .distribute(hosts, username, password, public_key, port)
            .await;

        DistributionSummary {
            key_fingerprint,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    async fn distribute_to_host(&self, target: &SessionTarget, key: &PublicKey) -> HostOutcome {
        info!(
            "Uploading SSH key to {} as {} on port {}",
            target.host, target.username, target.port
        );

        let status = match self.install(target, key).await {
            Ok(status) => {
                info!("Uploaded SSH key to {} ({:?})", target.host, status);
                status
            }
            Err((stage, e)) => {
                warn!("Failed to upload SSH key to {}: {}", target.host, e);
                HostStatus::Failed {
                    stage,
                    reason: e.to_string(),
                    timed_out: e.is_timeout(),
                }
            }
        };

        HostOutcome {
            host: target.host.clone(),
            status,
            completed_at: Utc::now(),
        }
    }

    async fn install(
        &self,
        target: &SessionTarget,
        key: &PublicKey,
    ) -> std::result::Result<HostStatus, (TrustStage, TrustError)> {
        let host = target.host.address();
        let mut session = self
            .deadline(
                self.deadlines.session,
                host,
                "session establishment",
                self.connector.connect(target),
            )
            .await
            .map_err(|e| (TrustStage::Connect, e))?;

        let result = self.install_in_session(session.as_mut(), host, key).await;

        if let Err(e) = self
            .deadline(self.deadlines.command, host, "disconnect", session.close())
            .await
        {
            debug!("Ignoring disconnect error for {}: {}", host, e);
        }

        result
    }

    async fn install_in_session(
        &self,
        session: &mut dyn RemoteSession,
        host: &str,
        key: &PublicKey,
    ) -> std::result::Result<HostStatus, (TrustStage, TrustError)> {
        let command_deadline = self.deadlines.command;

        let dir = self
            .deadline(
                command_deadline,
                host,
                "create .ssh",
                session.create_dir(SSH_DIR, SSH_DIR_MODE),
            )
            .await
            .map_err(|e| (TrustStage::PrepareDirectory, e))?;
        if dir == DirStatus::AlreadyExists {
            debug!("{} already has {}", host, SSH_DIR);
        }

        let existing = self
            .run(session, host, &read_command(), command_deadline)
            .await
            .map_err(|e| (TrustStage::InstallKey, e))?;

        let status = if contains_key(&existing, key) {
            debug!("{} already trusts {}", host, key.fingerprint());
            HostStatus::AlreadyPresent
        } else {
            self.run(session, host, &append_command(&existing, key), command_deadline)
                .await
                .map_err(|e| (TrustStage::InstallKey, e))?;
            HostStatus::Installed
        };

        self.run(session, host, &permissions_command(), command_deadline)
            .await
            .map_err(|e| (TrustStage::FixPermissions, e))?;

        Ok(status)
    }

    /// Run a command and require exit status 0; returns stdout.
    async fn run(
        &self,
        session: &mut dyn RemoteSession,
        host: &str,
        command: &str,
        deadline: Option<Duration>,
    ) -> Result<String> {
        debug!("Executing on {}: {}", host, command);
        let output = self
            .deadline(deadline, host, command, session.exec(command))
            .await?;

        if !output.success() {
            return Err(TrustError::CommandFailed {
                host: host.to_string(),
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn deadline<T, F>(
        &self,
        deadline: Option<Duration>,
        host: &str,
        operation: &str,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match deadline {
            Some(timeout) => tokio::time::timeout(timeout, fut).await.map_err(|_| {
                TrustError::Timeout {
                    host: host.to_string(),
                    operation: operation.to_string(),
                    timeout,
                }
            })?,
            None => fut.await,
        }
    }
}
