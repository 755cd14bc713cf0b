//! `ssh2`-backed remote sessions. libssh2 is blocking, so every call runs on
//! the blocking pool with a socket-level timeout so that an abandoned call
//! cannot pin a thread forever.

use crate::trust::{
    CommandOutput, DirStatus, RemoteConnector, RemoteSession, Result, SessionTarget, TrustError,
};
use async_trait::async_trait;
use ssh2::Session;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Sleep between rounds when neither output stream has data.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct Ssh2Connector {
    io_timeout: Duration,
}

impl Default for Ssh2Connector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Ssh2Connector {
    pub fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }
}

#[async_trait]
impl RemoteConnector for Ssh2Connector {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn RemoteSession>> {
        let target = target.clone();
        let host = target.host.to_string();
        let io_timeout = self.io_timeout;

        let session = tokio::task::spawn_blocking(move || open_session(&target, io_timeout))
            .await
            .map_err(|e| TrustError::Session {
                host: host.clone(),
                reason: format!("session task failed: {e}"),
            })??;

        Ok(Box::new(Ssh2Session {
            host,
            session: Arc::new(Mutex::new(session)),
            io_timeout,
        }))
    }
}

fn open_session(target: &SessionTarget, io_timeout: Duration) -> Result<Session> {
    let host = target.host.to_string();
    let connection_failed = |reason: String| TrustError::ConnectionFailed {
        host: host.clone(),
        port: target.port,
        reason,
    };

    let addr = (target.host.address(), target.port)
        .to_socket_addrs()
        .map_err(|e| connection_failed(format!("address resolution failed: {e}")))?
        .next()
        .ok_or_else(|| connection_failed("address resolved to nothing".to_string()))?;

    let tcp = TcpStream::connect_timeout(&addr, io_timeout)
        .map_err(|e| connection_failed(e.to_string()))?;
    tcp.set_read_timeout(Some(io_timeout))
        .map_err(|e| connection_failed(e.to_string()))?;
    tcp.set_write_timeout(Some(io_timeout))
        .map_err(|e| connection_failed(e.to_string()))?;

    let mut session = Session::new().map_err(|e| connection_failed(e.to_string()))?;
    session.set_timeout(io_timeout.as_millis().min(u32::MAX as u128) as u32);
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| connection_failed(format!("handshake failed: {e}")))?;

    let auth_failed = || TrustError::AuthenticationFailed {
        host: host.clone(),
        user: target.username.clone(),
    };
    session
        .userauth_password(&target.username, &target.password)
        .map_err(|_| auth_failed())?;
    if !session.authenticated() {
        return Err(auth_failed());
    }

    debug!("Authenticated {}@{}:{}", target.username, host, target.port);
    Ok(session)
}

struct Ssh2Session {
    host: String,
    session: Arc<Mutex<Session>>,
    io_timeout: Duration,
}

impl Ssh2Session {
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session, &str) -> Result<T> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        let host = self.host.clone();
        let task_host = host.clone();
        tokio::task::spawn_blocking(move || {
            let guard = session.lock().map_err(|_| TrustError::Session {
                host: task_host.clone(),
                reason: "session lock poisoned".to_string(),
            })?;
            op(&guard, &task_host)
        })
        .await
        .map_err(|e| TrustError::Session {
            host,
            reason: format!("session task failed: {e}"),
        })?
    }
}

fn session_error(host: &str, e: ssh2::Error) -> TrustError {
    TrustError::Session {
        host: host.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl RemoteSession for Ssh2Session {
    async fn create_dir(&mut self, path: &str, mode: i32) -> Result<DirStatus> {
        let path = path.to_string();
        self.blocking(move |session, host| {
            let sftp = session.sftp().map_err(|e| session_error(host, e))?;
            match sftp.mkdir(Path::new(&path), mode) {
                Ok(()) => Ok(DirStatus::Created),
                Err(e) => match sftp.stat(Path::new(&path)) {
                    Ok(stat) if stat.is_dir() => Ok(DirStatus::AlreadyExists),
                    _ => Err(TrustError::DirectoryFailed {
                        host: host.to_string(),
                        path: path.clone(),
                        reason: e.to_string(),
                    }),
                },
            }
        })
        .await
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let command = command.to_string();
        let io_timeout = self.io_timeout;
        self.blocking(move |session, host| {
            let mut channel = session
                .channel_session()
                .map_err(|e| session_error(host, e))?;
            channel.exec(&command).map_err(|e| session_error(host, e))?;

            // Both streams share the channel window: reading one to the end
            // first can stall a command that fills the other.
            session.set_blocking(false);
            let drained = drain_streams(
                &mut channel.stream(0),
                &mut channel.stderr(),
                Instant::now() + io_timeout,
            );
            session.set_blocking(true);
            let (stdout, stderr) = drained.map_err(|e| TrustError::Session {
                host: host.to_string(),
                reason: format!("reading command output: {e}"),
            })?;

            channel.wait_close().map_err(|e| session_error(host, e))?;
            let exit_code = channel.exit_status().map_err(|e| session_error(host, e))?;

            Ok(CommandOutput {
                exit_code,
                stdout,
                stderr,
            })
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        self.blocking(|session, host| {
            session
                .disconnect(None, "rustle-provision done", None)
                .map_err(|e| session_error(host, e))
        })
        .await
    }
}

enum Pump {
    Data,
    Idle,
    Closed,
}

fn pump(reader: &mut impl Read, sink: &mut Vec<u8>, buf: &mut [u8]) -> io::Result<Pump> {
    match reader.read(buf) {
        Ok(0) => Ok(Pump::Closed),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(Pump::Data)
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            Ok(Pump::Idle)
        }
        Err(e) => Err(e),
    }
}

/// Read two non-blocking streams to their ends in alternation.
fn drain_streams(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    deadline: Instant,
) -> io::Result<(String, String)> {
    let mut buf = [0u8; 8192];
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        let mut idle = true;
        if out_open {
            match pump(stdout, &mut out, &mut buf)? {
                Pump::Data => idle = false,
                Pump::Closed => out_open = false,
                Pump::Idle => {}
            }
        }
        if err_open {
            match pump(stderr, &mut err, &mut buf)? {
                Pump::Data => idle = false,
                Pump::Closed => err_open = false,
                Pump::Idle => {}
            }
        }
        if idle && (out_open || err_open) {
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "command output did not finish in time",
                ));
            }
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }

    Ok((
        String::from_utf8_lossy(&out).into_owned(),
        String::from_utf8_lossy(&err).into_owned(),
    ))
}
