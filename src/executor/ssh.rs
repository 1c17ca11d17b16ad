// SSH transport over ssh2

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ssh2::Session;
use tracing::debug;

use super::connection::{ConnectTarget, Credentials};
use super::{CommandResult, RemoteClient, Transport};
use crate::output::errors::{GoatError, Result};

/// Default bound on dialing and the SSH handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens password or key authenticated SSH connections.
///
/// Host keys are not verified.
#[derive(Debug, Clone)]
pub struct SshTransport {
    connect_timeout: Duration,
}

impl SshTransport {
    pub fn new() -> Self {
        SshTransport {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// A zero timeout keeps the default; dialing cannot be unbounded.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.connect_timeout = timeout;
        }
        self
    }

    /// libssh2 takes milliseconds as a u32, where 0 means no timeout
    fn session_timeout_ms(&self) -> u32 {
        u32::try_from(self.connect_timeout.as_millis())
            .unwrap_or(u32::MAX)
            .max(1)
    }

    fn dial(&self, target: &ConnectTarget) -> Result<TcpStream> {
        let addrs = (target.address.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| GoatError::ConnectionFailed {
                host: target.host.clone(),
                message: format!("Cannot resolve {}: {}", target.address, e),
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(tcp) => return Ok(tcp),
                Err(e) => {
                    debug!(host = %target.host, %addr, error = %e, "dial failed");
                    last_error = Some(e);
                }
            }
        }

        Err(GoatError::ConnectionFailed {
            host: target.host.clone(),
            message: match last_error {
                Some(e) => format!("Connection failed: {}", e),
                None => format!("No addresses found for {}", target.address),
            },
        })
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SshTransport {
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn RemoteClient>> {
        let tcp = self.dial(target)?;

        let connection_error = |message: String| GoatError::ConnectionFailed {
            host: target.host.clone(),
            message,
        };

        let mut session = Session::new()
            .map_err(|e| connection_error(format!("Failed to create SSH session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.session_timeout_ms());

        session
            .handshake()
            .map_err(|e| connection_error(format!("SSH handshake failed: {}", e)))?;

        let auth = match &target.credentials {
            Credentials::Password(password) => {
                session.userauth_password(&target.username, password)
            }
            Credentials::PrivateKey { path, passphrase } => session.userauth_pubkey_file(
                &target.username,
                None,
                path,
                passphrase.as_deref(),
            ),
        };
        auth.map_err(|e| connection_error(format!("Authentication failed: {}", e)))?;

        if !session.authenticated() {
            return Err(connection_error("Authentication failed".to_string()));
        }

        // The timeout bounds connecting only; commands may run as long as they need
        session.set_timeout(0);

        Ok(Box::new(SshClient {
            session,
            host_name: target.host.clone(),
        }))
    }
}

/// An authenticated SSH connection. Every command gets its own channel.
pub struct SshClient {
    session: Session,
    host_name: String,
}

impl SshClient {
    fn command_error(&self, message: String) -> GoatError {
        GoatError::Command {
            host: self.host_name.clone(),
            message,
        }
    }
}

impl RemoteClient for SshClient {
    fn exec(&self, command: &str) -> Result<CommandResult> {
        let mut channel =
            self.session
                .channel_session()
                .map_err(|e| GoatError::SessionCreateFailed {
                    host: self.host_name.clone(),
                    message: e.to_string(),
                })?;

        channel
            .exec(command)
            .map_err(|e| self.command_error(format!("Failed to execute command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        channel
            .read_to_end(&mut stdout)
            .map_err(|e| self.command_error(format!("Failed to read stdout: {}", e)))?;
        channel
            .stderr()
            .read_to_end(&mut stderr)
            .map_err(|e| self.command_error(format!("Failed to read stderr: {}", e)))?;

        channel
            .wait_close()
            .map_err(|e| self.command_error(format!("Failed to close channel: {}", e)))?;
        let exit_code = channel
            .exit_status()
            .map_err(|e| self.command_error(format!("No exit status: {}", e)))?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }
}
