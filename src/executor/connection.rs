// Per-host connection lifecycle

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::result::TaskResult;
use super::{RemoteClient, Transport};
use crate::inventory::Host;
use crate::output::errors::{GoatError, Result};

/// Default SSH port when the host does not set one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How to authenticate against a host
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(<redacted>)"),
            Credentials::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
        }
    }
}

/// Everything a transport needs to open a connection, read from host vars.
///
/// | var                  | meaning                         |
/// |----------------------|---------------------------------|
/// | `address`            | address to dial, else host name |
/// | `port` / `ssh_port`  | port, default 22                |
/// | `username`           | required                        |
/// | `password`           | password auth                   |
/// | `private_key`        | key file auth (if no password)  |
/// | `private_key_passphrase` | optional key passphrase     |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
}

impl ConnectTarget {
    pub fn from_host(host: &Host) -> Result<Self> {
        let username = host
            .get_var("username")
            .ok_or_else(|| GoatError::MissingCredential {
                host: host.name.clone(),
                field: "username".to_string(),
            })?
            .to_string();

        let credentials = if let Some(password) = host.get_var("password") {
            Credentials::Password(password.to_string())
        } else if let Some(key) = host.get_var("private_key") {
            Credentials::PrivateKey {
                path: PathBuf::from(key),
                passphrase: host.get_var("private_key_passphrase").map(str::to_string),
            }
        } else {
            return Err(GoatError::MissingCredential {
                host: host.name.clone(),
                field: "password or private_key".to_string(),
            });
        };

        let address = host.get_var("address").unwrap_or(&host.name).to_string();

        let port = match host
            .get_var("port")
            .map(|p| ("port", p))
            .or_else(|| host.get_var("ssh_port").map(|p| ("ssh_port", p)))
        {
            Some((key, value)) => match value.trim().parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => {
                    return Err(GoatError::InvalidVariable {
                        host: host.name.clone(),
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            None => DEFAULT_SSH_PORT,
        };

        Ok(ConnectTarget {
            host: host.name.clone(),
            address,
            port,
            username,
            credentials,
        })
    }

    /// `user@address:port`, for diagnostics
    pub fn ssh_target(&self) -> String {
        format!("{}@{}:{}", self.username, self.address, self.port)
    }
}

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotInitiated,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::NotInitiated => write!(f, "not initiated"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Failed => write!(f, "failed"),
        }
    }
}

enum ConnectionState {
    NotInitiated,
    Connected(Box<dyn RemoteClient>),
    Failed(GoatError),
}

/// Connection state machine for one execution host.
///
/// `NotInitiated` moves to `Connected` or `Failed`. `Failed` is terminal and
/// keeps the error that caused it. A `Connected` manager only leaves that
/// state when a session cannot be created, and then it fails for good; there
/// is no reconnect.
pub struct ConnectionManager {
    host_name: String,
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new(host_name: impl Into<String>) -> Self {
        ConnectionManager {
            host_name: host_name.into(),
            state: ConnectionState::NotInitiated,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::NotInitiated => ConnectionStatus::NotInitiated,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
            ConnectionState::Failed(_) => ConnectionStatus::Failed,
        }
    }

    /// The error that failed this connection, if it failed
    pub fn failure(&self) -> Option<&GoatError> {
        match &self.state {
            ConnectionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Open the connection. A no-op when already connected; a failed
    /// connection reports its original error without dialing again.
    pub fn connect(&mut self, host: &Host, transport: &dyn Transport) -> Result<()> {
        match &self.state {
            ConnectionState::Connected(_) => return Ok(()),
            ConnectionState::Failed(err) => return Err(err.clone()),
            ConnectionState::NotInitiated => {}
        }

        let outcome = ConnectTarget::from_host(host).and_then(|target| {
            debug!(host = %self.host_name, target = %target.ssh_target(), "connecting");
            transport.connect(&target)
        });

        match outcome {
            Ok(client) => {
                debug!(host = %self.host_name, "connected");
                self.state = ConnectionState::Connected(client);
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Run a command in a fresh session. Always returns a result; failures
    /// are carried inside it.
    pub fn run(&mut self, command: &str) -> TaskResult {
        let outcome = match &self.state {
            ConnectionState::Connected(client) => client.exec(command),
            ConnectionState::NotInitiated => {
                return TaskResult::from_error(GoatError::NotConnected {
                    host: self.host_name.clone(),
                    reason: "connection not initiated".to_string(),
                })
            }
            ConnectionState::Failed(_) => {
                return TaskResult::from_error(GoatError::NotConnected {
                    host: self.host_name.clone(),
                    reason: "connection failed".to_string(),
                })
            }
        };

        match outcome {
            Ok(output) => TaskResult::from_command(&self.host_name, output),
            Err(err) => {
                if matches!(err, GoatError::SessionCreateFailed { .. }) {
                    warn!(host = %self.host_name, error = %err, "session failed, dropping connection");
                    self.state = ConnectionState::Failed(err.clone());
                }
                TaskResult::from_error(err)
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host_name", &self.host_name)
            .field("status", &self.status())
            .finish()
    }
}
