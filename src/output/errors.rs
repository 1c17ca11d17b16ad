// Error types for goat

use std::io::IsTerminal;
use std::path::PathBuf;

use colored::*;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GoatError>;

/// Whether error rendering should use ANSI colors
fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    std::io::stderr().is_terminal()
}

/// All error types in goat.
///
/// Per-host variants (credentials, connection, session, command) never abort a
/// playbook run; the executor turns them into skip decisions or carries them
/// inside a `TaskResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoatError {
    /// A host could not be located in some branch of the inventory tree
    #[error("Unable to locate host: {host}")]
    HostNotFound { host: String },

    /// The playbook targets matched no host at all
    #[error("No hosts matched the targets: {}", .names.join(", "))]
    NoHostsResolved { names: Vec<String> },

    /// A connection attribute required to reach the host is absent
    #[error("Cannot connect to host {host}, no {field} provided")]
    MissingCredential { host: String, field: String },

    /// A connection attribute is present but unusable
    #[error("Invalid value '{value}' for '{key}' on host {host}")]
    InvalidVariable {
        host: String,
        key: String,
        value: String,
    },

    /// Dial, handshake or authentication failure
    #[error("Error when connecting to host {host}: {message}")]
    ConnectionFailed { host: String, message: String },

    /// A session could not be opened on an established connection
    #[error("Unable to create session on host {host}: {message}")]
    SessionCreateFailed { host: String, message: String },

    /// A command was issued on a connection that is not usable
    #[error("Host {host} is not connected: {reason}")]
    NotConnected { host: String, reason: String },

    /// The remote command ran and exited non-zero
    #[error("Command exited with status {exit_code} on host {host}")]
    CommandFailed { host: String, exit_code: i32 },

    /// The remote command could not be run to completion
    #[error("Command error on host {host}: {message}")]
    Command { host: String, message: String },

    /// File system errors while loading documents
    #[error("{message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Malformed inventory or playbook documents
    #[error("{message}")]
    Parse {
        message: String,
        path: Option<PathBuf>,
    },

    /// Unexpected failures inside the executor itself
    #[error("{message}")]
    Runtime { message: String },
}

impl GoatError {
    /// True for the "absent in this branch" signal used during inventory traversal
    pub fn is_host_not_found(&self) -> bool {
        matches!(self, GoatError::HostNotFound { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            GoatError::HostNotFound { .. } | GoatError::NoHostsResolved { .. } => {
                "INVENTORY ERROR"
            }
            GoatError::MissingCredential { .. }
            | GoatError::InvalidVariable { .. }
            | GoatError::ConnectionFailed { .. }
            | GoatError::SessionCreateFailed { .. }
            | GoatError::NotConnected { .. } => "SSH ERROR",
            GoatError::CommandFailed { .. } | GoatError::Command { .. } => "COMMAND ERROR",
            GoatError::Io { .. } => "I/O ERROR",
            GoatError::Parse { .. } => "PARSE ERROR",
            GoatError::Runtime { .. } => "RUNTIME ERROR",
        }
    }

    /// Suggest a fix for the error, if a common one exists
    pub fn suggestion(&self) -> Option<String> {
        match self {
            GoatError::NoHostsResolved { .. } => Some(
                "Check that the playbook's hosts name hosts or groups declared in the inventory"
                    .to_string(),
            ),
            GoatError::MissingCredential { field, .. } => Some(format!(
                "Set '{}' in the host's vars, an enclosing group's vars, or the playbook vars",
                field
            )),
            GoatError::InvalidVariable { key, .. } if key == "port" || key == "ssh_port" => {
                Some("Ports must be numbers between 1 and 65535".to_string())
            }
            GoatError::ConnectionFailed { message, .. } => {
                let message = message.to_lowercase();
                if message.contains("refused") {
                    Some("Ensure SSH service is running on the target host".to_string())
                } else if message.contains("timed out") || message.contains("timeout") {
                    Some("Check network connectivity and firewall rules".to_string())
                } else if message.contains("authentication") {
                    Some("Verify the username and password or private key".to_string())
                } else {
                    None
                }
            }
            GoatError::Parse { .. } => Some("Check the YAML syntax of the file".to_string()),
            _ => None,
        }
    }

    /// Render the error for a terminal, with a hint when one is available
    pub fn render(&self) -> String {
        if !should_use_colors() {
            colored::control::set_override(false);
        }

        let mut out = format!("{}: {}\n", self.label().red().bold(), self);

        match self {
            GoatError::Io {
                path: Some(path), ..
            }
            | GoatError::Parse {
                path: Some(path), ..
            } => {
                out.push_str(&format!("  {} {}\n", "Path:".dimmed(), path.display()));
            }
            _ => {}
        }

        if let Some(suggestion) = self.suggestion() {
            out.push('\n');
            out.push_str(&format!("{}: {}\n", "Hint".yellow().bold(), suggestion));
        }

        out
    }
}
