// Executor module - connections and playbook execution

use crate::output::errors::Result;

pub mod connection;
pub mod result;
pub mod scheduler;
pub mod ssh;

pub use connection::{ConnectTarget, ConnectionManager, ConnectionStatus, Credentials};
pub use result::{CommandResult, PlaybookResult, TaskResult};
pub use scheduler::{ExecutionHost, ExecutorConfig, PlaybookExecutor};
pub use ssh::{SshClient, SshTransport};

/// Opens authenticated connections to remote hosts
pub trait Transport: Send + Sync {
    /// Dial and authenticate. Fails on unreachable addresses and bad
    /// credentials.
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn RemoteClient>>;
}

/// A live connection to one host
pub trait RemoteClient: Send {
    /// Run a command in a new session, buffering stdout and stderr in full.
    ///
    /// Returns `SessionCreateFailed` when no session could be opened; any
    /// other error means the session existed but the command did not finish.
    fn exec(&self, command: &str) -> Result<CommandResult>;
}

/// Scripted in-memory transport for tests
#[cfg(test)]
pub(crate) mod mock {
    use std::cell::Cell;
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::{CommandResult, ConnectTarget, RemoteClient, Transport};
    use crate::output::errors::{GoatError, Result};

    /// A reachable host: canned outputs per command, and optionally a limit
    /// on how many sessions can be opened before session creation fails
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockHost {
        outputs: HashMap<String, CommandResult>,
        session_limit: Option<usize>,
        panics_on: Option<String>,
    }

    impl MockHost {
        pub(crate) fn new() -> Self {
            MockHost::default()
        }

        pub(crate) fn with_output(mut self, command: &str, stdout: &str, exit_code: i32) -> Self {
            self.outputs.insert(
                command.to_string(),
                CommandResult {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                    exit_code,
                },
            );
            self
        }

        pub(crate) fn with_session_limit(mut self, limit: usize) -> Self {
            self.session_limit = Some(limit);
            self
        }

        /// Crash the worker running `command`
        pub(crate) fn with_panic_on(mut self, command: &str) -> Self {
            self.panics_on = Some(command.to_string());
            self
        }
    }

    /// Hosts are keyed by address; unknown addresses refuse connections
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        hosts: HashMap<String, MockHost>,
        attempts: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            MockTransport::default()
        }

        pub(crate) fn with_host(mut self, address: &str, host: MockHost) -> Self {
            self.hosts.insert(address.to_string(), host);
            self
        }

        /// Addresses dialed so far, in order
        pub(crate) fn connect_attempts(&self) -> Vec<String> {
            self.attempts.lock().clone()
        }
    }

    impl Transport for MockTransport {
        fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn RemoteClient>> {
            self.attempts.lock().push(target.address.clone());

            match self.hosts.get(&target.address) {
                Some(host) => Ok(Box::new(MockClient {
                    host_name: target.host.clone(),
                    host: host.clone(),
                    sessions: Cell::new(0),
                })),
                None => Err(GoatError::ConnectionFailed {
                    host: target.host.clone(),
                    message: "Connection refused".to_string(),
                }),
            }
        }
    }

    struct MockClient {
        host_name: String,
        host: MockHost,
        sessions: Cell<usize>,
    }

    impl RemoteClient for MockClient {
        fn exec(&self, command: &str) -> Result<CommandResult> {
            if self.host.panics_on.as_deref() == Some(command) {
                panic!("mock host {} crashed running {}", self.host_name, command);
            }
            if let Some(limit) = self.host.session_limit {
                if self.sessions.get() >= limit {
                    return Err(GoatError::SessionCreateFailed {
                        host: self.host_name.clone(),
                        message: "channel open failure".to_string(),
                    });
                }
            }
            self.sessions.set(self.sessions.get() + 1);

            Ok(self
                .host
                .outputs
                .get(command)
                .cloned()
                .unwrap_or_else(|| CommandResult {
                    stdout: format!("ran {}\n", command),
                    stderr: String::new(),
                    exit_code: 0,
                }))
        }
    }
}
