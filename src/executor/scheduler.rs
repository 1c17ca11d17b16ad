// Playbook execution: task by task, host by host

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::connection::{ConnectionManager, ConnectionStatus};
use super::result::{PlaybookResult, TaskResult};
use super::ssh::{SshTransport, DEFAULT_CONNECT_TIMEOUT};
use super::Transport;
use crate::inventory::{Host, Inventory, Vars};
use crate::output::errors::{GoatError, Result};
use crate::parser::ast::{CommandTask, Playbook};

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum hosts working on the same task at once; 1 runs sequentially
    pub forks: usize,
    /// Bound on opening a connection
    pub connect_timeout: Duration,
    /// Defaults layered under the playbook vars (e.g. CLI credentials)
    pub default_vars: Vars,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            forks: 1,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            default_vars: Vars::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_forks(mut self, forks: usize) -> Self {
        self.forks = forks.max(1);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_default_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_vars.insert(key.into(), value.into());
        self
    }
}

/// A resolved host and its connection, for the duration of one run
#[derive(Debug)]
pub struct ExecutionHost {
    pub host: Host,
    pub connection: ConnectionManager,
}

impl ExecutionHost {
    pub fn new(host: Host) -> Self {
        ExecutionHost {
            connection: ConnectionManager::new(host.name.clone()),
            host,
        }
    }
}

/// What happened to one host for one task
#[derive(Debug)]
enum HostStep {
    /// Connection failed on an earlier task
    Skipped,
    /// Connection failed now
    Unreachable(GoatError),
    Ran(TaskResult),
}

/// Runs playbooks against an inventory
pub struct PlaybookExecutor {
    config: ExecutorConfig,
    transport: Arc<dyn Transport>,
}

impl PlaybookExecutor {
    pub fn new(config: ExecutorConfig, transport: Arc<dyn Transport>) -> Self {
        PlaybookExecutor { config, transport }
    }

    /// Executor backed by SSH, using the configured connect timeout
    pub fn ssh(config: ExecutorConfig) -> Self {
        let transport = SshTransport::new().with_connect_timeout(config.connect_timeout);
        Self::new(config, Arc::new(transport))
    }

    /// Resolve the playbook's targets into fresh execution hosts.
    ///
    /// Each host's vars are the config defaults, then the playbook vars, then
    /// the inventory vars, later layers winning.
    pub fn prepare(&self, playbook: &Playbook, inventory: &Inventory) -> Result<Vec<ExecutionHost>> {
        let hosts = inventory.select_hosts(&playbook.hosts)?;

        Ok(hosts
            .into_iter()
            .map(|host| {
                let mut vars = self.config.default_vars.clone();
                vars.extend(playbook.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
                vars.extend(host.vars);
                ExecutionHost::new(Host {
                    name: host.name,
                    vars,
                })
            })
            .collect())
    }

    /// Run with the configured parallelism. The sequential path runs on a
    /// blocking thread since transports block on I/O.
    pub async fn run(&self, playbook: &Playbook, inventory: &Inventory) -> Result<PlaybookResult> {
        if self.config.forks > 1 {
            return self.execute_parallel(playbook, inventory).await;
        }

        let executor = PlaybookExecutor {
            config: self.config.clone(),
            transport: self.transport.clone(),
        };
        let playbook = playbook.clone();
        let inventory = inventory.clone();

        tokio::task::spawn_blocking(move || executor.execute(&playbook, &inventory))
            .await
            .map_err(|e| GoatError::Runtime {
                message: format!("Executor failed: {}", e),
            })?
    }

    /// Run every task on every host, one host at a time.
    ///
    /// Fails only when the targets resolve to no hosts; per-host failures are
    /// contained and logged.
    pub fn execute(&self, playbook: &Playbook, inventory: &Inventory) -> Result<PlaybookResult> {
        let mut hosts = self.prepare(playbook, inventory)?;
        info!(playbook = %playbook.name, hosts = hosts.len(), "starting playbook");

        let mut result = PlaybookResult::new();
        for task in &playbook.tasks {
            debug!(task = %task.name, "starting task");
            result.begin_task(&task.name);

            for exec_host in hosts.iter_mut() {
                let step = run_task_on_host(self.transport.as_ref(), exec_host, task);
                record(&mut result, &task.name, &exec_host.host.name, step);
            }
        }

        info!(playbook = %playbook.name, "playbook finished");
        Ok(result)
    }

    /// Like `execute`, but hosts work on the same task concurrently, up to
    /// `forks` at a time. Tasks never overlap.
    ///
    /// Each execution host is moved into its worker and handed back, so a
    /// connection is never touched by two operations at once. Results are
    /// recorded after the task's workers join, in resolution order. A worker
    /// that dies takes only its own host out of the run.
    pub async fn execute_parallel(
        &self,
        playbook: &Playbook,
        inventory: &Inventory,
    ) -> Result<PlaybookResult> {
        let mut hosts = self.prepare(playbook, inventory)?;
        info!(
            playbook = %playbook.name,
            hosts = hosts.len(),
            forks = self.config.forks,
            "starting playbook"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.forks.max(1)));
        let mut result = PlaybookResult::new();

        for task in &playbook.tasks {
            debug!(task = %task.name, "starting task");
            result.begin_task(&task.name);

            let futures: Vec<_> = hosts
                .drain(..)
                .map(|mut exec_host| {
                    let sem = semaphore.clone();
                    let transport = self.transport.clone();
                    let task = task.clone();
                    let host_name = exec_host.host.name.clone();

                    async move {
                        let outcome = match sem.acquire_owned().await {
                            Ok(_permit) => tokio::task::spawn_blocking(move || {
                                let step =
                                    run_task_on_host(transport.as_ref(), &mut exec_host, &task);
                                (exec_host, step)
                            })
                            .await
                            .map_err(|e| GoatError::Runtime {
                                message: format!("Host worker failed: {}", e),
                            }),
                            Err(e) => Err(GoatError::Runtime {
                                message: format!("Worker pool closed: {}", e),
                            }),
                        };
                        (host_name, outcome)
                    }
                })
                .collect();

            for (host_name, outcome) in join_all(futures).await {
                match outcome {
                    Ok((exec_host, step)) => {
                        record(&mut result, &task.name, &exec_host.host.name, step);
                        hosts.push(exec_host);
                    }
                    Err(err) => {
                        warn!(host = %host_name, error = %err, "host worker failed, dropping host");
                        result.mark_unreachable(&host_name, err);
                    }
                }
            }
        }

        info!(playbook = %playbook.name, "playbook finished");
        Ok(result)
    }
}

/// Ensure the host is connected, then run the task's command
fn run_task_on_host(
    transport: &dyn Transport,
    exec_host: &mut ExecutionHost,
    task: &CommandTask,
) -> HostStep {
    match exec_host.connection.status() {
        ConnectionStatus::Failed => return HostStep::Skipped,
        ConnectionStatus::NotInitiated => {
            if let Err(err) = exec_host.connection.connect(&exec_host.host, transport) {
                warn!(host = %exec_host.host.name, error = %err, "error connecting to host");
                return HostStep::Unreachable(err);
            }
        }
        ConnectionStatus::Connected => {}
    }

    debug!(host = %exec_host.host.name, task = %task.name, cmd = %task.cmd, "running command");
    let task_result = exec_host.connection.run(&task.cmd);
    if let Some(err) = task_result.error() {
        debug!(host = %exec_host.host.name, task = %task.name, error = %err, "task failed");
    }
    HostStep::Ran(task_result)
}

fn record(result: &mut PlaybookResult, task_name: &str, host_name: &str, step: HostStep) {
    match step {
        HostStep::Ran(task_result) => result.insert(task_name, host_name, task_result),
        HostStep::Unreachable(err) => result.mark_unreachable(host_name, err),
        HostStep::Skipped => {}
    }
}
