// Task and playbook results

use indexmap::IndexMap;

use crate::output::errors::GoatError;

/// Result of executing a command on a remote host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of one (task, host) attempt. Immutable once produced.
///
/// A non-zero exit or a remote-side error is carried here as data; it never
/// stops the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    error: Option<GoatError>,
}

impl TaskResult {
    /// Build a result from a command that ran to completion
    pub fn from_command(host: &str, output: CommandResult) -> Self {
        let error = if output.success() {
            None
        } else {
            Some(GoatError::CommandFailed {
                host: host.to_string(),
                exit_code: output.exit_code,
            })
        };

        TaskResult {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: Some(output.exit_code),
            error,
        }
    }

    /// Build a result for a command that never completed
    pub fn from_error(error: GoatError) -> Self {
        TaskResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: Some(error),
        }
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn error(&self) -> Option<&GoatError> {
        self.error.as_ref()
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Results of one playbook run: task name -> host name -> result.
///
/// Tasks keep playbook order and hosts keep resolution order. A host whose
/// connection failed has no entry for the task it failed on or any later task;
/// its connection error is kept in `unreachable` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybookResult {
    tasks: IndexMap<String, IndexMap<String, TaskResult>>,
    unreachable: IndexMap<String, GoatError>,
}

impl PlaybookResult {
    pub fn new() -> Self {
        PlaybookResult::default()
    }

    /// Start a fresh, empty entry for the task. A task reusing an earlier
    /// task's name replaces that task's results entirely.
    pub fn begin_task(&mut self, task_name: &str) {
        self.tasks.insert(task_name.to_string(), IndexMap::new());
    }

    pub fn insert(&mut self, task_name: &str, host_name: &str, result: TaskResult) {
        self.tasks
            .entry(task_name.to_string())
            .or_default()
            .insert(host_name.to_string(), result);
    }

    pub fn mark_unreachable(&mut self, host_name: &str, error: GoatError) {
        self.unreachable.insert(host_name.to_string(), error);
    }

    pub fn get(&self, task_name: &str, host_name: &str) -> Option<&TaskResult> {
        self.tasks.get(task_name)?.get(host_name)
    }

    pub fn task(&self, task_name: &str) -> Option<&IndexMap<String, TaskResult>> {
        self.tasks.get(task_name)
    }

    /// Iterate tasks in playbook order
    pub fn tasks(&self) -> impl Iterator<Item = (&str, &IndexMap<String, TaskResult>)> {
        self.tasks.iter().map(|(name, hosts)| (name.as_str(), hosts))
    }

    pub fn unreachable(&self) -> &IndexMap<String, GoatError> {
        &self.unreachable
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True when every recorded result succeeded and every host was reachable
    pub fn all_succeeded(&self) -> bool {
        self.unreachable.is_empty()
            && self
                .tasks
                .values()
                .all(|hosts| hosts.values().all(TaskResult::success))
    }
}
