// Playbook types

use crate::inventory::Vars;

/// A complete goat playbook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playbook {
    pub name: String,
    pub source_file: String,
    /// Target names: hosts or groups of the inventory, in order
    pub hosts: Vec<String>,
    /// Playbook-level defaults, overridden by any inventory variable
    pub vars: Vars,
    /// Tasks in execution order
    pub tasks: Vec<CommandTask>,
}

impl Playbook {
    pub fn new(name: impl Into<String>) -> Self {
        Playbook {
            name: name.into(),
            ..Playbook::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.hosts.push(target.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_task(mut self, task: CommandTask) -> Self {
        self.tasks.push(task);
        self
    }
}

/// One named remote command.
///
/// The name keys the task's results; two tasks with the same name share one
/// entry and the later one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTask {
    pub name: String,
    pub cmd: String,
}

impl CommandTask {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        CommandTask {
            name: name.into(),
            cmd: cmd.into(),
        }
    }
}
