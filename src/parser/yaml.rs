// YAML playbook parser

use serde::Deserialize;
use std::path::Path;

use super::ast::*;
use crate::inventory::{vars_from_yaml, RawVars};
use crate::output::errors::{GoatError, Result};

/// Raw YAML playbook structure (before AST conversion)
#[derive(Debug, Deserialize)]
struct RawPlaybook {
    name: Option<String>,
    hosts: Option<HostsValue>,
    vars: Option<RawVars>,
    tasks: Option<Vec<RawTask>>,
}

/// Hosts can be a single name or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostsValue {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawTask {
    name: Option<String>,
    cmd: Option<String>,
}

/// Parse a playbook from a YAML file
pub fn parse_playbook_file(path: &Path) -> Result<Playbook> {
    let content = std::fs::read_to_string(path).map_err(|e| GoatError::Io {
        message: format!("Failed to read playbook file: {}", e),
        path: Some(path.to_path_buf()),
    })?;

    parse_playbook(&content, path.display().to_string()).map_err(|err| match err {
        GoatError::Parse { message, .. } => GoatError::Parse {
            message,
            path: Some(path.to_path_buf()),
        },
        other => other,
    })
}

/// Parse a playbook from a YAML string
pub fn parse_playbook(content: &str, source_file: String) -> Result<Playbook> {
    let raw: RawPlaybook = serde_yaml::from_str(content).map_err(|e| GoatError::Parse {
        message: format!("Invalid playbook YAML: {}", e),
        path: None,
    })?;

    let hosts = match raw.hosts {
        Some(HostsValue::Single(name)) => vec![name],
        Some(HostsValue::Multiple(names)) => names,
        None => Vec::new(),
    };

    let tasks = raw
        .tasks
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, task)| convert_task(index, task))
        .collect::<Result<Vec<_>>>()?;

    Ok(Playbook {
        name: raw.name.unwrap_or_default(),
        source_file,
        hosts,
        vars: vars_from_yaml(raw.vars, "playbook")?,
        tasks,
    })
}

fn convert_task(index: usize, raw: RawTask) -> Result<CommandTask> {
    let cmd = match raw.cmd {
        Some(cmd) if !cmd.trim().is_empty() => cmd,
        _ => {
            let label = raw
                .name
                .map(|name| format!("'{}'", name))
                .unwrap_or_else(|| format!("#{}", index + 1));
            return Err(GoatError::Parse {
                message: format!("Task {} has no 'cmd'", label),
                path: None,
            });
        }
    };

    // Unnamed tasks are keyed by their command line
    let name = raw.name.unwrap_or_else(|| cmd.clone());

    Ok(CommandTask { name, cmd })
}

impl Playbook {
    /// Load a playbook from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        parse_playbook_file(path)
    }
}

impl std::str::FromStr for Playbook {
    type Err = GoatError;

    fn from_str(s: &str) -> Result<Self> {
        parse_playbook(s, String::new())
    }
}
