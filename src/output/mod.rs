// Output module for goat

pub mod errors;
pub mod json_output;
pub mod terminal;

pub use errors::*;
pub use json_output::*;
pub use terminal::*;

use crate::executor::{PlaybookResult, TaskResult};

/// Output format for goat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text blocks
    #[default]
    Text,
    /// Machine-readable JSON output (NDJSON format)
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}', expected text or json", other)),
        }
    }
}

impl OutputFormat {
    pub fn formatter(self) -> Box<dyn OutputFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter::new()),
            OutputFormat::Json => Box::new(JsonFormatter::new()),
        }
    }
}

/// Turns one task result into printable text
pub trait OutputFormatter {
    fn output(&self, task_name: &str, host_name: &str, result: &TaskResult) -> String;
}

/// Format every recorded result, tasks in playbook order and hosts in
/// resolution order
pub fn render_playbook_result(formatter: &dyn OutputFormatter, result: &PlaybookResult) -> String {
    let mut out = String::new();
    for (task_name, hosts) in result.tasks() {
        for (host_name, task_result) in hosts {
            out.push_str(&formatter.output(task_name, host_name, task_result));
        }
    }
    out
}
