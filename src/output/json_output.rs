// JSON output for machine consumers

use serde_json::json;

use super::terminal::PlayRecap;
use super::OutputFormatter;
use crate::executor::TaskResult;

/// One JSON object per (task, host), newline terminated (NDJSON)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        JsonFormatter
    }

    pub fn event(&self, task_name: &str, host_name: &str, result: &TaskResult) -> serde_json::Value {
        json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "event": "task_result",
            "task": task_name,
            "host": host_name,
            "status": if result.success() { "ok" } else { "failed" },
            "exit_code": result.exit_code(),
            "stdout": result.stdout(),
            "stderr": result.stderr(),
            "error": result.error().map(|e| e.to_string()),
        })
    }

    /// Run summary event
    pub fn recap(&self, recap: &PlayRecap) -> String {
        let hosts: serde_json::Map<String, serde_json::Value> = recap
            .hosts
            .iter()
            .map(|(host, stats)| {
                (
                    host.clone(),
                    json!({
                        "ok": stats.ok,
                        "failed": stats.failed,
                        "unreachable": stats.unreachable,
                    }),
                )
            })
            .collect();

        let event = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "event": "playbook_complete",
            "hosts": hosts,
            "total_failed": recap.total_failed(),
            "has_failures": recap.has_failures(),
        });
        format!("{}\n", event)
    }
}

impl OutputFormatter for JsonFormatter {
    fn output(&self, task_name: &str, host_name: &str, result: &TaskResult) -> String {
        format!("{}\n", self.event(task_name, host_name, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CommandResult, PlaybookResult};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_task_result() {
        let result = TaskResult::from_command(
            "web1",
            CommandResult {
                stdout: "test\n".to_string(),
                stderr: String::new(),
                exit_code: 0,
            },
        );

        let line = JsonFormatter::new().output("task one", "web1", &result);
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "task_result");
        assert_eq!(value["task"], "task one");
        assert_eq!(value["host"], "web1");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["stdout"], "test\n");
        assert!(value["error"].is_null());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_json_failed_result() {
        let result = TaskResult::from_command(
            "web1",
            CommandResult {
                stdout: String::new(),
                stderr: "boom".to_string(),
                exit_code: 2,
            },
        );

        let value = JsonFormatter::new().event("t", "web1", &result);
        assert_eq!(value["status"], "failed");
        assert_eq!(value["exit_code"], 2);
        assert_eq!(
            value["error"],
            "Command exited with status 2 on host web1"
        );
    }

    #[test]
    fn test_json_recap() {
        let mut result = PlaybookResult::new();
        result.insert(
            "t",
            "web1",
            TaskResult::from_command("web1", CommandResult::default()),
        );

        let line = JsonFormatter::new().recap(&PlayRecap::from_result(&result));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "playbook_complete");
        assert_eq!(value["hosts"]["web1"]["ok"], 1);
        assert_eq!(value["has_failures"], false);
    }
}
