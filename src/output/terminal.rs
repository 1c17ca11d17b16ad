// Human-readable output for goat

use std::fmt::Write as _;
use std::io::IsTerminal;

use colored::*;
use indexmap::IndexMap;

use super::OutputFormatter;
use crate::executor::{PlaybookResult, TaskResult};

/// Plain text block per (task, host), tab-indented
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn new() -> Self {
        TextFormatter
    }
}

fn write_stream(out: &mut String, label: &str, content: &str) {
    let _ = writeln!(out, "\t\t{}:", label);
    for line in content.lines() {
        let _ = writeln!(out, "\t\t\t{}", line.trim());
    }
}

impl OutputFormatter for TextFormatter {
    fn output(&self, task_name: &str, host_name: &str, result: &TaskResult) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "task: {}", task_name);
        let _ = writeln!(out, "\thost: {}", host_name);

        if let Some(err) = result.error() {
            let _ = writeln!(out, "\t\terror: {}", err);
        }

        write_stream(&mut out, "stdout", result.stdout());
        write_stream(&mut out, "stderr", result.stderr());
        out
    }
}

/// Statistics for a single host
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostStats {
    pub ok: usize,
    pub failed: usize,
    pub unreachable: bool,
}

/// Per-host summary of a run, in the order hosts first appear
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlayRecap {
    pub hosts: IndexMap<String, HostStats>,
}

impl PlayRecap {
    pub fn new() -> Self {
        PlayRecap::default()
    }

    pub fn from_result(result: &PlaybookResult) -> Self {
        let mut recap = PlayRecap::new();
        for (_, hosts) in result.tasks() {
            for (host, task_result) in hosts {
                recap.record(host, task_result);
            }
        }
        for host in result.unreachable().keys() {
            recap.hosts.entry(host.clone()).or_default().unreachable = true;
        }
        recap
    }

    pub fn record(&mut self, host: &str, result: &TaskResult) {
        let stats = self.hosts.entry(host.to_string()).or_default();
        if result.success() {
            stats.ok += 1;
        } else {
            stats.failed += 1;
        }
    }

    pub fn has_failures(&self) -> bool {
        self.hosts.values().any(|s| s.failed > 0 || s.unreachable)
    }

    pub fn total_failed(&self) -> usize {
        self.hosts.values().map(|s| s.failed).sum()
    }

    /// Colored recap table
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "PLAY RECAP".green().bold());
        let _ = writeln!(out, "{}", "─".repeat(60).dimmed());

        for (host, stats) in &self.hosts {
            let ok = format!("ok={}", stats.ok).green();
            let failed = if stats.failed > 0 {
                format!("failed={}", stats.failed).red().bold()
            } else {
                format!("failed={}", stats.failed).normal()
            };
            let unreachable = if stats.unreachable {
                "unreachable=1".red().bold()
            } else {
                "unreachable=0".normal()
            };

            let _ = writeln!(
                out,
                "{:<30} : {}    {}    {}",
                host.white().bold(),
                ok,
                failed,
                unreachable
            );
        }
        out
    }

    pub fn print(&self) {
        if std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal() {
            colored::control::set_override(false);
        }
        println!();
        print!("{}", self.render());
    }
}
