// goat - minimal configuration management
//
// Runs an ordered list of shell commands over SSH against hosts selected from
// a hierarchical inventory.

pub mod executor;
pub mod inventory;
pub mod output;
pub mod parser;

pub use executor::{ExecutorConfig, PlaybookExecutor, PlaybookResult, TaskResult};
pub use inventory::{Gather, Host, HostGroup, HostSelector, Inventory};
pub use output::{GoatError, Result};
pub use parser::{parse_playbook, parse_playbook_file, CommandTask, Playbook};

/// Version of the goat tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
