// Parser module for goat playbooks

pub mod ast;
pub mod yaml;

pub use ast::*;
pub use yaml::{parse_playbook, parse_playbook_file};
