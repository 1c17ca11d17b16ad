// Inventory module for host management
//
// Hosts live in a tree of groups rooted at "all". Variables declared deeper in
// the tree take precedence over variables declared closer to the root.

mod groups;
mod static_inv;

pub use groups::*;
pub use static_inv::{parse_inventory, parse_inventory_file};
pub(crate) use static_inv::{vars_from_yaml, RawVars};

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;

use crate::output::errors::{GoatError, Result};

/// Variable map attached to hosts, groups, inventories and playbooks
pub type Vars = BTreeMap<String, String>;

/// Name of the root group, which also selects the whole inventory
pub const ALL_GROUP: &str = "all";

/// A single host declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub vars: Vars,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Host {
            name: name.into(),
            vars: Vars::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// A named node in the inventory tree. The name is the key under which the
/// parent stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostGroup {
    pub hosts: IndexMap<String, Host>,
    pub children: IndexMap<String, HostGroup>,
    pub vars: Vars,
}

impl HostGroup {
    pub fn new() -> Self {
        HostGroup::default()
    }

    pub fn with_host(mut self, host: Host) -> Self {
        self.hosts.insert(host.name.clone(), host);
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, group: HostGroup) -> Self {
        self.children.insert(name.into(), group);
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// The complete inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub all: HostGroup,
    pub vars: Vars,
}

impl Inventory {
    pub fn new(all: HostGroup) -> Self {
        Inventory {
            all,
            vars: Vars::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Load inventory from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        parse_inventory_file(path)
    }

    /// Resolve playbook target names into execution hosts
    pub fn select_hosts<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Host>> {
        HostSelector::new(self).select(names)
    }
}

impl std::str::FromStr for Inventory {
    type Err = GoatError;

    fn from_str(s: &str) -> Result<Self> {
        parse_inventory(s)
    }
}

/// Single-host variable lookup across a subtree.
///
/// Implemented identically by groups and the inventory root so callers never
/// need to know whether they hold a leaf or a branch.
pub trait Gather {
    fn gather(&self, hostname: &str) -> Result<Host>;
}

impl Gather for HostGroup {
    fn gather(&self, hostname: &str) -> Result<Host> {
        let mut vars = Vars::new();

        // Direct declarations never overwrite each other
        if let Some(host) = self.hosts.get(hostname) {
            for (key, value) in &host.vars {
                vars.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        // Declarations inside child groups override this level
        for child in self.children.values() {
            match child.gather(hostname) {
                Ok(found) => vars.extend(found.vars),
                Err(err) if err.is_host_not_found() => continue,
                Err(err) => return Err(err),
            }
        }

        if vars.is_empty() {
            return Err(GoatError::HostNotFound {
                host: hostname.to_string(),
            });
        }

        Ok(Host {
            name: hostname.to_string(),
            vars,
        })
    }
}

impl Gather for Inventory {
    fn gather(&self, hostname: &str) -> Result<Host> {
        let mut host = self.all.gather(hostname)?;

        for (key, value) in &self.vars {
            host.vars
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        Ok(host)
    }
}
