// Host selection: turn playbook target names into execution hosts

use super::{Host, HostGroup, Inventory, Vars, ALL_GROUP};
use crate::output::errors::{GoatError, Result};

/// Resolves target names (host names, group names or "all") against an
/// inventory.
///
/// Every name is resolved on its own and the results are concatenated in the
/// order the names were given. A host reachable through two names appears
/// twice; callers that want idempotent targeting dedupe the names first.
pub struct HostSelector<'a> {
    inventory: &'a Inventory,
}

impl<'a> HostSelector<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        HostSelector { inventory }
    }

    /// Resolve all names, failing when none of them matched anything
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Host>> {
        let hosts: Vec<Host> = names
            .iter()
            .flat_map(|name| self.select_one(name.as_ref()))
            .collect();

        if hosts.is_empty() {
            return Err(GoatError::NoHostsResolved {
                names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            });
        }

        Ok(hosts)
    }

    /// Resolve a single name; an unknown name yields no hosts
    pub fn select_one(&self, name: &str) -> Vec<Host> {
        let mut found = Vec::new();
        let mut layers = vec![&self.inventory.vars];
        find_in_group(&self.inventory.all, ALL_GROUP, name, &mut layers, &mut found);
        found
    }
}

/// Depth-first search for `name`. `layers` holds the vars of every group on
/// the path from the root, outermost first.
fn find_in_group<'a>(
    group: &'a HostGroup,
    group_name: &str,
    name: &str,
    layers: &mut Vec<&'a Vars>,
    found: &mut Vec<Host>,
) {
    layers.push(&group.vars);

    if group_name == name {
        // A matched subtree is not searched again for the same name
        collect_all(group, layers, found);
    } else {
        if let Some((host_name, host)) = group.hosts.get_key_value(name) {
            found.push(merge_host(host_name, host, layers));
        }
        for (child_name, child) in &group.children {
            find_in_group(child, child_name, name, layers, found);
        }
    }

    layers.pop();
}

/// Every host under `group`: direct hosts first, then child groups in order.
/// The group's own vars must already be on top of `layers`.
fn collect_all<'a>(group: &'a HostGroup, layers: &mut Vec<&'a Vars>, found: &mut Vec<Host>) {
    for (host_name, host) in &group.hosts {
        found.push(merge_host(host_name, host, layers));
    }

    for child in group.children.values() {
        layers.push(&child.vars);
        collect_all(child, layers, found);
        layers.pop();
    }
}

fn merge_host(host_name: &str, host: &Host, layers: &[&Vars]) -> Host {
    let mut vars = Vars::new();
    for layer in layers {
        vars.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    vars.extend(host.vars.iter().map(|(k, v)| (k.clone(), v.clone())));

    Host {
        name: host_name.to_string(),
        vars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TRIPLY_NESTED_INVENTORY: &str = r#"
all:
  hosts:
    ssh1:
      vars:
        username: test
        password: test
        outer_only: yes
    ssh2:
      vars:
        username: test2
        password: test2
    ssh4:
  children:
    ssh2:
      hosts:
        ssh3:
    inner:
      hosts:
        ssh1:
          vars:
            username: test_inner
            password: test_inner
"#;

    fn names(hosts: &[Host]) -> Vec<&str> {
        hosts.iter().map(|h| h.name.as_str()).collect()
    }

    fn create_test_inventory() -> Inventory {
        let web = HostGroup::new()
            .with_var("role", "web")
            .with_var("port", "8080")
            .with_host(Host::new("web1").with_var("port", "80"))
            .with_host(Host::new("web2"));
        let db = HostGroup::new()
            .with_var("role", "db")
            .with_host(Host::new("db1"))
            .with_child(
                "replicas",
                HostGroup::new()
                    .with_var("replica", "true")
                    .with_host(Host::new("db2")),
            );
        let prod = HostGroup::new()
            .with_var("env", "prod")
            .with_child("web", web)
            .with_child("db", db);

        Inventory::new(
            HostGroup::new()
                .with_var("env", "default")
                .with_var("username", "deploy")
                .with_child("prod", prod)
                .with_child("staging", HostGroup::new().with_host(Host::new("stage1"))),
        )
        .with_var("username", "nobody")
        .with_var("password", "secret")
    }

    #[test]
    fn test_select_by_host_name() {
        let inv: Inventory = TRIPLY_NESTED_INVENTORY.parse().unwrap();

        let hosts = inv.select_hosts(&["ssh1"]).unwrap();
        assert_eq!(names(&hosts), vec!["ssh1", "ssh1"]);
        assert_eq!(hosts[0].get_var("username"), Some("test"));
        assert_eq!(hosts[1].get_var("username"), Some("test_inner"));
        // each match is scoped to its own path
        assert_eq!(hosts[1].get_var("outer_only"), None);
    }

    #[test]
    fn test_select_host_and_group_with_same_name() {
        let inv: Inventory = TRIPLY_NESTED_INVENTORY.parse().unwrap();

        let hosts = inv.select_hosts(&["ssh2"]).unwrap();
        assert_eq!(names(&hosts), vec!["ssh2", "ssh3"]);
        assert_eq!(hosts[0].get_var("username"), Some("test2"));
    }

    #[test]
    fn test_select_multiple_host_names() {
        let inv: Inventory = TRIPLY_NESTED_INVENTORY.parse().unwrap();

        let hosts = inv.select_hosts(&["ssh1", "ssh4"]).unwrap();
        assert_eq!(names(&hosts), vec!["ssh1", "ssh1", "ssh4"]);
    }

    #[test]
    fn test_select_all_is_entire_inventory() {
        let inv: Inventory = TRIPLY_NESTED_INVENTORY.parse().unwrap();

        let hosts = inv.select_hosts(&["all"]).unwrap();
        assert_eq!(names(&hosts), vec!["ssh1", "ssh2", "ssh4", "ssh3", "ssh1"]);
    }

    #[test]
    fn test_group_selection_is_transitive_closure() {
        let inv = create_test_inventory();

        let hosts = inv.select_hosts(&["prod"]).unwrap();
        assert_eq!(names(&hosts), vec!["web1", "web2", "db1", "db2"]);

        let hosts = inv.select_hosts(&["db"]).unwrap();
        assert_eq!(names(&hosts), vec!["db1", "db2"]);

        let hosts = inv.select_hosts(&["replicas"]).unwrap();
        assert_eq!(names(&hosts), vec!["db2"]);
    }

    #[test]
    fn test_group_selection_merges_path_vars() {
        let inv = create_test_inventory();
        let hosts = inv.select_hosts(&["prod"]).unwrap();

        let web1 = &hosts[0];
        assert_eq!(web1.get_var("port"), Some("80"));
        assert_eq!(web1.get_var("role"), Some("web"));
        assert_eq!(web1.get_var("env"), Some("prod"));
        assert_eq!(web1.get_var("username"), Some("deploy"));
        assert_eq!(web1.get_var("password"), Some("secret"));

        let web2 = &hosts[1];
        assert_eq!(web2.get_var("port"), Some("8080"));

        let db2 = &hosts[3];
        assert_eq!(db2.get_var("role"), Some("db"));
        assert_eq!(db2.get_var("replica"), Some("true"));
        assert_eq!(db2.get_var("port"), None);
    }

    #[test]
    fn test_host_selection_uses_full_path() {
        let inv = create_test_inventory();
        let hosts = inv.select_hosts(&["db2"]).unwrap();

        assert_eq!(hosts.len(), 1);
        let vars: Vec<(&str, &str)> = hosts[0]
            .vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            vars,
            vec![
                ("env", "prod"),
                ("password", "secret"),
                ("replica", "true"),
                ("role", "db"),
                ("username", "deploy"),
            ]
        );
    }

    #[test]
    fn test_host_and_enclosing_group_are_not_deduplicated() {
        let inv = create_test_inventory();

        let hosts = inv.select_hosts(&["web1", "web"]).unwrap();
        assert_eq!(names(&hosts), vec!["web1", "web1", "web2"]);
        assert_eq!(hosts[0], hosts[1]);
    }

    #[test]
    fn test_unknown_names_contribute_nothing() {
        let inv = create_test_inventory();

        let hosts = inv.select_hosts(&["ghost", "stage1"]).unwrap();
        assert_eq!(names(&hosts), vec!["stage1"]);
    }

    #[test]
    fn test_no_hosts_resolved() {
        let inv = create_test_inventory();

        let err = inv.select_hosts(&["ghost"]).unwrap_err();
        assert_eq!(
            err,
            GoatError::NoHostsResolved {
                names: vec!["ghost".to_string()]
            }
        );

        let err = Inventory::default().select_hosts(&["all"]).unwrap_err();
        assert!(matches!(err, GoatError::NoHostsResolved { .. }));
    }
}
