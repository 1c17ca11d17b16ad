// Static YAML inventory parser

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use super::{Host, HostGroup, Inventory, Vars};
use crate::output::errors::{GoatError, Result};

/// Raw variable mapping, before scalar coercion
pub(crate) type RawVars = IndexMap<String, YamlValue>;

/// Raw YAML inventory structure (before model conversion)
#[derive(Debug, Default, Deserialize)]
struct RawInventory {
    all: Option<RawGroup>,
    vars: Option<RawVars>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGroup {
    hosts: Option<IndexMap<String, Option<RawHost>>>,
    children: Option<IndexMap<String, Option<RawGroup>>>,
    vars: Option<RawVars>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHost {
    vars: Option<RawVars>,
}

/// Parse inventory from a YAML file
pub fn parse_inventory_file(path: &Path) -> Result<Inventory> {
    let content = std::fs::read_to_string(path).map_err(|e| GoatError::Io {
        message: format!("Failed to read inventory file: {}", e),
        path: Some(path.to_path_buf()),
    })?;

    parse_inventory(&content).map_err(|err| match err {
        GoatError::Parse { message, .. } => GoatError::Parse {
            message,
            path: Some(path.to_path_buf()),
        },
        other => other,
    })
}

/// Parse inventory from a YAML string
pub fn parse_inventory(content: &str) -> Result<Inventory> {
    if content.trim().is_empty() {
        return Ok(Inventory::default());
    }

    let raw: Option<RawInventory> =
        serde_yaml::from_str(content).map_err(|e| GoatError::Parse {
            message: format!("Invalid inventory YAML: {}", e),
            path: None,
        })?;
    let raw = raw.unwrap_or_default();

    Ok(Inventory {
        all: convert_group(raw.all.unwrap_or_default(), "all")?,
        vars: vars_from_yaml(raw.vars, "inventory")?,
    })
}

fn convert_group(raw: RawGroup, group_name: &str) -> Result<HostGroup> {
    let mut group = HostGroup {
        vars: vars_from_yaml(raw.vars, &format!("group '{}'", group_name))?,
        ..HostGroup::default()
    };

    for (host_name, raw_host) in raw.hosts.unwrap_or_default() {
        let raw_host = raw_host.unwrap_or_default();
        let vars = vars_from_yaml(raw_host.vars, &format!("host '{}'", host_name))?;
        group.hosts.insert(
            host_name.clone(),
            Host {
                name: host_name,
                vars,
            },
        );
    }

    for (child_name, raw_child) in raw.children.unwrap_or_default() {
        let child = convert_group(raw_child.unwrap_or_default(), &child_name)?;
        group.children.insert(child_name, child);
    }

    Ok(group)
}

/// Convert a raw YAML mapping into string variables.
///
/// Scalars are read as their textual value (`22` becomes `"22"`, null becomes
/// an empty string); nested sequences or mappings are rejected.
pub(crate) fn vars_from_yaml(raw: Option<RawVars>, owner: &str) -> Result<Vars> {
    let mut vars = Vars::new();

    for (key, value) in raw.unwrap_or_default() {
        let text = scalar_to_string(&value).ok_or_else(|| GoatError::Parse {
            message: format!(
                "Variable '{}' of {} must be a string, number or boolean",
                key, owner
            ),
            path: None,
        })?;
        vars.insert(key, text);
    }

    Ok(vars)
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Null => Some(String::new()),
        YamlValue::Tagged(tagged) => scalar_to_string(&tagged.value),
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Gather;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SIMPLE_INVENTORY: &str = r#"
all:
  hosts:
    ssh1:
      ssh_port: 2222
      username: test
      password: test
"#;

    const TRIPLY_NESTED_INVENTORY: &str = r#"
all:
  hosts:
    ssh1:
      vars:
        ssh_port: 2222
        username: test
        password: test
        outer_only: yes
    ssh2:
      vars:
        ssh_port: 2222
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
             ssh_port: 2222
             username: test_inner
             password: test_inner
"#;

    #[test]
    fn test_parse_from_missing_file() {
        let err = parse_inventory_file(Path::new("idontexist.yaml")).unwrap_err();
        assert!(matches!(err, GoatError::Io { .. }));
    }

    #[test]
    fn test_parse_simple_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SIMPLE_INVENTORY.as_bytes()).unwrap();

        let inv = Inventory::from_file(file.path()).unwrap();
        assert_eq!(inv.all.hosts.len(), 1);
        // keys outside `vars` are ignored
        assert!(inv.all.hosts["ssh1"].vars.is_empty());
    }

    #[test]
    fn test_parse_triply_nested() {
        let inv: Inventory = TRIPLY_NESTED_INVENTORY.parse().unwrap();

        assert_eq!(inv.all.hosts.len(), 3);
        assert_eq!(inv.all.children.len(), 2);
        assert_eq!(inv.all.children["inner"].hosts.len(), 1);
        assert!(inv.all.hosts["ssh4"].vars.is_empty());
        assert_eq!(inv.all.hosts["ssh1"].get_var("ssh_port"), Some("2222"));
        assert_eq!(inv.all.hosts["ssh1"].get_var("outer_only"), Some("yes"));

        let names: Vec<&str> = inv.all.hosts.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ssh1", "ssh2", "ssh4"]);
    }

    #[test]
    fn test_gather_from_parsed_inventory() {
        let inv: Inventory = TRIPLY_NESTED_INVENTORY.parse().unwrap();

        let host = inv.gather("ssh1").unwrap();
        assert_eq!(host.get_var("username"), Some("test_inner"));
        assert_eq!(host.get_var("outer_only"), Some("yes"));
    }

    #[test]
    fn test_empty_inventory_has_all_group() {
        let inv = parse_inventory("").unwrap();
        assert!(inv.all.hosts.is_empty());
        assert!(inv.all.children.is_empty());

        let inv = parse_inventory("all:\n").unwrap();
        assert_eq!(inv.all, HostGroup::default());
    }

    #[test]
    fn test_scalar_vars_are_stringified() {
        let yaml = r#"
vars:
  timeout: 30
all:
  vars:
    enabled: true
    empty:
"#;
        let inv = parse_inventory(yaml).unwrap();
        assert_eq!(inv.vars.get("timeout").map(String::as_str), Some("30"));
        assert_eq!(inv.all.vars.get("enabled").map(String::as_str), Some("true"));
        assert_eq!(inv.all.vars.get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn test_nested_var_value_rejected() {
        let yaml = r#"
all:
  hosts:
    web1:
      vars:
        ports: [80, 443]
"#;
        let err = parse_inventory(yaml).unwrap_err();
        assert!(err.to_string().contains("ports"));
        assert!(err.to_string().contains("host 'web1'"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = parse_inventory("all: [unclosed").unwrap_err();
        assert!(matches!(err, GoatError::Parse { .. }));
    }
}
