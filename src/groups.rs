//! Host groups.
//!
//! Groups live in `~/.config/distributed/config.yaml`:
//!
//! ```yaml
//! groups:
//!   dev:
//!     - homelab
//!     - sonia-mac
//! ```
//!
//! Host order inside a group is preserved; it decides ties during best-host selection.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DistError, Result};

pub const DEFAULT_GROUP: &str = "dev";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(DEFAULT_GROUP.to_string(), vec![]);
        Self { groups }
    }
}

impl GroupConfig {
    /// Read `path`, creating it with the default config if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "Created default config");
            return Ok(config);
        }
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn get_group(&self, name: &str) -> Result<&[String]> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DistError::GroupNotFound(name.to_string()))
    }

    pub fn add_to_group(&mut self, group: &str, host: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(host.to_string());
    }

    /// Candidate hosts for `group`, in configured order. An empty group is an error.
    pub fn targets(&self, group: &str) -> Result<Vec<String>> {
        let hosts = self.get_group(group)?;
        if hosts.is_empty() {
            return Err(DistError::EmptyGroup(group.to_string()));
        }
        Ok(hosts.to_vec())
    }
}

/// Path of the group config file.
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(DistError::NoHomeDir)?;
    Ok(home.join(".config").join("distributed").join("config.yaml"))
}

/// Hosts a command should target: the explicit `host` if given, otherwise the members of `group`.
/// The config at `path` is only read when no host is given.
pub fn resolve_targets_in(path: &Path, host: Option<&str>, group: &str) -> Result<Vec<String>> {
    match host {
        Some(host) => Ok(vec![host.to_string()]),
        None => GroupConfig::load_from(path)?.targets(group),
    }
}

pub fn resolve_targets(host: Option<&str>, group: &str) -> Result<Vec<String>> {
    match host {
        Some(host) => Ok(vec![host.to_string()]),
        None => GroupConfig::load()?.targets(group),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_empty_dev_group() {
        let config = GroupConfig::default();
        assert_eq!(config.get_group("dev").unwrap(), &[] as &[String]);
    }

    #[test]
    fn test_get_group_missing() {
        let config = GroupConfig::default();
        assert!(matches!(
            config.get_group("prod"),
            Err(DistError::GroupNotFound(ref name)) if name == "prod"
        ));
    }

    #[test]
    fn test_add_to_group_keeps_order() {
        let mut config = GroupConfig::default();
        config.add_to_group("dev", "b");
        config.add_to_group("dev", "a");
        config.add_to_group("gpu", "c");
        assert_eq!(config.get_group("dev").unwrap(), &["b", "a"]);
        assert_eq!(config.get_group("gpu").unwrap(), &["c"]);
    }

    #[test]
    fn test_targets_empty_group() {
        let config = GroupConfig::default();
        assert!(matches!(config.targets("dev"), Err(DistError::EmptyGroup(_))));
    }

    #[test]
    fn test_parse_yaml() {
        let config: GroupConfig =
            serde_yaml::from_str("groups:\n  dev:\n    - homelab\n    - sonia-mac\n").unwrap();
        assert_eq!(config.targets("dev").unwrap(), vec!["homelab", "sonia-mac"]);
    }

    #[test]
    fn test_parse_yaml_without_groups() {
        let config: GroupConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.groups.is_empty());
    }
}
