//! SSH client configuration.
//!
//! Hosts are discovered from the `Host` blocks of `~/.ssh/config`. Only the alias, address, user
//! and port are kept; everything else is left to `ssh` itself.

use std::fs;
use std::path::Path;

use colored::*;
use colourado::Color;

use crate::error::{DistError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshHost {
    /// Name used on the command line and in groups.
    pub alias: String,
    /// `HostName`, empty if not set.
    pub hostname: String,
    /// `User`, empty if not set.
    pub user: String,
    pub port: String,
}

impl SshHost {
    fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            hostname: String::new(),
            user: String::new(),
            port: "22".to_string(),
        }
    }
}

/// Parse the text of an OpenSSH client config.
///
/// Wildcard `Host` patterns are not real hosts; they end the current block and are skipped.
pub fn parse_ssh_config(text: &str) -> Vec<SshHost> {
    let mut hosts: Vec<SshHost> = vec![];
    // Whether keywords currently apply to the last entry of `hosts`.
    let mut in_host = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            continue;
        }
        let value = fields[1];

        match fields[0].to_lowercase().as_str() {
            "host" => {
                if value.contains('*') {
                    in_host = false;
                } else {
                    hosts.push(SshHost::new(value));
                    in_host = true;
                }
            }
            "hostname" if in_host => set_last(&mut hosts, |h| h.hostname = value.to_string()),
            "user" if in_host => set_last(&mut hosts, |h| h.user = value.to_string()),
            "port" if in_host => set_last(&mut hosts, |h| h.port = value.to_string()),
            _ => {}
        }
    }

    hosts
}

fn set_last<F: FnOnce(&mut SshHost)>(hosts: &mut [SshHost], f: F) {
    if let Some(host) = hosts.last_mut() {
        f(host);
    }
}

pub fn parse_ssh_config_file(path: &Path) -> Result<Vec<SshHost>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_ssh_config(&text))
}

/// `~/.ssh/config`.
pub fn default_ssh_config_path() -> Result<std::path::PathBuf> {
    let home = dirs::home_dir().ok_or(DistError::NoHomeDir)?;
    Ok(home.join(".ssh").join("config"))
}

pub fn find_host<'a>(hosts: &'a [SshHost], alias: &str) -> Option<&'a SshHost> {
    hosts.iter().find(|h| h.alias == alias)
}

/// For pretty-printing a host name.
/// Surrounds with brackets and colors it.
pub fn prettify(host: &str, color: Color) -> ColoredString {
    let r = (color.red * 255.0) as u8;
    let g = (color.green * 255.0) as u8;
    let b = (color.blue * 255.0) as u8;
    format!("[{}]", host).truecolor(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "# Test SSH config
Host homelab
    HostName 100.72.192.70
    User wv3
    Port 22

Host sonia-mac
    HostName 100.75.170.108
    User sonia

# This should be ignored
Host *
    ServerAliveInterval 60
    User nobody

Host basic
    HostName example.com

Host with-custom-port
    HostName custom.example.com
    User admin
    Port 2222
";

    #[test]
    fn test_parse_ssh_config() {
        let hosts = parse_ssh_config(CONFIG);
        let aliases: Vec<&str> = hosts.iter().map(|h| h.alias.as_str()).collect();
        assert_eq!(aliases, vec!["homelab", "sonia-mac", "basic", "with-custom-port"]);

        assert_eq!(
            hosts[1],
            SshHost {
                alias: "sonia-mac".to_string(),
                hostname: "100.75.170.108".to_string(),
                user: "sonia".to_string(),
                port: "22".to_string(),
            }
        );
        assert_eq!(hosts[2].user, "");
        assert_eq!(hosts[3].port, "2222");
    }

    #[test]
    fn test_wildcard_block_does_not_leak() {
        let hosts = parse_ssh_config(CONFIG);
        // `User nobody` sits under `Host *` and must not land on sonia-mac.
        assert_eq!(find_host(&hosts, "sonia-mac").unwrap().user, "sonia");
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let hosts = parse_ssh_config("HOST box\n  hostname 10.0.0.1\n  USER root\n  pOrT 2200\n");
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "10.0.0.1");
        assert_eq!(hosts[0].user, "root");
        assert_eq!(hosts[0].port, "2200");
    }

    #[test]
    fn test_keywords_before_any_host_ignored() {
        let hosts = parse_ssh_config("User global\nHostName nowhere\nHost a\n");
        assert_eq!(hosts, vec![SshHost::new("a")]);
    }

    #[test]
    fn test_short_lines_skipped() {
        let hosts = parse_ssh_config("Host\nHost a\n  HostName\n");
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "");
    }

    #[test]
    fn test_find_host_missing() {
        let hosts = parse_ssh_config(CONFIG);
        assert!(find_host(&hosts, "nope").is_none());
    }
}
