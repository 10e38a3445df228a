//! Configuration for `d`.
//!
//! Holds clap structs for command line arguments and flags. Host groups are kept in a YAML file;
//! see [`crate::groups`].

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::groups::DEFAULT_GROUP;
use crate::load::SamplingOptions;

/// Distributed development across machines using SSH and rsync
#[derive(Parser)]
#[command(name = "d", version)]
pub struct Config {
    #[command(subcommand)]
    pub mode: Mode,

    /// Target group
    #[arg(long, short, global = true, default_value = DEFAULT_GROUP)]
    pub group: String,

    /// Target a specific host instead of a group
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Seconds a host has to answer the reachability probe
    #[arg(long, global = true, default_value = "2")]
    pub probe_timeout: u64,

    /// Seconds to wait for load metrics from a reachable host. Giving 0 waits forever.
    #[arg(long, global = true, default_value = "10")]
    pub load_timeout: u64,

    /// Print debug logs to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

impl Config {
    pub fn sampling_options(&self) -> SamplingOptions {
        let probe_timeout = Duration::from_secs(self.probe_timeout);
        SamplingOptions {
            probe_timeout,
            connect_timeout: SamplingOptions::default().connect_timeout.min(probe_timeout),
            load_timeout: match self.load_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

#[derive(Subcommand)]
pub enum Mode {
    /// Show which SSH config hosts are online
    Status,
    /// Show load across target hosts
    Load,
    /// Sync a directory to target hosts
    Sync {
        /// Directory to mirror
        #[arg(default_value = ".")]
        path: String,
        /// Show what would be synced
        #[arg(long)]
        dry_run: bool,
    },
    /// Copy a directory back from a host
    Pull {
        host: String,
        /// Remote directory
        remote: String,
        /// Local destination
        #[arg(default_value = ".")]
        local: String,
    },
    /// Run a command on the least loaded host
    Run {
        /// Run on every target host in parallel instead
        #[arg(long)]
        all: bool,
        /// Fill in {{hostname}} in the command for each host
        #[arg(long, short)]
        template: bool,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Sync the current directory and attach to tmux on a host
    Tmux { host: String },
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigAction),
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Put every SSH config host into the default group
    Init,
    /// Show current configuration
    Show,
}
