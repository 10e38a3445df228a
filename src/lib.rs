//! Distributed: treat a pool of SSH hosts as one elastic workstation.

// Command line arguments and configuration.
pub mod config;
// Host groups.
pub mod groups;
// SSH config hosts.
pub mod host;
// Commands to run remotely.
pub mod job;
// Reachability probing and load sampling.
pub mod load;
// Best-host selection.
pub mod scheduler;
// Single-host and all-hosts command dispatch.
pub mod dispatch;
// Directory mirroring.
pub mod sync;
// Remote-shell transport.
pub mod session;
// Progress output.
pub mod reporter;
// Error handling.
pub mod error;

pub use config::{Config, ConfigAction, Mode};
pub use dispatch::{run_on_all, run_on_host, DispatchOutcome, DispatchReport};
pub use error::{DistError, Result};
pub use groups::{resolve_targets, GroupConfig};
pub use host::{parse_ssh_config, SshHost};
pub use job::Job;
pub use load::{cpu_percent, score, HostLoadSample, Sampler, SamplingOptions};
pub use reporter::{ConsoleReporter, Reporter};
pub use scheduler::{pick_best, scan, select_best};
pub use session::{SshTransport, Transport};
