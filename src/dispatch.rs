//! Running commands on one host or on many hosts at once.

use std::sync::Arc;

use colourado::{ColorPalette, PaletteType};
use futures::future::join_all;
use handlebars::Handlebars;
use itertools::zip;

use crate::error::{DistError, Result};
use crate::host::prettify;
use crate::job::Job;
use crate::reporter::Reporter;
use crate::session::Transport;

/// Run `command` on `host` with the local standard streams attached.
/// A non-zero remote exit status is an error.
pub async fn run_on_host(transport: &dyn Transport, host: &str, command: &str) -> Result<()> {
    let status = transport.attach(host, command).await?;
    if status.success() {
        Ok(())
    } else {
        Err(DistError::CommandFailed {
            host: host.to_string(),
            status,
        })
    }
}

/// How the command went on one host.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub host: String,
    /// `None` on success.
    pub error: Option<DistError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of [`run_on_all`].
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// One entry per host, in completion order.
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Collapse into a single result. The error carries the last failure to complete.
    pub fn into_result(self) -> Result<()> {
        let total = self.outcomes.len();
        let failed = self.failures().count();
        match self.outcomes.into_iter().rev().find_map(|o| o.error) {
            None => Ok(()),
            Some(last) => Err(DistError::DispatchFailed {
                failed,
                total,
                last: Box::new(last),
            }),
        }
    }
}

/// Run `job` on every host concurrently.
///
/// Each host gets its own task, which announces the host through `reporter` and then runs the
/// command. A failing or slow host never cancels the others; this returns only after every task
/// has reported back.
pub async fn run_on_all(
    transport: Arc<dyn Transport>,
    hosts: &[String],
    job: &Job,
    reporter: Arc<dyn Reporter>,
) -> DispatchReport {
    let num_hosts = hosts.len();
    if num_hosts == 0 {
        return DispatchReport::default();
    }

    // MPMC channel (used as MPSC) for tasks to hand back their outcome, exactly once each.
    let (done_tx, done_rx) = flume::bounded::<DispatchOutcome>(num_hosts);

    let colors = ColorPalette::new(num_hosts as u32, PaletteType::Pastel, false).colors;
    let mut tasks = Vec::with_capacity(num_hosts);
    for (color, host) in zip(colors, hosts.iter().cloned()) {
        let transport = Arc::clone(&transport);
        let reporter = Arc::clone(&reporter);
        let done_tx = done_tx.clone();
        let job = job.clone();
        tasks.push(tokio::spawn(async move {
            reporter.start(&format!("Running on {}", prettify(&host, color)));
            // Handlebars registry for filling in the hostname.
            let mut registry = Handlebars::new();
            let result = match job.fill_template(&mut registry, &host) {
                Ok(command) => run_on_host(transport.as_ref(), &host, &command).await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => tracing::debug!(host = %host, "Command succeeded"),
                Err(e) => tracing::debug!(host = %host, error = %e, "Command failed"),
            }
            let _ = done_tx
                .send_async(DispatchOutcome {
                    host,
                    error: result.err(),
                })
                .await;
        }));
    }
    drop(done_tx);

    // Join barrier: one outcome per host. The channel only disconnects early if a task died.
    let mut outcomes = Vec::with_capacity(num_hosts);
    while outcomes.len() < num_hosts {
        match done_rx.recv_async().await {
            Ok(outcome) => outcomes.push(outcome),
            Err(_) => break,
        }
    }

    // Every task has either reported or died by now.
    for (host, joined) in zip(hosts, join_all(tasks).await) {
        if let Err(e) = joined {
            tracing::error!(host = %host, error = %e, "Dispatch task died");
            outcomes.push(DispatchOutcome {
                host: host.clone(),
                error: Some(DistError::TaskFailed(host.clone(), e.to_string())),
            });
        }
    }

    DispatchReport { outcomes }
}
