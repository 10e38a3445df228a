use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use clap::Parser;
use handlebars::Handlebars;
use tracing_subscriber::EnvFilter;

use distributed_dev::config::{Config, ConfigAction, Mode};
use distributed_dev::error::{DistError, Result};
use distributed_dev::groups::{config_path, resolve_targets, GroupConfig, DEFAULT_GROUP};
use distributed_dev::host::{default_ssh_config_path, parse_ssh_config_file};
use distributed_dev::job::Job;
use distributed_dev::load::Sampler;
use distributed_dev::reporter::{ConsoleReporter, Reporter};
use distributed_dev::scheduler::{scan, select_best};
use distributed_dev::session::{SshTransport, Transport};
use distributed_dev::{dispatch, sync};

async fn run_status(cli: &Config, transport: &dyn Transport, reporter: &dyn Reporter) -> Result<()> {
    reporter.start("Checking hosts");
    let hosts = parse_ssh_config_file(&default_ssh_config_path()?)?;
    let sampler = Sampler::new(transport, cli.sampling_options());

    println!("{:<24}{:<12}{}", "HOST", "STATUS", "ADDRESS");
    for host in hosts {
        let status = if sampler.probe(&host.alias, sampler.options().probe_timeout).await {
            "✓ online"
        } else {
            "✗ offline"
        };
        println!("{:<24}{:<12}{}", host.alias, status, host.hostname);
    }
    Ok(())
}

async fn run_load(cli: &Config, transport: &dyn Transport, reporter: &dyn Reporter) -> Result<()> {
    let hosts = resolve_targets(cli.host.as_deref(), &cli.group)?;
    let sampler = Sampler::new(transport, cli.sampling_options());

    reporter.start(&format!("Checking {} hosts", hosts.len()));
    println!(
        "{:<24}{:>8}{:>6}{:>7}{:>7}{:>9}",
        "HOST", "LOAD", "CPUS", "CPU%", "MEM%", "SCORE"
    );
    scan(&sampler, &hosts, |sample, is_best| {
        if !sample.reachable {
            println!(
                "{:<24}{:>8}{:>6}{:>7}{:>7}{:>9}",
                sample.host, "-", "-", "-", "-", "-"
            );
            return;
        }
        println!(
            "{:<24}{:>8.2}{:>6}{:>7}{:>7}{:>9.2}{}",
            sample.host,
            sample.load_average,
            sample.cpu_count,
            format!("{}%", sample.cpu_percent),
            format!("{}%", sample.memory_percent),
            sample.score,
            if is_best { " ←" } else { "" }
        );
    })
    .await;
    Ok(())
}

async fn run_command(
    cli: &Config,
    transport: Arc<dyn Transport>,
    reporter: Arc<dyn Reporter>,
    job: Job,
    all: bool,
) -> Result<()> {
    let hosts = resolve_targets(cli.host.as_deref(), &cli.group)?;

    if all {
        reporter.info(&format!("Running on all hosts: {}", hosts.join(", ")));
        let report = dispatch::run_on_all(transport, &hosts, &job, Arc::clone(&reporter)).await;
        for outcome in report.failures() {
            if let Some(error) = &outcome.error {
                reporter.error(&format!("{}: {}", outcome.host, error));
            }
        }
        return report.into_result();
    }

    reporter.start("Finding best host");
    let best = {
        let sampler = Sampler::new(transport.as_ref(), cli.sampling_options());
        select_best(&sampler, &hosts).await?
    };
    reporter.info(&format!("Running on {} (score: {:.2})", best.host, best.score));
    let command = job.fill_template(&mut Handlebars::new(), &best.host)?;
    dispatch::run_on_host(transport.as_ref(), &best.host, &command).await
}

fn run_tmux(host: &str, reporter: &dyn Reporter) -> Result<()> {
    reporter.info("Syncing current directory");
    sync::push(Path::new("."), &[host.to_string()], false, reporter)?;
    reporter.success("Sync complete");

    let cwd = sync::absolute(Path::new("."))?;
    let home = dirs::home_dir().ok_or(DistError::NoHomeDir)?;
    let remote = sync::remote_path(&cwd, &home);

    reporter.info(&format!("Connecting to {}", host));
    let tmux = format!(
        "cd {} && (TERM=xterm-256color tmux attach-session -t dev 2>/dev/null || TERM=xterm-256color tmux new-session -s dev)",
        remote
    );
    // openssh cannot allocate a terminal, which tmux needs.
    let status = Command::new("ssh").arg("-t").arg(host).arg(tmux).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(DistError::CommandFailed {
            host: host.to_string(),
            status,
        })
    }
}

fn run_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let hosts = parse_ssh_config_file(&default_ssh_config_path()?)?;
            let mut config = GroupConfig::default();
            for host in &hosts {
                config.add_to_group(DEFAULT_GROUP, &host.alias);
            }
            config.save()?;
            println!("✓ Configuration created at {}", config_path()?.display());
            println!("✓ Added {} hosts to '{}' group", hosts.len(), DEFAULT_GROUP);
        }
        ConfigAction::Show => {
            let config = GroupConfig::load()?;
            println!("Groups:");
            for (group, hosts) in &config.groups {
                println!("  {}: {}", group, hosts.join(", "));
            }
        }
    }
    Ok(())
}

async fn run(cli: Config) -> Result<()> {
    let transport: Arc<dyn Transport> = Arc::new(SshTransport::new());
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter);

    match &cli.mode {
        Mode::Status => run_status(&cli, transport.as_ref(), reporter.as_ref()).await,
        Mode::Load => run_load(&cli, transport.as_ref(), reporter.as_ref()).await,
        Mode::Sync { path, dry_run } => {
            let hosts = resolve_targets(cli.host.as_deref(), &cli.group)?;
            if *dry_run {
                reporter.info("Dry run - no files will be transferred");
            }
            sync::push(Path::new(path), &hosts, *dry_run, reporter.as_ref())?;
            reporter.success("Sync complete");
            Ok(())
        }
        Mode::Pull {
            host,
            remote,
            local,
        } => {
            sync::pull(host, remote, Path::new(local), reporter.as_ref())?;
            reporter.success("Pull complete");
            Ok(())
        }
        Mode::Run {
            all,
            template,
            command,
        } => {
            let job = Job::from_words(command).templated(*template);
            run_command(&cli, transport, reporter, job, *all).await
        }
        Mode::Tmux { host } => run_tmux(host, reporter.as_ref()),
        Mode::Config(action) => run_config(action),
    }
}

#[tokio::main]
async fn main() {
    let cli = Config::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
