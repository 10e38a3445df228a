//! Host reachability probing and load sampling.
//!
//! A host is first probed with a no-op command under a short timeout. Reachable hosts then run
//! [`LOAD_SCRIPT`], which prints one line of five `|`-separated fields:
//! `loadAverage|cpuCount|cpuPercent|memoryPercent|score`. The script hides the difference
//! between Darwin and Linux memory accounting, so nothing here depends on the remote OS.

use std::time::Duration;

use tokio::time;

use crate::error::{DistError, Result};
use crate::session::Transport;

/// Remote inspection routine. Must stay POSIX `sh`.
pub const LOAD_SCRIPT: &str = r#"
load=$(uptime | sed 's/.*load average[s]*: //' | awk '{print $1}' | tr -d ',')
case "$(uname -s)" in
Darwin)
    cpus=$(sysctl -n hw.ncpu)
    mem_total=$(sysctl -n hw.memsize)
    page_size=$(vm_stat | awk '/page size of/ {print $8}')
    pages_wired=$(vm_stat | awk '/Pages wired/ {print $4}' | tr -d '.')
    pages_active=$(vm_stat | awk '/Pages active/ {print $3}' | tr -d '.')
    pages_compressed=$(vm_stat | awk '/occupied by compressor/ {print $5}' | tr -d '.')
    mem_pct=$(( (pages_wired + pages_active + pages_compressed) * page_size * 100 / mem_total ))
    ;;
*)
    cpus=$(nproc)
    mem_pct=$(free | awk '/^Mem/ {printf "%d", $3 * 100 / $2}')
    ;;
esac
cpu_pct=$(awk -v l="$load" -v c="$cpus" 'BEGIN {printf "%.0f", l / c * 100}')
score=$(awk -v p="$cpu_pct" -v m="$mem_pct" 'BEGIN {printf "%.2f", p * 0.7 + m * 0.3}')
echo "$load|$cpus|$cpu_pct|$mem_pct|$score"
"#;

/// Weight of CPU pressure in the load score.
pub const CPU_WEIGHT: f64 = 0.7;
/// Weight of memory pressure in the load score.
pub const MEMORY_WEIGHT: f64 = 0.3;

/// Load average normalized by core count, as a rounded percentage.
///
/// Rounds half away from zero. Overcommitted hosts go above 100.
pub fn cpu_percent(load_average: f64, cpu_count: u32) -> u32 {
    (load_average / cpu_count as f64 * 100.0).round() as u32
}

/// Lower is better.
pub fn score(cpu_percent: u32, memory_percent: u32) -> f64 {
    CPU_WEIGHT * cpu_percent as f64 + MEMORY_WEIGHT * memory_percent as f64
}

/// One load measurement of one host.
///
/// When `reachable` is false the numeric fields are zero and meaningless.
#[derive(Debug, Clone, PartialEq)]
pub struct HostLoadSample {
    pub host: String,
    pub load_average: f64,
    pub cpu_count: u32,
    pub cpu_percent: u32,
    pub memory_percent: u32,
    pub score: f64,
    pub reachable: bool,
}

impl HostLoadSample {
    /// A reachable sample. `cpu_percent` and `score` are derived.
    pub fn measured(host: &str, load_average: f64, cpu_count: u32, memory_percent: u32) -> Self {
        let cpu_percent = cpu_percent(load_average, cpu_count);
        Self {
            host: host.to_string(),
            load_average,
            cpu_count,
            cpu_percent,
            memory_percent,
            score: score(cpu_percent, memory_percent),
            reachable: true,
        }
    }

    pub fn unreachable(host: &str) -> Self {
        Self {
            host: host.to_string(),
            load_average: 0.0,
            cpu_count: 0,
            cpu_percent: 0,
            memory_percent: 0,
            score: 0.0,
            reachable: false,
        }
    }
}

/// Parse the five-field line printed by [`LOAD_SCRIPT`].
///
/// The remote `cpuPercent` and `score` fields must be numeric, but the values kept in the sample
/// are recomputed locally so every host is scored with the same arithmetic.
pub fn parse_sample(host: &str, output: &str) -> Result<HostLoadSample> {
    let line = output.trim();
    let malformed = |reason: String| DistError::MalformedSample {
        host: host.to_string(),
        line: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 5 {
        return Err(malformed(format!("expected 5 fields, got {}", fields.len())));
    }

    let load_average: f64 = fields[0]
        .parse()
        .map_err(|e| malformed(format!("load average {:?}: {}", fields[0], e)))?;
    if !load_average.is_finite() || load_average < 0.0 {
        return Err(malformed(format!("load average {} out of range", load_average)));
    }
    let cpu_count: u32 = fields[1]
        .parse()
        .map_err(|e| malformed(format!("cpu count {:?}: {}", fields[1], e)))?;
    if cpu_count == 0 {
        return Err(malformed("cpu count is zero".to_string()));
    }
    let remote_cpu_percent: u32 = fields[2]
        .parse()
        .map_err(|e| malformed(format!("cpu percent {:?}: {}", fields[2], e)))?;
    let memory_percent: u32 = fields[3]
        .parse()
        .map_err(|e| malformed(format!("memory percent {:?}: {}", fields[3], e)))?;
    let remote_score: f64 = fields[4]
        .parse()
        .map_err(|e| malformed(format!("score {:?}: {}", fields[4], e)))?;

    let sample = HostLoadSample::measured(host, load_average, cpu_count, memory_percent);
    if sample.cpu_percent != remote_cpu_percent || (sample.score - remote_score).abs() > 0.01 {
        tracing::debug!(
            host,
            remote_cpu_percent,
            remote_score,
            cpu_percent = sample.cpu_percent,
            score = sample.score,
            "Remote and local load arithmetic disagree"
        );
    }
    Ok(sample)
}

/// Timeouts used while probing and sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    /// Upper bound on the whole reachability probe.
    pub probe_timeout: Duration,
    /// Connection setup bound for the probe. Never exceeds `probe_timeout`.
    pub connect_timeout: Duration,
    /// Upper bound on the load query. `None` waits as long as the transport does.
    pub load_timeout: Option<Duration>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(2),
            load_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Probes and samples hosts over a [`Transport`].
pub struct Sampler<'a> {
    transport: &'a dyn Transport,
    options: SamplingOptions,
}

impl<'a> Sampler<'a> {
    pub fn new(transport: &'a dyn Transport, options: SamplingOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    /// Whether `host` answers a no-op within `timeout`. Every failure reads as `false`.
    pub async fn probe(&self, host: &str, timeout: Duration) -> bool {
        let connect_timeout = self.options.connect_timeout.min(timeout);
        let noop = self.transport.capture(host, "exit", Some(connect_timeout));
        match time::timeout(timeout, noop).await {
            Ok(Ok(output)) => {
                tracing::debug!(host, status = %output.status, "Probe finished");
                output.status.success()
            }
            Ok(Err(e)) => {
                tracing::debug!(host, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(host, ?timeout, "Probe timed out");
                false
            }
        }
    }

    /// Measure the current load of `host`.
    ///
    /// An unreachable host is not an error; it yields a sample with `reachable == false`.
    /// A failed or malformed load query after a successful probe is an error.
    pub async fn sample(&self, host: &str) -> Result<HostLoadSample> {
        if !self.probe(host, self.options.probe_timeout).await {
            return Ok(HostLoadSample::unreachable(host));
        }

        let connect_timeout = Some(self.options.connect_timeout);
        let query = self.transport.capture(host, LOAD_SCRIPT, connect_timeout);
        let output = match self.options.load_timeout {
            Some(limit) => time::timeout(limit, query)
                .await
                .map_err(|_| DistError::Timeout(limit, format!("load sample from {}", host)))??,
            None => query.await?,
        };
        if !output.status.success() {
            return Err(DistError::CommandFailed {
                host: host.to_string(),
                status: output.status,
            });
        }

        parse_sample(host, &String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_weights() {
        assert_eq!(score(100, 10), 73.0);
        assert_eq!(score(60, 75), 64.5);
        assert_eq!(score(0, 0), 0.0);
    }

    #[test]
    fn test_score_accepts_overload() {
        assert_eq!(score(200, 50), 155.0);
    }

    #[test]
    fn test_score_grid() {
        for cpu in (0..=1000).step_by(7) {
            for mem in 0..=100 {
                let expected = 0.7 * cpu as f64 + 0.3 * mem as f64;
                assert!((score(cpu, mem) - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_cpu_percent() {
        assert_eq!(cpu_percent(3.0, 4), 75);
        assert_eq!(cpu_percent(8.0, 4), 200);
        assert_eq!(cpu_percent(0.0, 4), 0);
    }

    #[test]
    fn test_cpu_percent_rounds_half_away_from_zero() {
        // 1/8 * 100 = 12.5 exactly.
        assert_eq!(cpu_percent(1.0, 8), 13);
        assert_eq!(cpu_percent(0.1, 8), 1);
        assert_eq!(cpu_percent(0.14, 8), 2);
    }

    #[test]
    fn test_parse_sample() {
        let sample = parse_sample("homelab", "3.00|4|75|20|58.50\n").unwrap();
        assert!(sample.reachable);
        assert_eq!(sample.host, "homelab");
        assert_eq!(sample.load_average, 3.0);
        assert_eq!(sample.cpu_count, 4);
        assert_eq!(sample.cpu_percent, 75);
        assert_eq!(sample.memory_percent, 20);
        assert!((sample.score - 58.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_sample_keeps_overload() {
        let sample = parse_sample("busy", "8.00|4|200|50|155.00").unwrap();
        assert_eq!(sample.cpu_percent, 200);
        assert_eq!(sample.score, 155.0);
    }

    #[test]
    fn test_parse_sample_recomputes_score() {
        // Remote score is stale; the local formula wins.
        let sample = parse_sample("h", "3.00|4|75|20|0.00").unwrap();
        assert!((sample.score - 58.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_sample_wrong_field_count() {
        for line in ["", "3.00|4|75|20", "3.00|4|75|20|58.50|1", "ssh: banner"] {
            match parse_sample("h", line) {
                Err(DistError::MalformedSample { host, .. }) => assert_eq!(host, "h"),
                other => panic!("expected malformed sample for {:?}, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_parse_sample_bad_numbers() {
        for line in [
            "abc|4|75|20|58.50",
            "3.00|four|75|20|58.50",
            "3.00|4|75%|20|58.50",
            "3.00|4|75|-1|58.50",
            "3.00|4|75|20|x",
            "3.00|0|75|20|58.50",
            "-1.0|4|0|20|6.00",
            "NaN|4|0|20|6.00",
        ] {
            assert!(
                matches!(
                    parse_sample("h", line),
                    Err(DistError::MalformedSample { .. })
                ),
                "{:?} should be malformed",
                line
            );
        }
    }

    #[test]
    fn test_unreachable_sample() {
        let sample = HostLoadSample::unreachable("down");
        assert!(!sample.reachable);
        assert_eq!(sample.host, "down");
    }

    #[test]
    fn test_default_options() {
        let options = SamplingOptions::default();
        assert_eq!(options.probe_timeout, Duration::from_secs(2));
        assert!(options.connect_timeout <= options.probe_timeout);
        assert!(options.load_timeout.is_some());
    }
}
