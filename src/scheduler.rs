//! Best-host selection.
//!
//! Hosts are sampled one after another in the order given. The running minimum is only replaced
//! by a strictly lower score, so among equal scores the host listed first wins.

use crate::error::{DistError, Result};
use crate::load::{HostLoadSample, Sampler};

/// Whether `candidate` should replace `current` as the best sample so far.
fn beats(candidate: &HostLoadSample, current: Option<&HostLoadSample>) -> bool {
    candidate.reachable && current.map_or(true, |best| candidate.score < best.score)
}

/// The reachable sample with the lowest score, earliest on ties.
pub fn pick_best<I>(samples: I) -> Option<HostLoadSample>
where
    I: IntoIterator<Item = HostLoadSample>,
{
    let mut best: Option<HostLoadSample> = None;
    for sample in samples {
        if beats(&sample, best.as_ref()) {
            best = Some(sample);
        }
    }
    best
}

/// Sample every host in order and return the best one.
///
/// `on_sample` sees each sample as it arrives, along with whether it is the new best. Sampling
/// errors are logged and the host is treated as unreachable; the scan always runs to the end.
pub async fn scan<F>(
    sampler: &Sampler<'_>,
    hosts: &[String],
    mut on_sample: F,
) -> Option<HostLoadSample>
where
    F: FnMut(&HostLoadSample, bool),
{
    let mut best: Option<HostLoadSample> = None;
    for host in hosts {
        let sample = match sampler.sample(host).await {
            Ok(sample) => sample,
            Err(e @ DistError::MalformedSample { .. }) => {
                tracing::warn!(host = %host, error = %e, "Discarding malformed load sample");
                HostLoadSample::unreachable(host)
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "Failed to sample host load");
                HostLoadSample::unreachable(host)
            }
        };
        if !sample.reachable {
            tracing::info!(host = %host, "Host unreachable, skipping");
        }
        let is_best = beats(&sample, best.as_ref());
        on_sample(&sample, is_best);
        if is_best {
            best = Some(sample);
        }
    }
    best
}

/// Pick the least loaded of `hosts`.
///
/// `hosts` must not be empty; resolving an empty candidate list is the caller's error.
pub async fn select_best(sampler: &Sampler<'_>, hosts: &[String]) -> Result<HostLoadSample> {
    scan(sampler, hosts, |_, _| {})
        .await
        .ok_or(DistError::NoReachableHost)
}
