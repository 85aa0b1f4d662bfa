// SPDX-License-Identifier: AGPL-3.0-or-later

//! The cloudlet prober: a line-oriented TCP RTT probe run concurrently
//! against every candidate cloudlet, under a single shared wall-clock
//! deadline (spec §4.6).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;

/// The fixed one-second wall-clock probing budget.
pub const PROBE_BUDGET: Duration = Duration::from_secs(1);

/// The number of RTT samples collected per supported cloudlet.
pub const SAMPLE_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    RttSampling,
    Done,
    Failed,
}

/// The state of one cloudlet's probe, terminal once `samples.len() ==
/// SAMPLE_COUNT` or the connection closes.
#[derive(Debug, Clone)]
pub struct Probe {
    pub cloudlet_id: String,
    pub endpoint: String,
    pub samples: Vec<Duration>,
    pub phase: Phase,
}

impl Probe {
    /// Mean sample RTT, or `None` if no sample was ever collected
    /// (reported as `-1` at the boundary, per spec §8.6).
    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }
}

async fn probe_one(cloudlet_id: String, probe_endpoint: String, app_id: String, deadline: Instant) -> Probe {
    let mut probe = Probe {
        cloudlet_id: cloudlet_id.clone(),
        endpoint: probe_endpoint.clone(),
        samples: Vec::with_capacity(SAMPLE_COUNT),
        phase: Phase::Handshake,
    };

    let endpoint = match Endpoint::parse(&probe_endpoint) {
        Ok(e) => e,
        Err(err) => {
            warn!("cloudlet {cloudlet_id} has unparseable probe endpoint {probe_endpoint:?}: {err}");
            probe.phase = Phase::Failed;
            return probe;
        },
    };
    let Some(addr) = endpoint.first_address() else {
        probe.phase = Phase::Failed;
        return probe;
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    let stream = match tokio::time::timeout(remaining, TcpStream::connect(addr)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            debug!("cloudlet {cloudlet_id} probe connect failed: {e}");
            probe.phase = Phase::Failed;
            return probe;
        },
        Err(_) => {
            probe.phase = Phase::Failed;
            return probe;
        },
    };

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    if Instant::now() >= deadline {
        probe.phase = Phase::Failed;
        return probe;
    }

    if let Err(e) = write_half
        .write_all(format!("ENS-PROBE {app_id}\r\n").as_bytes())
        .await
    {
        debug!("cloudlet {cloudlet_id} probe send failed: {e}");
        probe.phase = Phase::Failed;
        return probe;
    }

    line.clear();
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, reader.read_line(&mut line)).await {
        Ok(Ok(n)) if n > 0 => {},
        _ => {
            probe.phase = Phase::Failed;
            return probe;
        },
    }

    if line.split_whitespace().next() != Some("ENS-PROBE-OK") {
        debug!("cloudlet {cloudlet_id} does not support app {app_id}: {line:?}");
        probe.phase = Phase::Failed;
        return probe;
    }

    probe.phase = Phase::RttSampling;

    for _ in 0..SAMPLE_COUNT {
        if Instant::now() >= deadline {
            break;
        }

        let start = Instant::now();
        if let Err(e) = write_half
            .write_all(format!("ENS-RTT {app_id}\r\n").as_bytes())
            .await
        {
            debug!("cloudlet {cloudlet_id} RTT send failed: {e}");
            break;
        }

        line.clear();
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, reader.read_line(&mut line)).await {
            Ok(Ok(n)) if n > 0 => {
                probe.samples.push(start.elapsed());
            },
            _ => break,
        }
    }

    probe.phase = if probe.samples.len() == SAMPLE_COUNT {
        Phase::Done
    } else if probe.samples.is_empty() {
        Phase::Failed
    } else {
        Phase::Done
    };

    probe
}

/// Probes every candidate concurrently and picks the one with the
/// lowest mean RTT. Ties are broken by `HashMap` iteration order, which
/// is an approximation of "first-discovered" — `HashMap` does not
/// preserve insertion order, so this is not a guarantee, just the
/// cheapest tie-break available from the type discovery hands back.
/// Returns `None` if not a single probe collected a sample.
pub async fn select_cloudlet(
    candidates: &HashMap<String, String>,
    app_id: &str,
) -> Option<(String, Probe)> {
    let deadline = Instant::now() + PROBE_BUDGET;

    let handles: Vec<_> = candidates
        .iter()
        .map(|(id, endpoint)| {
            let id = id.clone();
            let endpoint = endpoint.clone();
            let app_id = app_id.to_string();
            tokio::spawn(async move { probe_one(id, endpoint, app_id, deadline).await })
        })
        .collect();

    let mut best: Option<(String, Probe, Duration)> = None;
    for handle in handles {
        let Ok(probe) = handle.await else { continue };
        let Some(mean) = probe.mean() else { continue };
        match &best {
            Some((_, _, best_mean)) if *best_mean <= mean => {},
            _ => best = Some((probe.cloudlet_id.clone(), probe, mean)),
        }
    }

    best.map(|(id, probe, _)| (id, probe))
}
