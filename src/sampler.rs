// Sampling loop: reads the memory and CPU probes on a fixed tick and feeds
// the aggregate window. Stops when the uploader closes the stop channel.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::probe_repo::ProbeRepo;
use crate::state::AggregateState;

/// Fixed sampling period.
pub const SAMPLE_INTERVAL_SECS: u64 = 6;

/// Probes, shared state, and stop signal for the sampler.
pub struct SamplerDeps {
    pub probes: Arc<ProbeRepo>,
    pub state: Arc<AggregateState>,
    pub stop_rx: oneshot::Receiver<()>,
}

pub struct SamplerConfig {
    pub sample_interval_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: SAMPLE_INTERVAL_SECS,
        }
    }
}

pub fn spawn(deps: SamplerDeps, config: SamplerConfig) -> tokio::task::JoinHandle<()> {
    let SamplerDeps {
        probes,
        state,
        mut stop_rx,
    } = deps;
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(config.sample_interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    tracing::info!("upload loop stopped; sampler exiting");
                    break;
                }
                _ = tick.tick() => {
                    sample_once(&probes, &state).await;
                }
            }
        }
    })
}

/// One sampling tick. Each probe's failure only skips that metric; a tick is
/// never fatal.
pub async fn sample_once(probes: &ProbeRepo, state: &AggregateState) {
    match probes.read_memory().await {
        Ok((total, used)) => {
            if let Err(e) = state.record_memory(total, used) {
                tracing::warn!(error = %e, operation = "record_memory", "aggregate update failed");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, operation = "read_memory", "memory probe failed");
        }
    }
    match probes.read_cpu_times().await {
        Ok((total, idle)) => {
            if let Err(e) = state.record_cpu(total, idle) {
                tracing::warn!(error = %e, operation = "record_cpu", "aggregate update failed");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, operation = "read_cpu_times", "cpu probe failed");
        }
    }
}
