// Upload loop: detects minute-of-hour boundaries, snapshots-and-resets the
// aggregate window, and pushes one report per minute to the collector. On
// shutdown it drains one final window, then stops the sampler.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::sync::oneshot;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::config::Settings;
use crate::models::{ApiResponse, CPU_MAX_SCALE, UploadPayload};
use crate::probe_repo::ProbeRepo;
use crate::state::{AggregateState, WindowSnapshot, average, unix_now};

/// Fixed boundary-check period.
pub const UPLOAD_TICK_SECS: u64 = 1;

pub fn minute_of_hour(unix_secs: i64) -> i64 {
    (unix_secs / 60) % 60
}

/// Minute-of-hour boundary detector: `check` fires at most once per minute
/// value. Seeded by the supervisor with the process-start minute so the
/// startup minute never uploads.
#[derive(Debug)]
pub struct MinuteGate {
    last: i64,
}

impl MinuteGate {
    pub fn new(now_unix: i64) -> Self {
        Self {
            last: minute_of_hour(now_unix),
        }
    }

    /// Seeds the gate so the next check fires regardless of the clock.
    pub fn armed() -> Self {
        Self { last: -1 }
    }

    pub fn check(&mut self, now_unix: i64) -> bool {
        let minute = minute_of_hour(now_unix);
        if minute == self.last {
            return false;
        }
        self.last = minute;
        true
    }
}

/// Shared state, probes, upload client, and both signal ends for the
/// uploader. The client and buffer are constructed once by the supervisor
/// and reused for every upload.
pub struct UploaderDeps {
    pub state: Arc<AggregateState>,
    pub probes: Arc<ProbeRepo>,
    pub client: reqwest::Client,
    pub settings: Arc<Settings>,
    pub buffer: BytesMut,
    pub gate: MinuteGate,
    pub shutdown_rx: oneshot::Receiver<()>,
    pub stop_tx: oneshot::Sender<()>,
}

pub struct UploaderConfig {
    pub tick_interval_secs: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: UPLOAD_TICK_SECS,
        }
    }
}

pub fn spawn(deps: UploaderDeps, config: UploaderConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(deps, config).await;
    })
}

async fn run(deps: UploaderDeps, config: UploaderConfig) {
    let UploaderDeps {
        state,
        probes,
        client,
        settings,
        mut buffer,
        mut gate,
        mut shutdown_rx,
        stop_tx,
    } = deps;
    let mut tick = interval(Duration::from_secs(config.tick_interval_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut draining = false;

    loop {
        // A pending shutdown signal is observed before the tick; once it has
        // fired, the guard keeps the finished one-shot receiver from being
        // polled again.
        tokio::select! {
            biased;
            _ = &mut shutdown_rx, if !draining => {
                tracing::info!("shutdown signal received; will flush one final window");
                draining = true;
            }
            _ = tick.tick() => {
                if !gate.check(unix_now() as i64) {
                    continue;
                }
                upload_window(&state, &probes, &client, &settings, &mut buffer).await;
                if draining {
                    tracing::info!("final window flushed; stopping sampler");
                    let _ = stop_tx.send(());
                    break;
                }
            }
        }
    }
}

/// One upload attempt. Failures are logged and the window's data is dropped;
/// nothing is re-queued. The snapshot is taken (and the live window reset)
/// before any network traffic, so a hung upload cannot corrupt state.
pub async fn upload_window(
    state: &AggregateState,
    probes: &ProbeRepo,
    client: &reqwest::Client,
    settings: &Settings,
    buffer: &mut BytesMut,
) {
    let snapshot = match state.snapshot_and_reset() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, operation = "snapshot_and_reset", "aggregate snapshot failed");
            return;
        }
    };
    if snapshot.cpu.usage_rates.is_empty() {
        tracing::info!("no samples this window; skipping upload");
        return;
    }
    let (disk_total, disk_used) = match probes.read_disk().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, operation = "read_disk", "disk probe failed; window dropped");
            return;
        }
    };
    let payload = build_payload(&snapshot, &settings.server_name, disk_total, disk_used);
    match post_payload(client, settings, buffer, &payload).await {
        Ok(()) => {
            tracing::info!(endpoint = %settings.endpoint, ts = payload.ts, "metrics sent");
        }
        Err(e) => {
            tracing::warn!(error = %e, operation = "upload", "upload failed; window dropped");
        }
    }
}

pub fn build_payload(
    snapshot: &WindowSnapshot,
    server_name: &str,
    disk_total: u64,
    disk_used: u64,
) -> UploadPayload {
    UploadPayload {
        ts: snapshot.window_start.unwrap_or(0),
        server: server_name.to_string(),
        cpu_c: average(&snapshot.cpu.usage_rates) * 100.0,
        cpu_m: CPU_MAX_SCALE,
        mem_c: average(&snapshot.mem.used_samples),
        mem_m: snapshot.mem.total,
        disk_c: disk_used,
        disk_m: disk_total,
    }
}

/// Serializes the payload into the reusable buffer (cleared first, never
/// appended to) and POSTs it. HTTP status is not consulted; the reply body's
/// `code` decides success.
pub async fn post_payload(
    client: &reqwest::Client,
    settings: &Settings,
    buffer: &mut BytesMut,
    payload: &UploadPayload,
) -> anyhow::Result<()> {
    buffer.clear();
    serde_json::to_writer((&mut *buffer).writer(), payload)?;
    let body = buffer.split().freeze();
    let resp = client
        .post(&settings.endpoint)
        .header("APP-KEY", settings.app_token.as_str())
        .header("APP-TOKEN", settings.app_secret.as_str())
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?;
    let reply: ApiResponse = resp.json().await?;
    anyhow::ensure!(
        reply.code == 0,
        "collector rejected report: code={} message={}",
        reply.code,
        reply.message.as_deref().unwrap_or("")
    );
    Ok(())
}
