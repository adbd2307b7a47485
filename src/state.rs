// Shared per-minute accumulator: sampler appends under the lock, uploader
// takes an atomic snapshot-and-reset at each minute boundary.

use std::sync::Mutex;

use num_traits::ToPrimitive;

/// CPU side of one accumulation window. `last_total`/`last_idle` are raw
/// counters and carry no meaning until `is_first_sample` is false.
#[derive(Debug, Clone)]
pub struct CpuWindow {
    pub last_total: u64,
    pub last_idle: u64,
    pub is_first_sample: bool,
    pub usage_rates: Vec<f64>,
}

impl Default for CpuWindow {
    fn default() -> Self {
        Self {
            last_total: 0,
            last_idle: 0,
            is_first_sample: true,
            usage_rates: Vec::new(),
        }
    }
}

/// Memory side of one accumulation window.
#[derive(Debug, Clone, Default)]
pub struct MemWindow {
    pub total: u64,
    pub used_samples: Vec<u64>,
}

/// Deep copy of one window, taken under the lock immediately before reset.
/// The only form in which window data crosses to the uploader.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub window_start: Option<u64>,
    pub cpu: CpuWindow,
    pub mem: MemWindow,
}

#[derive(Debug, Default)]
struct WindowInner {
    window_start: Option<u64>,
    cpu: CpuWindow,
    mem: MemWindow,
}

/// Mutex-guarded aggregate state. One instance per process, constructed by
/// the supervisor and shared by sampler and uploader. All access locks
/// internally; nothing suspends while the lock is held.
pub struct AggregateState {
    inner: Mutex<WindowInner>,
}

impl Default for AggregateState {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WindowInner::default()),
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, WindowInner>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("aggregate lock poisoned: {}", e))
    }

    /// Records one memory sample. `used == 0` marks an absent sample (probe
    /// failure convention) and leaves the window untouched.
    pub fn record_memory(&self, total: u64, used: u64) -> anyhow::Result<()> {
        if used == 0 {
            return Ok(());
        }
        let mut inner = self.lock()?;
        if inner.window_start.is_none() {
            inner.window_start = Some(unix_now());
        }
        inner.mem.total = total;
        inner.mem.used_samples.push(used);
        Ok(())
    }

    /// Records one CPU counter sample. `total == 0` marks an absent sample.
    /// The first sample of a window seeds the baseline and emits no rate;
    /// each later sample appends the usage rate over the elapsed counters.
    /// A zero total delta (stalled or backwards counter) appends no rate for
    /// that tick; the baseline is still refreshed.
    pub fn record_cpu(&self, total: u64, idle: u64) -> anyhow::Result<()> {
        if total == 0 {
            return Ok(());
        }
        let mut inner = self.lock()?;
        if inner.window_start.is_none() {
            inner.window_start = Some(unix_now());
        }
        if inner.cpu.is_first_sample {
            inner.cpu.last_total = total;
            inner.cpu.last_idle = idle;
            inner.cpu.is_first_sample = false;
            return Ok(());
        }
        let total_delta = total.saturating_sub(inner.cpu.last_total);
        let idle_delta = idle.saturating_sub(inner.cpu.last_idle);
        if total_delta > 0 {
            // Not clamped: an idle delta above the total delta surfaces as a
            // negative rate.
            let rate = (total_delta as f64 - idle_delta as f64) / total_delta as f64 * 100.0;
            inner.cpu.usage_rates.push(rate);
        }
        inner.cpu.last_total = total;
        inner.cpu.last_idle = idle;
        Ok(())
    }

    /// Deep-copies the window and resets it, in one critical section. No
    /// sampler write can land between the copy and the reset.
    pub fn snapshot_and_reset(&self) -> anyhow::Result<WindowSnapshot> {
        let mut inner = self.lock()?;
        let snapshot = WindowSnapshot {
            window_start: inner.window_start,
            cpu: inner.cpu.clone(),
            mem: inner.mem.clone(),
        };
        *inner = WindowInner::default();
        Ok(snapshot)
    }
}

/// Arithmetic mean of a numeric series; an empty series averages to 0.
pub fn average<T: ToPrimitive + Copy>(values: &[T]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().filter_map(|v| v.to_f64()).sum();
    sum / values.len() as f64
}

/// Seconds since the unix epoch; 0 when the system clock reports an error.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "unix_now", "system time error");
            0
        })
}
