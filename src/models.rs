// Wire types for the collector endpoint.

use serde::{Deserialize, Serialize};

/// Fixed denominator for `cpu_c`; the collector normalizes against it.
pub const CPU_MAX_SCALE: u32 = 10_000;

/// One per-minute report. `cpu_c` is the window's average usage rate scaled
/// by 100 (so 100% reads as 10000 against `cpu_m`); `mem_c` is the average
/// used bytes, left absolute for the collector to normalize against `mem_m`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadPayload {
    pub ts: u64,
    pub server: String,
    pub cpu_c: f64,
    pub cpu_m: u32,
    pub mem_c: f64,
    pub mem_m: u64,
    pub disk_c: u64,
    pub disk_m: u64,
}

/// Collector reply. Any non-zero `code` is an application-level failure
/// regardless of HTTP status.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}
