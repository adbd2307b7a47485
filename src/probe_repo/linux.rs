// /proc/stat reading for the aggregate cpu line.

use super::ProbeError;

const PROC_STAT: &str = "/proc/stat";

/// Reads raw (total, idle) jiffies from /proc/stat (Linux).
pub(super) fn read_cpu_times() -> Result<(u64, u64), ProbeError> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string(PROC_STAT)?;
        parse_cpu_times(&content).ok_or(ProbeError::Parse(PROC_STAT))
    }
    #[cfg(not(target_os = "linux"))]
    Err(ProbeError::Unsupported)
}

/// Parses the "cpu " summary line into (total, idle). Total sums the first
/// eight time columns (user, nice, system, idle, iowait, irq, softirq,
/// steal); idle is the fourth column alone.
pub fn parse_cpu_times(content: &str) -> Option<(u64, u64)> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let mut fields = [0u64; 8];
    let mut n = 0;
    for part in line.split_whitespace().skip(1).take(8) {
        fields[n] = part.parse().ok()?;
        n += 1;
    }
    if n < 8 {
        return None;
    }
    Some((fields.iter().sum(), fields[3]))
}
