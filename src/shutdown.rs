// Nightly shutdown coordinator: fires the one-shot shutdown signal at the
// next local midnight, then exits. Sole producer of the shutdown signal.

use std::str::FromStr;

use chrono::Local;
use tokio::sync::oneshot;

/// Local-time schedule for the nightly shutdown (sec min hour dom month dow).
const SHUTDOWN_SCHEDULE: &str = "0 0 0 * * *";

/// Next occurrence of the shutdown schedule in local time, as the fire time
/// and the delay from now. None when the schedule fails to parse.
pub fn next_shutdown_fire() -> Option<(chrono::DateTime<Local>, std::time::Duration)> {
    let schedule = cron::Schedule::from_str(SHUTDOWN_SCHEDULE).ok()?;
    let now = Local::now();
    let next = schedule.after(&now).next()?;
    let delay = (next - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(1));
    Some((next, delay))
}

pub fn spawn(shutdown_tx: oneshot::Sender<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Some((due, delay)) = next_shutdown_fire() else {
            tracing::warn!(
                schedule = SHUTDOWN_SCHEDULE,
                "invalid shutdown schedule; nightly shutdown disabled"
            );
            return;
        };
        tracing::info!(
            due = %due.format("%Y-%m-%d %H:%M:%S"),
            "exporter will shut down at local midnight"
        );
        tokio::time::sleep(delay).await;
        tracing::info!("shutdown time reached; uploading the last window and exiting");
        let _ = shutdown_tx.send(());
    })
}
