use std::sync::Arc;

use anyhow::Result;
use bytes::BytesMut;
use server_exporter::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(config::Settings::load()?);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let _lock = singleton::SingletonLock::acquire(singleton::LOCK_FILE)?;

    tracing::info!(
        version = version::VERSION,
        server = %settings.server_name,
        endpoint = %settings.endpoint,
        "server exporter started"
    );

    // The only place dependencies are constructed; every component gets its
    // state, client, buffer, and signal ends threaded in from here.
    let state = Arc::new(state::AggregateState::new());
    let probes = Arc::new(probe_repo::ProbeRepo::new());
    let client = reqwest::Client::new();
    let buffer = BytesMut::new();
    let gate = uploader::MinuteGate::new(state::unix_now() as i64);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();

    let shutdown_handle = shutdown::spawn(shutdown_tx);
    let sampler_handle = sampler::spawn(
        sampler::SamplerDeps {
            probes: probes.clone(),
            state: state.clone(),
            stop_rx,
        },
        sampler::SamplerConfig::default(),
    );
    let uploader_handle = uploader::spawn(
        uploader::UploaderDeps {
            state,
            probes,
            client,
            settings: settings.clone(),
            buffer,
            gate,
            shutdown_rx,
            stop_tx,
        },
        uploader::UploaderConfig::default(),
    );

    let (shutdown_res, sampler_res, uploader_res) =
        tokio::join!(shutdown_handle, sampler_handle, uploader_handle);
    shutdown_res?;
    sampler_res?;
    uploader_res?;

    tracing::info!("server exporter exited");
    Ok(())
}
