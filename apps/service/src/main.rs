mod http;
mod sinks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;

use sonda::{FileStore, MemoryStore, Orchestrator, Probes, Scheduler, Store};

#[derive(Parser, Debug)]
#[command(name = "sonda-service", about = "Endpoint monitoring daemon", version)]
struct Flags {
    /// Check list to load at startup and persist admin changes to
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the admin http server listens on
    #[arg(long, default_value = "127.0.0.1:6060")]
    listen: String,

    /// User agent sent by http probes
    #[arg(long, default_value = concat!("sonda/", env!("CARGO_PKG_VERSION")))]
    user_agent: String,

    /// Probe timeout
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Backends to enable, comma separated: stdout, statsd, librato, syslog
    #[arg(long, default_value = "stdout")]
    backends: String,

    /// Alerters to enable, comma separated: smtp, pagerduty
    #[arg(long, default_value = "")]
    alerts: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let flags = Flags::parse();

    let backends = Arc::new(sinks::backend_pool(&flags.backends).await?);
    let alerters = Arc::new(sinks::alerter_pool(&flags.alerts)?);
    info!(
        backends = backends.len(),
        alerters = alerters.len(),
        "sinks ready"
    );

    let store: Arc<dyn Store> = match &flags.config {
        Some(path) => Arc::new(
            FileStore::load(path)
                .await
                .with_context(|| format!("loading checks from {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let (scheduler, due) = Scheduler::new();
    let scheduler = Arc::new(scheduler);
    store.schedule_all(&scheduler).await?;
    info!(checks = scheduler.len(), "checks scheduled");

    let probes = Arc::new(Probes::new(&flags.user_agent, flags.timeout)?);
    let orchestrator = Orchestrator::new(probes, backends.clone(), alerters);
    tokio::spawn(orchestrator.run(due));

    let server = http::serve(&flags.listen, store.clone(), scheduler.clone())?;
    info!(listen = %flags.listen, "admin api listening");
    tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("shutdown signal received, draining");
    scheduler.stop_all();
    backends.close().await;

    Ok(())
}
