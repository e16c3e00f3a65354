use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use kube_pvc_usage::config::{load_config, load_static_labels, load_token};
use kube_pvc_usage::kubernetes::ApiClient;
use kube_pvc_usage::metrics::MetricSink;
use kube_pvc_usage::{scheduler, server, StatsCollector};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("starting kube-pvc-usage {}", env!("CARGO_PKG_VERSION"));

    let cfg = load_config()?;
    info!(
        "scrape every {:?}, reset every {:?}, debounce {:?}",
        cfg.schedule.scrape_interval, cfg.schedule.reset_interval, cfg.schedule.debounce_delay
    );

    // Without credentials there is nothing useful to do
    let token = load_token(&cfg.secrets_path).map_err(|e| {
        error!("{:#}", e);
        e
    })?;

    let client = ApiClient::builder(cfg.api_base_url(), token)
        .timeout(cfg.api_timeout)
        .ca_path(&cfg.secrets_path)
        .build()
        .context("failed to configure API client")?;
    info!("client configured for {}", cfg.api_base_url());

    let labels = load_static_labels(&cfg.annotations_path, &cfg.annotations_prefix);
    let sink = Arc::new(MetricSink::new(labels).context("failed to register gauges")?);

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let schedulers = scheduler::spawn(StatsCollector::new(client), sink.clone(), &cfg.schedule, cancel.clone());

    let served = server::serve(&cfg.listen_addr(), sink, cancel.clone()).await;
    if let Err(e) = &served {
        error!("{:#}", e);
    }

    cancel.cancel();
    schedulers.join().await;
    info!("shutdown complete");
    served
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn watch_signals(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received interrupt"),
                    _ = term.recv() => info!("received terminate"),
                }
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("received interrupt");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt");
    }

    cancel.cancel();
}
