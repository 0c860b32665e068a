use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use kubeguard_core::config::KubeguardConfig;
use kubeguard_inventory::{
    HttpClusterClient, InventoryConfig, InventoryReader, MetricsSampler, SamplerHandle,
    SamplerSettings,
};
use kubeguard_scan_engine::{EngineSettings, FeedBackend, ScanEngine};
use kubeguard_server::api::{AppState, router};
use kubeguard_server::cli::ServerCli;
use kubeguard_server::{logging, metrics_server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();

    let mut config = KubeguardConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    // CLI overrides take precedence over file and environment.
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config.validate()?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(config = %cli.config.display(), "kubeguard-server starting");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
        spawn_uptime_gauge();
    }
    if config.server.api_tokens.is_empty() {
        tracing::warn!("no API tokens configured; authentication is disabled");
    }

    // File mode loads the feed snapshot with blocking I/O.
    let feed_config = config.feed.clone();
    let feed = tokio::task::spawn_blocking(move || FeedBackend::from_config(&feed_config))
        .await
        .context("feed loader task failed")?
        .context("failed to initialize vulnerability feed")?;
    tracing::info!(mode = %config.feed.mode, "vulnerability feed ready");

    let inventory_config = InventoryConfig::from_core(&config.cluster);
    let cluster_client =
        HttpClusterClient::new(&inventory_config).context("failed to build cluster client")?;

    let engine = ScanEngine::builder()
        .cluster_client(cluster_client.clone())
        .vuln_feed(feed)
        .settings(EngineSettings::from_core(&config.scan, &config.feed))
        .build()
        .context("failed to build scan engine")?;
    tracing::info!("scan engine initialized");

    let (sampler, sampler_handle) = if config.sampler.enabled {
        let sampler = MetricsSampler::spawn(
            InventoryReader::new(cluster_client),
            SamplerSettings::from_core(&config.sampler),
        );
        let handle = sampler.handle();
        (Some(sampler), handle)
    } else {
        tracing::info!("metrics sampler disabled");
        (None, SamplerHandle::new(config.sampler.window_capacity))
    };

    let state = AppState {
        engine: Arc::new(engine),
        sampler: sampler_handle,
        api_tokens: Arc::new(config.server.api_tokens.clone()),
    };
    let app = router(state);

    let addr = format!("{}:{}", config.server.listen_addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(listen_addr = %addr, "kubeguard-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shutdown signal received");

    if let Some(sampler) = sampler {
        sampler.shutdown().await;
    }
    tracing::info!("kubeguard-server shut down");
    Ok(())
}

fn spawn_uptime_gauge() {
    let started = std::time::Instant::now();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(15));
        loop {
            ticker.tick().await;
            metrics::gauge!(kubeguard_core::metrics::SERVER_UPTIME_SECONDS)
                .set(started.elapsed().as_secs_f64());
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
