#![forbid(unsafe_code)]

use bodega_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use bodega_lib::{
    load_from_path, AdmissionPipeline, DemoCommerceHandler, InMemoryTenantDirectory,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bodega conversational-commerce admission gate")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/bodega.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging.level, cfg.logging.show_target) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }
    info!(listen = %cfg.listen, "configuration loaded");

    let (metrics, registry) = match init_metrics() {
        Ok(pair) => pair,
        Err(err) => {
            error!(%err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let ready = Arc::new(AtomicBool::new(false));
    let shutdown = CancellationToken::new();

    if let Some(port) = cfg.telemetry.metrics_port {
        let ready = ready.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = start_observability_server(port, registry, ready, token).await {
                error!(%err, "observability server exited with error");
            }
        });
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                }
                signal_token.cancel();
            }
            _ => warn!("failed to install signal handlers"),
        }
    });

    let pipeline = Arc::new(AdmissionPipeline::new(&cfg).with_metrics(metrics));
    let handler = Arc::new(DemoCommerceHandler::new());
    let tenants = Arc::new(InMemoryTenantDirectory::new());

    if let Err(err) = bodega_lib::run(cfg, pipeline, handler, tenants, ready, shutdown).await {
        error!(%err, "chat service exited with error");
        std::process::exit(1);
    }
}
