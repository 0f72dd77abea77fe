// soma_camera - camera capture gateway
// Serves still captures from the attached camera module over HTTP

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use soma_camera::config::{GatewayConfig, DEFAULT_PORT};
use soma_camera::{http, CaptureService};

#[derive(Parser)]
#[command(name = "soma_camera", version, about = "SOMA Camera Gateway - still capture over HTTP")]
struct Args {
    /// Address to bind to (all interfaces by default, so the LAN can reach it)
    #[arg(long, env = "SOMA_CAMERA_BIND", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "SOMA_CAMERA_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Capture utility name or path
    #[arg(long, env = "SOMA_CAMERA_UTILITY", default_value = "libcamera-jpeg")]
    utility: String,

    /// JPEG quality
    #[arg(long, env = "SOMA_CAMERA_QUALITY", default_value_t = 95, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Hard limit for one capture, in seconds
    #[arg(long, env = "SOMA_CAMERA_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Directory for in-flight capture artifacts
    #[arg(long, env = "SOMA_CAMERA_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// Delay before a delivered artifact is removed, in milliseconds
    #[arg(long, env = "SOMA_CAMERA_CLEANUP_GRACE_MS", default_value_t = 500)]
    cleanup_grace_ms: u64,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            utility: self.utility.clone(),
            quality: self.quality,
            timeout: Duration::from_secs(self.timeout_secs),
            artifact_dir: self
                .artifact_dir
                .clone()
                .unwrap_or_else(GatewayConfig::default_artifact_dir),
            cleanup_grace: Duration::from_millis(self.cleanup_grace_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args = Args::parse();
    let config = args.gateway_config();

    info!("📷 Starting SOMA Camera Gateway");
    info!("   Utility: {}", config.utility);
    info!("   Artifacts: {}", config.artifact_dir.display());

    let (service, worker) = CaptureService::from_config(config)
        .context("Failed to initialize capture service")?;
    let service = Arc::new(service);

    if service.is_available() {
        info!("   ✓ Capture utility found");
    } else {
        warn!("   ✗ Capture utility missing, /capture will answer 500");
    }

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let cleanup = tokio::spawn(worker.run(async {
        let _ = stop_rx.await;
    }));

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("   ✓ Listening on http://{}", addr);
    info!("   Capture endpoint: http://{}/capture", addr);

    axum::serve(listener, http::router(Arc::clone(&service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Remove whatever is still queued before exiting
    let _ = stop_tx.send(());
    cleanup.await.context("Cleanup worker panicked")?;

    info!("Capture gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
