#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use illustria_server::{build_router, AppState};
use illustria_snapshot::{
    HttpSource, SnapshotConfig, SnapshotManager, DEFAULT_MIN_SNAPSHOT_BYTES,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("ILLUSTRIA_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("ILLUSTRIA_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let cfg = SnapshotConfig {
        source_url: env::var("ILLUSTRIA_DB_URL")
            .ok()
            .filter(|v| !v.trim().is_empty()),
        snapshot_path: PathBuf::from(
            env::var("ILLUSTRIA_DB_PATH").unwrap_or_else(|_| "illustria.db".to_string()),
        ),
        min_snapshot_bytes: env_u64("ILLUSTRIA_MIN_SNAPSHOT_BYTES", DEFAULT_MIN_SNAPSHOT_BYTES),
        fetch_timeout: env_duration_ms("ILLUSTRIA_FETCH_TIMEOUT_MS", 300_000),
    };
    if cfg.source_url.is_none() {
        warn!("ILLUSTRIA_DB_URL is not set; provisioning will fail until it is configured");
    }

    let source = Arc::new(HttpSource::new(cfg.fetch_timeout));
    let snapshots = SnapshotManager::new(cfg, source);

    // Warm the snapshot in the background so the first query does not
    // pay the download; failures here only log, the next request
    // retries provisioning.
    let warm = snapshots.clone();
    tokio::spawn(async move {
        if let Err(e) = warm.ensure_present().await {
            warn!("startup provisioning failed: {e}");
        }
    });

    let state = AppState::new(snapshots);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("bind failed for {bind_addr}: {e}"))?;
    info!("illustria-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"))
}
