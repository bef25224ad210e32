//! capbridge server binary.
//!
//! Starts the framed TCP bridge and, unless disabled, the HTTP surface. A
//! background thread stands in for the host application's main loop: it
//! advances the host tick and drains the main-thread queue every
//! `tick_interval_ms`.
//!
//! # Environment Variables
//!
//! - `CAPBRIDGE_CONFIG` — Path to a YAML config file
//! - `CAPBRIDGE_TCP_PORT` — TCP bridge port (default: 6400)
//! - `CAPBRIDGE_HTTP_PORT` — HTTP port (default: 8090)
//! - `CAPBRIDGE_HTTP_ENABLED` — Serve HTTP (default: true)
//! - `CAPBRIDGE_MAIN_THREAD_TIMEOUT` — Seconds to wait for main-thread work (default: 10)
//! - `RUST_LOG` — Tracing filter (default: "info,capbridge=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use capbridge::builtin::{self, HostState};
use capbridge::capabilities::{Catalog, Manifest};
use capbridge::config::BridgeConfig;
use capbridge::dispatch::{Dispatcher, MainThreadQueue};
use capbridge::server::{app_router, AppState};
use capbridge::transport::{FrameCodec, TcpBridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,capbridge=debug".into()),
        )
        .init();

    let config = BridgeConfig::load()?;
    tracing::debug!("Configuration: {:?}", config);

    let host = Arc::new(HostState::new());
    host.record(format!("capbridge {} starting", capbridge::VERSION));

    let manifest = Manifest::new().group(builtin::group(Arc::clone(&host)));
    let catalog = Arc::new(Catalog::bootstrap(&manifest));
    let main_thread = Arc::new(MainThreadQueue::new());
    let dispatcher = Dispatcher::new(Arc::clone(&catalog), Arc::clone(&main_thread))
        .with_timeout(config.main_thread_timeout());

    // Simulated host main loop.
    let running = Arc::new(AtomicBool::new(true));
    let main_loop = {
        let running = Arc::clone(&running);
        let host = Arc::clone(&host);
        let queue = Arc::clone(&main_thread);
        let interval = config.tick_interval();
        std::thread::Builder::new()
            .name("host-main".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    host.advance_tick();
                    let ran = queue.pump();
                    if ran > 0 {
                        tracing::trace!("Main loop ran {} queued jobs", ran);
                    }
                    std::thread::sleep(interval);
                }
            })
            .context("failed to spawn host main loop")?
    };

    let bridge = TcpBridge::new(dispatcher.clone())
        .with_codec(FrameCodec::new(config.max_frame_bytes))
        .with_handshake(config.handshake_request.clone(), config.handshake_response.clone())
        .with_handshake_timeout(config.handshake_timeout());

    let tcp_listener = tokio::net::TcpListener::bind(config.tcp_addr())
        .await
        .with_context(|| format!("failed to bind TCP bridge on {}", config.tcp_addr()))?;
    tracing::info!("TCP bridge listening on {}", config.tcp_addr());
    tracing::info!(
        "Catalog: {} tools, {} resources",
        catalog.tool_names().len(),
        catalog.resource_names().len()
    );

    let http = if config.http.enabled {
        let listener = tokio::net::TcpListener::bind(config.http_addr())
            .await
            .with_context(|| format!("failed to bind HTTP server on {}", config.http_addr()))?;
        tracing::info!("HTTP server listening on {}", config.http_addr());
        tracing::info!("Endpoints:");
        tracing::info!("  GET  /health  — liveness probe");
        tracing::info!("  GET  /schema  — capability schema");
        tracing::info!("  POST /invoke  — run a command");
        Some((listener, app_router(AppState::new(dispatcher))))
    } else {
        None
    };

    let http_task = async move {
        match http {
            Some((listener, app)) => axum::serve(listener, app).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = bridge.serve(tcp_listener) => result.context("TCP bridge failed")?,
        result = http_task => result.context("HTTP server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
    }

    running.store(false, Ordering::Relaxed);
    if main_loop.join().is_err() {
        tracing::error!("Host main loop panicked");
    }
    tracing::info!("capbridge stopped");
    Ok(())
}
