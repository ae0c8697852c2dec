//! Request governor gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ http server ─▶ Governor::call                  │
//!                           │                    │ tracker / emergency stop    │
//!                           │                    │ circuit breaker             │
//!                           │                    │ cache | debounce | direct   │
//!                           │                    │ rate-limit backoff          │
//!                           │                    ▼                             │
//!     Client Response       │               HttpTransport ─────────────────────┼──▶ Upstream
//!     ◀─────────────────────┼──────────────────────────────────────────────────┤
//!                           │  admin API (status, stats, enable/disable,       │
//!                           │  cache clear, circuit reset, reload)             │
//!                           └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use request_governor::admin::{setup_admin_router, AdminState};
use request_governor::config::{load_config, ServiceConfig};
use request_governor::lifecycle::{wait_for_signal, Shutdown};
use request_governor::observability::{logging, metrics};
use request_governor::{Governor, HttpServer, HttpTransport};

#[derive(Parser)]
#[command(name = "request-governor", version)]
#[command(about = "HTTP gateway that governs calls to a single upstream", long_about = None)]
struct Args {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "request-governor starting"
    );

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let transport = Arc::new(HttpTransport::new(&config.upstream));
    let governor = Governor::new(config.governor.clone(), transport);
    governor.initialize();

    let shutdown = Shutdown::new();

    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState {
            governor: governor.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
            config_path: args.config.clone(),
        });
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, governor.clone());
    let mut gateway = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!(subscribers = shutdown.receiver_count(), "Shutting down");
            shutdown.trigger();
            gateway.await??;
        }
        result = &mut gateway => {
            tracing::error!("Gateway exited unexpectedly");
            shutdown.trigger();
            result??;
        }
    }

    if let Some(admin) = admin {
        admin.await??;
    }
    governor.shutdown();

    tracing::info!("Shutdown complete");
    Ok(())
}
