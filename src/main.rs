//! Apostille site server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net (TCP | TLS)
//!                      → http::server (request id, trace, timeout, body limit)
//!                      → security headers middleware ── fresh nonce ──┐
//!                      → pages | consent form | csp reports | static  │
//!     Client Response                                                 │
//!     ◀────────────── CSP + hardening headers (nonce) ◀───────────────┘
//!
//!     Cross-cutting: config (TOML + validation), observability
//!     (tracing, Prometheus), lifecycle (signals, graceful shutdown)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use apostille_site::config::{load_config, SiteConfig};
use apostille_site::lifecycle::{wait_for_signal, Shutdown};
use apostille_site::net::tls::load_tls_config;
use apostille_site::observability::{logging, metrics};
use apostille_site::SiteServer;

#[derive(Parser)]
#[command(name = "apostille-site")]
#[command(about = "Marketing site server with strict CSP and consent-gated analytics", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when absent.
    #[arg(short, long, env = "SITE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => SiteConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "apostille-site starting");
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        production = config.security.production,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        trigger.trigger();
    });

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = SiteServer::new(config);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, rustls, rx).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, rx).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
