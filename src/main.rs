//! REST bridge (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────────▶ http server ──▶ gate ──────────────▶ forwarder ──▶ upstream
//!                        (axum, TLS)     framing                publish       (pub/sub
//!                                        signature              call           router)
//!                                        ip / tls policy
//!                                        json decode
//!     Client Response
//!     ◀───────────────── response ◀──── outcome (denied / completed / pending)
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;

use rest_bridge::config::{load_config, BridgeConfig};
use rest_bridge::lifecycle::{signals, Shutdown};
use rest_bridge::net::load_tls_config;
use rest_bridge::observability::{logging, metrics};
use rest_bridge::BridgeServer;

#[derive(Parser)]
#[command(name = "rest-bridge")]
#[command(about = "Authenticating REST gateway in front of a pub/sub router", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/bridge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(Default::default());
            tracing::error!(path = %args.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    logging::init_logging(config.observability.log_format);

    tracing::info!("rest-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        tls = config.listener.tls.is_some(),
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
    signals::spawn_signal_handler(shutdown.clone());

    serve(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn serve(config: BridgeConfig, shutdown: &Shutdown) -> Result<(), Box<dyn std::error::Error>> {
    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = BridgeServer::new(config)?;

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }
    Ok(())
}
