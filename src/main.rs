//! WebSocket upgrade gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ bearer auth ──▶ upgrade dispatcher
//!                                                   │
//!                     no upgrade intent ◀───────────┤
//!                     (/health, 404)                │ path template match
//!                                                   ▼
//!                                            hybi negotiator ──▶ 101
//!                                                   │
//!                                                   ▼ (spawned completion)
//!                                            session registry ──▶ echo / broadcast
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use upgrade_gateway::config::{load_config, EndpointConfig, GatewayConfig, HandlerKind};
use upgrade_gateway::lifecycle::{signals, Shutdown};
use upgrade_gateway::observability::{logging, metrics};
use upgrade_gateway::{admin, GatewayServer};

#[derive(Parser)]
#[command(name = "upgrade-gateway")]
#[command(about = "WebSocket upgrade gateway", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Used when no configuration file is given.
fn demo_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.endpoints = vec![
        EndpointConfig {
            name: "echo".to_string(),
            path: "/echo".to_string(),
            handler: HandlerKind::Echo,
            versions: vec![13, 8, 7],
            subprotocols: Vec::new(),
            max_message_bytes: 64 * 1024,
            group_param: None,
        },
        EndpointConfig {
            name: "chat".to_string(),
            path: "/chat/{room}".to_string(),
            handler: HandlerKind::Broadcast,
            versions: vec![13],
            subprotocols: vec!["chat.v1".to_string()],
            max_message_bytes: 64 * 1024,
            group_param: Some("room".to_string()),
        },
    ];
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => demo_config(),
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upgrade-gateway starting");
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        request_timeout_secs = config.timeouts.request_secs,
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

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let server = GatewayServer::new(config, shutdown)?;

    let admin_task = admin_listener.map(|listener| {
        let state = server.admin_state();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        })
    });

    server.run(listener).await?;
    if let Some(task) = admin_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
