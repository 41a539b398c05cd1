//! Herdwatch Server
//!
//! Relays collar telemetry from MQTT to the dashboard and serves the geofence API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use herdwatch::bridge::{MqttUpstream, TelemetryBridge};
use herdwatch::config::AppConfig;
use herdwatch::geofence::FenceEditor;
use herdwatch::server::{AppState, create_router};
use herdwatch::simulator;

/// Herdwatch Livestock Telemetry Server
#[derive(Parser, Debug)]
#[command(name = "herdwatch")]
#[command(about = "Livestock telemetry bridge and geofence server", long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults to ./herdwatch.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge and HTTP server (default)
    Serve {
        /// Server host address
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Publish simulated collar readings to the broker
    Simulate {
        /// Seconds between readings
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Animal id stamped on every reading
        #[arg(long)]
        animal_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("herdwatch=info,tower_http=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Simulate {
            interval_secs,
            animal_id,
        } => {
            if let Some(secs) = interval_secs {
                config.simulator.interval_secs = secs;
            }
            if let Some(id) = animal_id {
                config.simulator.animal_id = id;
            }
            simulator::run(&config.upstream, &config.simulator, wait_for_signal()).await?;
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting Herdwatch server v{}", env!("CARGO_PKG_VERSION"));

    let bridge = TelemetryBridge::new(config.bridge.clone());

    // Restore the saved fence; a broken store file should not block startup
    let mut fence = FenceEditor::new(&config.geofence);
    match fence.restore().await {
        Ok(true) => info!(
            vertices = fence.boundary().len(),
            entities = fence.entities().len(),
            "Restored saved geofence"
        ),
        Ok(false) => info!("No saved geofence"),
        Err(e) => warn!("Failed to restore saved geofence: {}", e),
    }

    // Bind before connecting upstream so a taken port fails fast
    let addr = config.server.addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let upstream = MqttUpstream::connect(&config.upstream)
        .await
        .context("Failed to connect to MQTT broker")?;

    let relay = tokio::spawn({
        let bridge = bridge.clone();
        async move { bridge.run(upstream).await }
    });

    let app = create_router(AppState::new(bridge.clone(), fence));

    info!("Server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(bridge.clone()))
        .await?;

    // Covers a server error before any signal arrived
    bridge.shutdown().await;
    if let Err(e) = relay.await {
        warn!("Relay task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal and close the bridge
async fn shutdown_signal(bridge: TelemetryBridge) {
    wait_for_signal().await;

    info!("Closing upstream and live-view sessions...");
    bridge.shutdown().await;
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
