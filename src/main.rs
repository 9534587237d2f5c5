use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blob_arena_server::config::ServerConfig;
use blob_arena_server::metrics::{self, Metrics};
use blob_arena_server::net::game_session::GameSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Blob Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate()?;
    let sim = &config.simulation;
    info!(
        "Configuration loaded: {}x{} map, cell {}, {} food, max {} players, {} Hz",
        sim.map_width,
        sim.map_height,
        sim.cell_size,
        sim.food_count,
        sim.max_players,
        config.tick_rate
    );
    if let Some(seed) = sim.seed {
        info!("Deterministic run with seed {}", seed);
    }

    let metrics = Arc::new(Metrics::new());

    let metrics_addr = SocketAddr::new(config.metrics_bind_address, config.metrics_port);
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    });

    let session = GameSession::new(&config, metrics);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    };

    session.run(shutdown).await;
    info!("Server stopped");

    Ok(())
}
