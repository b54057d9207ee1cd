//! Timetable HTTP Server Binary
//!
//! Loads the engine configuration, builds the local repository and serves the
//! scheduling API.
//!
//! # Usage
//!
//! ```bash
//! # Empty in-memory repository
//! cargo run --bin timetable-server
//!
//! # Seeded from a JSON document
//! TIMETABLE_SEED=seed.json cargo run --bin timetable-server
//! ```
//!
//! # Environment Variables
//!
//! - `TIMETABLE_CONFIG`: path to a `timetable.toml` (default: searched)
//! - `TIMETABLE_SEED`: JSON seed for the local repository
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use timetable_engine::config::EngineConfig;
use timetable_engine::db::{FullRepository, LocalRepository};
use timetable_engine::http::{create_router, AppState};
use timetable_engine::services::{EventBus, ScheduleOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting timetable server");

    let config = EngineConfig::load()?;

    let repository = match &config.repository.seed_file {
        Some(path) => LocalRepository::from_seed_file(path)
            .map_err(|e| anyhow::anyhow!("loading seed {}: {}", path.display(), e))?,
        None => {
            info!("No seed file configured, starting with an empty repository");
            LocalRepository::new()
        }
    };
    let repository: Arc<dyn FullRepository> = Arc::new(repository);

    let orchestrator = ScheduleOrchestrator::new(repository, EventBus::default(), &config);
    let app = create_router(AppState::new(orchestrator));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
