use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_inventory::{app, config::Config, services::reclaimer::run_reclaimer, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting seat inventory service ({})", config.app.environment);

    let state = AppState::new(config.clone()).await?;

    // --- Background tasks ---

    if config.reclaimer.enabled {
        let inventory = state.inventory.clone();
        let every = Duration::from_secs(config.reclaimer.interval_seconds.max(1));
        task::spawn(run_reclaimer(inventory, every));
    }

    // --- Web server ---

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
