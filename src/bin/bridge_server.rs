use liveflow::bridge::{ConnectionSupervisor, EventRouter};
use liveflow::config::Config;
use liveflow::gateway::{self, AppState};
use liveflow::prices::PriceTable;
use liveflow::source::replay::ReplaySource;
use liveflow::source::LiveSource;
use liveflow::store::{self, EventStore, RoomStore, SessionRegistry};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env()?;

    log::info!("🚀 Starting liveflow bridge...");
    log::info!("📊 Configuration:");
    log::info!("   Bind address: {}", config.bind_addr);
    log::info!("   Database: {}", config.db_path);
    log::info!("   Price file: {}", config.prices_path);
    log::info!("   Event source: replay of {}", config.events_file);

    let db = store::open_database(&config.db_path)?;
    let prices = PriceTable::load(&config.prices_path);
    let events = EventStore::new(db.clone());
    let router = Arc::new(EventRouter::new(events.clone()));

    // The provider's wire client plugs in behind LiveSource; the replay
    // source stands in for it outside production.
    let source: Arc<dyn LiveSource> =
        Arc::new(ReplaySource::new(&config.events_file, config.replay_delay_ms));

    let state = Arc::new(AppState {
        supervisor: ConnectionSupervisor::new(source, router),
        rooms: RoomStore::new(db.clone()),
        sessions: SessionRegistry::new(db.clone()),
        events,
        prices,
    });

    let app = gateway::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    log::info!("✅ Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
