//! Binary entry point: bootstraps config, store, lock, event bus, services,
//! and the scheduler, then serves the HTTP/WebSocket surface. Ordering
//! mirrors the teacher's `plugin.rs` sequential `init_services`: leaf
//! components first, services that depend on them after.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use auction_engine::config::EngineConfig;
use auction_engine::events::EventBus;
use auction_engine::handlers;
use auction_engine::ladder::Ladder;
use auction_engine::lock::KeyedLock;
use auction_engine::scheduler::Scheduler;
use auction_engine::services::{BiddingService, LifecycleService, RetractionService};
use auction_engine::state::AppState;
use auction_engine::store::memory::MemoryStore;
use auction_engine::store::Store;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env();

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let lock = Arc::new(KeyedLock::new());
    let events = Arc::new(EventBus::new(256));
    let ladder = Ladder::new(config.ladder.bands.clone());

    let bidding = Arc::new(BiddingService::new(
        store.clone(),
        lock.clone(),
        events.clone(),
        ladder.clone(),
        config.lock.timeout,
        config.lock.max_retries,
        config.lock.retry_delay,
        config.auction.max_amount_cents,
    ));

    let lifecycle = Arc::new(LifecycleService::new(
        store.clone(),
        lock.clone(),
        events.clone(),
        config.lock.timeout,
        config.lock.max_retries,
        config.lock.retry_delay,
        config.auction.max_amount_cents,
        config.auction.min_duration,
    ));

    let retraction = Arc::new(RetractionService::new(
        store.clone(),
        lock.clone(),
        events.clone(),
        config.lock.timeout,
        config.lock.max_retries,
        config.lock.retry_delay,
        // §4.7 rule 4: a 1-hour retraction window regardless of time remaining.
        std::time::Duration::from_secs(3600),
    ));

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        lifecycle.clone(),
        events.clone(),
        config.scheduler.interval,
        config.scheduler.grace_period,
        config.scheduler.ending_soon_throttle,
    ));

    lock.clone().spawn_sweeper(std::time::Duration::from_secs(30));
    scheduler.spawn();

    let state = AppState {
        store,
        bidding,
        lifecycle,
        retraction,
        events,
        ladder,
        config: Arc::new(config),
    };

    let app = handlers::router(state);

    let addr: SocketAddr = std::env::var("AUCTION__BIND_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

    tracing::info!(%addr, "starting auction engine");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("server error");
}
