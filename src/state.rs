//! Shared application state handed to every HTTP handler.
//!
//! Grounded on the teacher's `plugin.rs` bootstrap: a flat bag of
//! already-constructed `Arc<Service>` handles built once at startup, cloned
//! cheaply per request (axum's `State` extractor needs `Clone`).

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::events::EventBus;
use crate::ladder::Ladder;
use crate::services::{BiddingService, LifecycleService, RetractionService};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bidding: Arc<BiddingService>,
    pub lifecycle: Arc<LifecycleService>,
    pub retraction: Arc<RetractionService>,
    pub events: Arc<EventBus>,
    pub ladder: Ladder,
    pub config: Arc<EngineConfig>,
}
