//! Services (C5-C7)
//!
//! Orchestration layer: each service composes `Store`, `KeyedLock`,
//! `EventBus`, and (for bidding) `ProxyEngine`/`Ladder` into the public
//! operations §4 names. Grounded on the teacher's service-struct style in
//! `services/inventory.rs` and `services/order.rs` — plain structs holding
//! `Arc<dyn Store>`/`Arc<EventBus>` fields, inherent async methods, small
//! plain error enums at the leaves converting into `AppError` at the top.

pub mod bidding;
pub mod lifecycle;
pub mod retraction;

pub use bidding::BiddingService;
pub use lifecycle::LifecycleService;
pub use retraction::RetractionService;
