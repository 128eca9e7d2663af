//! Store (C2)
//!
//! A logical repository for auctions, bids, and users with atomic
//! single-entity read-modify-write (§4.1). Whether the backing storage is
//! in-memory or a database is out of scope (§1); this crate ships the
//! in-memory implementation used by the rest of the engine.

pub mod memory;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Auction, AuctionStatus, Bid, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("validation error: {0}")]
    ValidationError(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The repository surface §4.1 requires. Implementations must keep each
/// named operation atomic with respect to the entity it touches; cross-entity
/// atomicity is the caller's job via `KeyedLock` (§5).
pub trait Store: Send + Sync {
    fn create_auction(&self, auction: Auction) -> StoreResult<Auction>;
    fn get_auction(&self, id: Uuid) -> StoreResult<Auction>;
    fn update_auction(&self, auction: Auction) -> StoreResult<Auction>;
    fn delete_auction(&self, id: Uuid) -> StoreResult<()>;
    fn get_auctions_by_status(&self, status: AuctionStatus) -> StoreResult<Vec<Auction>>;
    fn get_all_auctions(&self) -> StoreResult<Vec<Auction>>;

    fn add_bid(&self, bid: Bid) -> StoreResult<Bid>;
    fn update_bid(&self, bid: Bid) -> StoreResult<Bid>;
    fn get_bids(&self, auction_id: Uuid, include_retracted: bool) -> StoreResult<Vec<Bid>>;
    fn get_bid(&self, bid_id: Uuid) -> StoreResult<Bid>;
    fn get_bids_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Bid>>;

    fn create_user(&self, user: User) -> StoreResult<User>;
    fn get_user(&self, id: Uuid) -> StoreResult<User>;
    fn get_all_users(&self) -> StoreResult<Vec<User>>;
}
