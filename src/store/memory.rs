//! In-memory Store implementation.
//!
//! Grounded on the teacher's `RwLock`-guarded field style in `plugin.rs`
//! (`RwLock<Option<Arc<Service>>>`), generalized to `RwLock<HashMap<...>>`
//! collections guarding each entity table.

use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Auction, AuctionStatus, Bid, User};

use super::{Store, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    auctions: RwLock<HashMap<Uuid, Auction>>,
    bids: RwLock<HashMap<Uuid, Bid>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort order required by §4.1: `(amount DESC, timestamp ASC)`.
    fn sort_bids(bids: &mut [Bid]) {
        bids.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
    }
}

impl Store for MemoryStore {
    fn create_auction(&self, auction: Auction) -> StoreResult<Auction> {
        if auction.title.is_empty() || auction.description.is_empty() {
            return Err(StoreError::ValidationError(
                "title and description are required".into(),
            ));
        }
        let mut auctions = self.auctions.write();
        if auctions.contains_key(&auction.id) {
            return Err(StoreError::Duplicate(auction.id.to_string()));
        }
        auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    fn get_auction(&self, id: Uuid) -> StoreResult<Auction> {
        self.auctions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update_auction(&self, auction: Auction) -> StoreResult<Auction> {
        let mut auctions = self.auctions.write();
        if !auctions.contains_key(&auction.id) {
            return Err(StoreError::NotFound(auction.id.to_string()));
        }
        auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    fn delete_auction(&self, id: Uuid) -> StoreResult<()> {
        let mut auctions = self.auctions.write();
        if auctions.remove(&id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let mut bids = self.bids.write();
        bids.retain(|_, b| b.auction_id != id);
        Ok(())
    }

    fn get_auctions_by_status(&self, status: AuctionStatus) -> StoreResult<Vec<Auction>> {
        Ok(self
            .auctions
            .read()
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect())
    }

    fn get_all_auctions(&self) -> StoreResult<Vec<Auction>> {
        Ok(self.auctions.read().values().cloned().collect())
    }

    fn add_bid(&self, bid: Bid) -> StoreResult<Bid> {
        let mut bids = self.bids.write();
        if bids.contains_key(&bid.id) {
            return Err(StoreError::Duplicate(bid.id.to_string()));
        }
        bids.insert(bid.id, bid.clone());
        Ok(bid)
    }

    fn update_bid(&self, bid: Bid) -> StoreResult<Bid> {
        let mut bids = self.bids.write();
        if !bids.contains_key(&bid.id) {
            return Err(StoreError::NotFound(bid.id.to_string()));
        }
        bids.insert(bid.id, bid.clone());
        Ok(bid)
    }

    fn get_bids(&self, auction_id: Uuid, include_retracted: bool) -> StoreResult<Vec<Bid>> {
        let mut result: Vec<Bid> = self
            .bids
            .read()
            .values()
            .filter(|b| b.auction_id == auction_id && (include_retracted || !b.is_retracted))
            .cloned()
            .collect();
        Self::sort_bids(&mut result);
        Ok(result)
    }

    fn get_bid(&self, bid_id: Uuid) -> StoreResult<Bid> {
        self.bids
            .read()
            .get(&bid_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(bid_id.to_string()))
    }

    fn get_bids_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Bid>> {
        Ok(self
            .bids
            .read()
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    fn create_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(user.id.to_string()));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::ValidationError(format!(
                "email already registered: {}",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn get_all_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().values().cloned().collect())
    }
}
