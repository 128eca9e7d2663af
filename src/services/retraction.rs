//! RetractionService (C7)
//!
//! Validates retraction eligibility, marks a bid retracted, and recomputes
//! the auction's winner and visible price (§4.7). Runs under the same
//! per-auction lock as `BiddingService` — retraction and bidding on the same
//! auction never interleave.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::EventBus;
use crate::lock::KeyedLock;
use crate::models::{Auction, AuctionEvent, Bid, RetractionReason};
use crate::store::{Store, StoreError};

fn map_store_err(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound(id) => AppError::not_found(format!("not found: {id}")),
        StoreError::Duplicate(id) => AppError::validation(format!("duplicate: {id}")),
        StoreError::ValidationError(msg) => AppError::validation(msg),
    }
}

pub struct RetractBidRequest {
    pub bid_id: Uuid,
    pub user_id: Uuid,
    pub reason: RetractionReason,
}

pub struct RetractBidResult {
    pub bid: Bid,
    pub auction: Auction,
}

pub struct RetractionService {
    store: Arc<dyn Store>,
    lock: Arc<KeyedLock>,
    events: Arc<EventBus>,
    lock_timeout: StdDuration,
    lock_max_retries: u32,
    lock_retry_delay: StdDuration,
    retraction_window: StdDuration,
}

impl RetractionService {
    pub fn new(
        store: Arc<dyn Store>,
        lock: Arc<KeyedLock>,
        events: Arc<EventBus>,
        lock_timeout: StdDuration,
        lock_max_retries: u32,
        lock_retry_delay: StdDuration,
        retraction_window: StdDuration,
    ) -> Self {
        Self {
            store,
            lock,
            events,
            lock_timeout,
            lock_max_retries,
            lock_retry_delay,
            retraction_window,
        }
    }

    pub async fn retract_bid(&self, req: RetractBidRequest) -> AppResult<RetractBidResult> {
        let bid = self.store.get_bid(req.bid_id).map_err(map_store_err)?;
        let auction_id = bid.auction_id;
        let key = auction_id.to_string();

        let store = self.store.clone();
        let events = self.events.clone();
        let window = self.retraction_window;

        let locked = self
            .lock
            .with_lock(
                &key,
                self.lock_timeout,
                self.lock_max_retries,
                self.lock_retry_delay,
                move || async move { retract_locked(&*store, &*events, window, req) },
            )
            .await;

        match locked {
            Ok(inner) => inner,
            Err(_busy) => Err(AppError::contention(format!("auction {auction_id} is busy"))),
        }
    }

    /// Read-only eligibility check for `GET /bids/{id}/can-retract` (§6). Not
    /// authoritative: a concurrent change between this call and an actual
    /// `retract_bid` can still flip the outcome.
    pub fn can_retract(&self, bid_id: Uuid, user_id: Uuid) -> AppResult<(bool, Option<String>)> {
        let bid = self.store.get_bid(bid_id).map_err(map_store_err)?;
        let auction = self.store.get_auction(bid.auction_id).map_err(map_store_err)?;
        Ok(
            match eligibility(&bid, &auction, user_id, self.retraction_window, Utc::now()) {
                Ok(()) => (true, None),
                Err(err) => (false, Some(err.to_string())),
            },
        )
    }
}

/// §7: acting on someone else's bid is an authorization failure
/// (`Forbidden`/403), distinct from the state-like reasons below (`State`/400).
fn eligibility(
    bid: &Bid,
    auction: &Auction,
    user_id: Uuid,
    window: StdDuration,
    now: chrono::DateTime<Utc>,
) -> AppResult<()> {
    if bid.user_id != user_id {
        return Err(AppError::forbidden("not the bid owner"));
    }
    if bid.is_retracted {
        return Err(AppError::state("bid already retracted"));
    }
    if auction.status.is_terminal() {
        return Err(AppError::state("auction has ended"));
    }
    if !bid.is_winning {
        return Err(AppError::state("only the winning bid may be retracted"));
    }
    let elapsed = now - bid.timestamp;
    let window = Duration::from_std(window).unwrap_or_else(|_| Duration::weeks(52 * 100));
    if elapsed > window {
        return Err(AppError::state("retraction window has expired"));
    }
    Ok(())
}

fn retract_locked(
    store: &dyn Store,
    events: &EventBus,
    window: StdDuration,
    req: RetractBidRequest,
) -> AppResult<RetractBidResult> {
    let now = Utc::now();
    let mut bid = store.get_bid(req.bid_id).map_err(map_store_err)?;
    let mut auction = store.get_auction(bid.auction_id).map_err(map_store_err)?;

    eligibility(&bid, &auction, req.user_id, window, now)?;

    bid.is_retracted = true;
    bid.retracted_at = Some(now);
    bid.is_winning = false;
    bid.retraction_reason = Some(req.reason);
    let bid = store.update_bid(bid).map_err(map_store_err)?;

    // `get_bids` returns the (amount DESC, timestamp ASC) order §4.1
    // mandates, so the first remaining entry is exactly the new leader.
    let remaining = store.get_bids(auction.id, false).map_err(map_store_err)?;

    if let Some(mut leader) = remaining.into_iter().next() {
        leader.is_winning = true;
        let leader = store.update_bid(leader).map_err(map_store_err)?;
        auction.current_price = leader.amount;
    } else {
        auction.current_price = auction.starting_price;
        auction.bid_count = 0;
    }

    let auction = store.update_auction(auction).map_err(map_store_err)?;
    events.publish(AuctionEvent::BidRetracted {
        bid: bid.clone(),
        auction: auction.clone(),
        previous_winner_id: Some(req.user_id),
        at: now,
    });

    Ok(RetractBidResult { bid, auction })
}
