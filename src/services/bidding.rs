//! BiddingService (C5)
//!
//! Orchestrates `placeBid` end to end (§4.5): acquire the per-auction lock,
//! validate, run `ProxyEngine` when a max bid is supplied, persist, emit
//! events, release. This is the only component that turns a `Decision` into
//! durable state.
//!
//! A competitor displaced by `ProxyEngine` (case 2) is never a new bid row:
//! their standing proxy bid is revealed in place by raising its `amount`
//! field, since only user-initiated bids count toward `bidCount` (§9).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::EventBus;
use crate::ladder::Ladder;
use crate::lock::KeyedLock;
use crate::models::{Auction, AuctionEvent, Bid};
use crate::proxy::{self, CompetingMaxBid, CompetitorAutoBid};
use crate::store::{Store, StoreError};

use super::lifecycle::conclude;

fn map_store_err(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound(id) => AppError::not_found(format!("not found: {id}")),
        StoreError::Duplicate(id) => AppError::validation(format!("duplicate: {id}")),
        StoreError::ValidationError(msg) => AppError::validation(msg),
    }
}

pub struct PlaceBidRequest {
    pub auction_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub max_bid: Option<i64>,
    pub auto_bid_step: Option<i64>,
}

pub struct PlaceBidResult {
    pub bid: Bid,
    pub auction: Auction,
    pub is_winning: bool,
}

pub struct BiddingService {
    store: Arc<dyn Store>,
    lock: Arc<KeyedLock>,
    events: Arc<EventBus>,
    ladder: Ladder,
    lock_timeout: StdDuration,
    lock_max_retries: u32,
    lock_retry_delay: StdDuration,
    max_amount_cents: i64,
}

impl BiddingService {
    pub fn new(
        store: Arc<dyn Store>,
        lock: Arc<KeyedLock>,
        events: Arc<EventBus>,
        ladder: Ladder,
        lock_timeout: StdDuration,
        lock_max_retries: u32,
        lock_retry_delay: StdDuration,
        max_amount_cents: i64,
    ) -> Self {
        Self {
            store,
            lock,
            events,
            ladder,
            lock_timeout,
            lock_max_retries,
            lock_retry_delay,
            max_amount_cents,
        }
    }

    pub async fn place_bid(&self, req: PlaceBidRequest) -> AppResult<PlaceBidResult> {
        let auction_id = req.auction_id;
        let key = auction_id.to_string();
        let store = self.store.clone();
        let events = self.events.clone();
        let ladder = self.ladder.clone();
        let max_amount_cents = self.max_amount_cents;

        let locked = self
            .lock
            .with_lock(
                &key,
                self.lock_timeout,
                self.lock_max_retries,
                self.lock_retry_delay,
                move || async move {
                    place_bid_locked(&*store, &*events, &ladder, max_amount_cents, req)
                },
            )
            .await;

        match locked {
            Ok(inner) => inner,
            Err(_busy) => Err(AppError::contention(format!(
                "auction {auction_id} is busy"
            ))),
        }
    }
}

/// Find the amount of the highest non-retracted bid not owned by
/// `exclude_user`, defaulting to `starting_price` (I2).
fn highest_competing_amount(bids: &[Bid], exclude_user: Uuid, starting_price: i64) -> i64 {
    bids.iter()
        .filter(|b| !b.is_retracted && b.user_id != exclude_user)
        .map(|b| b.amount)
        .max()
        .unwrap_or(starting_price)
}

/// Reduce `bids` to one standing proxy ceiling per competing user (their
/// highest non-retracted `max_bid`, ties broken by earliest timestamp),
/// excluding `exclude_user`. This is both the `ProxyEngine` input and the
/// set of rows a competitor auto-bid can target.
fn standing_max_bids(bids: &[Bid], exclude_user: Uuid) -> Vec<Bid> {
    let mut best: HashMap<Uuid, Bid> = HashMap::new();
    for b in bids
        .iter()
        .filter(|b| b.user_id != exclude_user && !b.is_retracted)
    {
        let Some(max_bid) = b.max_bid else { continue };
        best.entry(b.user_id)
            .and_modify(|cur| {
                let cur_max = cur.max_bid.unwrap_or(i64::MIN);
                if max_bid > cur_max || (max_bid == cur_max && b.timestamp < cur.timestamp) {
                    *cur = b.clone();
                }
            })
            .or_insert_with(|| b.clone());
    }
    best.into_values().collect()
}

/// Demote whichever row currently holds `is_winning`, if any and if it
/// isn't `except_id`.
fn demote_previous_leader(
    store: &dyn Store,
    accumulated: &mut [Bid],
    except_id: Uuid,
) -> AppResult<()> {
    let prev = accumulated
        .iter()
        .find(|b| b.is_winning && b.id != except_id)
        .cloned();
    if let Some(mut prev) = prev {
        prev.is_winning = false;
        store.update_bid(prev.clone()).map_err(map_store_err)?;
        if let Some(slot) = accumulated.iter_mut().find(|b| b.id == prev.id) {
            slot.is_winning = false;
        }
    }
    Ok(())
}

/// Reveal a displaced competitor's standing bid in place: raise its
/// `amount` to its ceiling and, if that now beats every other bid, promote
/// it. Returns the updated row.
fn reveal_competitor(
    store: &dyn Store,
    auction: &mut Auction,
    accumulated: &mut Vec<Bid>,
    requester: Uuid,
    auto: &CompetitorAutoBid,
) -> AppResult<Bid> {
    let mut target = standing_max_bids(accumulated, requester)
        .into_iter()
        .find(|b| b.user_id == auto.user_id)
        .ok_or_else(|| AppError::internal("competitor auto-bid target not found"))?;

    target.amount = auto.amount;
    target.is_max_bid_reached = auto.is_max_bid_reached;
    target.message = Some(auto.message.clone());

    let competing = highest_competing_amount(accumulated, target.user_id, auction.starting_price);
    if target.amount > competing {
        demote_previous_leader(store, accumulated, target.id)?;
        target.is_winning = true;
        auction.current_price = target.amount;
    }

    let updated = store.update_bid(target).map_err(map_store_err)?;
    if let Some(slot) = accumulated.iter_mut().find(|b| b.id == updated.id) {
        *slot = updated.clone();
    } else {
        accumulated.push(updated.clone());
    }
    Ok(updated)
}

fn place_bid_locked(
    store: &dyn Store,
    events: &EventBus,
    ladder: &Ladder,
    max_amount_cents: i64,
    req: PlaceBidRequest,
) -> AppResult<PlaceBidResult> {
    let now = Utc::now();
    let mut auction = store.get_auction(req.auction_id).map_err(map_store_err)?;

    if !auction.can_accept_bids(now) {
        return Err(AppError::state("auction is not accepting bids"));
    }
    if req.user_id == auction.created_by {
        return Err(AppError::validation("cannot bid on your own auction"));
    }
    store.get_user(req.user_id).map_err(map_store_err)?;

    let mut accumulated = store.get_bids(auction.id, false).map_err(map_store_err)?;

    let reserve_met_before = auction.reserve_met();
    let bid_count_before = auction.bid_count;

    let user_is_current_leader = accumulated
        .iter()
        .any(|b| b.user_id == req.user_id && b.is_winning);

    // Step 3-4: run ProxyEngine when a ceiling is supplied; otherwise the
    // bid stands at face value with no competing-ceiling check (§4.5 step 3).
    let (user_bid_amount, would_win, new_visible_price, is_max_bid_reached, message, auto_bids) =
        if let Some(user_max) = req.max_bid {
            let competing_max_bids: Vec<CompetingMaxBid> =
                standing_max_bids(&accumulated, req.user_id)
                    .into_iter()
                    .map(|b| CompetingMaxBid {
                        user_id: b.user_id,
                        max_bid: b.max_bid.expect("standing_max_bids guarantees max_bid"),
                        first_timestamp: b.timestamp,
                    })
                    .collect();

            let decision = proxy::compute(
                &proxy::ProxyInput {
                    current_price: auction.current_price,
                    reserve_price: auction.reserve_price,
                    custom_step: req.auto_bid_step,
                    user_id: req.user_id,
                    user_max,
                    competing_max_bids,
                },
                ladder,
            );
            (
                decision.user_bid_amount,
                decision.would_win,
                decision.new_visible_price,
                decision.is_max_bid_reached,
                decision.message,
                decision.competitor_auto_bids,
            )
        } else {
            (
                req.amount,
                false, // resolved below via raw-amount comparison
                req.amount,
                false,
                "direct bid".to_string(),
                Vec::new(),
            )
        };

    if user_bid_amount <= 0 || user_bid_amount > max_amount_cents {
        return Err(AppError::validation("bid amount out of range"));
    }

    let increment = req
        .auto_bid_step
        .unwrap_or_else(|| ladder.increment(auction.current_price));
    let minimum = auction.current_price + increment;
    let raising_own_unchanged =
        user_is_current_leader && req.max_bid.is_some() && user_bid_amount == auction.current_price;
    if user_bid_amount < minimum && !raising_own_unchanged {
        return Err(AppError::validation(format!(
            "bid must be at least {minimum}"
        )));
    }

    // Step 5: reveal displaced competitors' standing bids in place. No new
    // rows, no bidCount change — these are system, not user, events.
    for auto in &auto_bids {
        let revealed = reveal_competitor(store, &mut auction, &mut accumulated, req.user_id, auto)?;
        events.publish(AuctionEvent::BidPlaced {
            bid: revealed.clone(),
            auction: auction.clone(),
            is_winning: revealed.is_winning,
            previous_winner_id: None,
            at: now,
        });
    }

    let previous_leader = accumulated.iter().find(|b| b.is_winning).cloned();

    // A direct bid has no ProxyEngine verdict; it wins whenever it clears
    // every other user's currently visible amount (which the minimum-bid
    // check above already guarantees in the common case).
    let wins = if req.max_bid.is_some() {
        would_win
    } else {
        user_bid_amount > highest_competing_amount(&accumulated, req.user_id, auction.starting_price)
    };

    // Step 6-7: persist the user's own bid.
    let mut user_bid = Bid {
        id: Uuid::new_v4(),
        auction_id: auction.id,
        user_id: req.user_id,
        amount: user_bid_amount,
        max_bid: req.max_bid,
        auto_bid_step: req.auto_bid_step,
        timestamp: now,
        is_winning: wins,
        is_proxy_bid: req.max_bid.is_some(),
        is_retracted: false,
        retracted_at: None,
        retraction_reason: None,
        message: Some(message),
        is_max_bid_reached,
    };
    if wins {
        demote_previous_leader(store, &mut accumulated, user_bid.id)?;
    }
    user_bid = store.add_bid(user_bid).map_err(map_store_err)?;
    auction.bid_count += 1;
    accumulated.push(user_bid.clone());

    if wins {
        auction.current_price = if req.max_bid.is_some() {
            new_visible_price
        } else {
            user_bid_amount
        };
    }

    // Step 8: Buy-Now removal.
    let reserve_met_after = auction.reserve_met();
    if auction.buy_now_price.is_some() {
        let clear = if auction.reserve_price.is_none() {
            bid_count_before == 0
        } else {
            !reserve_met_before && reserve_met_after
        };
        if clear {
            auction.buy_now_price = None;
        }
    }

    let triggers_buy_now = wins
        && auction
            .buy_now_price
            .map(|bn| user_bid_amount >= bn)
            .unwrap_or(false);

    let mut auction = store.update_auction(auction).map_err(map_store_err)?;

    events.publish(AuctionEvent::BidPlaced {
        bid: user_bid.clone(),
        auction: auction.clone(),
        is_winning: wins,
        previous_winner_id: previous_leader.as_ref().map(|b| b.user_id),
        at: now,
    });

    if wins {
        if let Some(previous) = previous_leader {
            if previous.user_id != req.user_id {
                events.publish(AuctionEvent::YouWereOutbid {
                    auction_id: auction.id,
                    previous_amount: previous.amount,
                    new_amount: user_bid_amount,
                    new_leader_id: req.user_id,
                    target_user_id: previous.user_id,
                    at: now,
                });
            }
        }
    }

    if triggers_buy_now {
        let (concluded, event) = conclude(store, auction.clone(), now)?;
        auction = concluded;
        if let Some(event) = event {
            events.publish(event);
        }
    }

    Ok(PlaceBidResult {
        bid: user_bid,
        auction,
        is_winning: wins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::KeyedLock;
    use crate::models::AuctionStatus;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    fn service(ladder: Ladder) -> (BiddingService, Arc<MemoryStore>, Arc<EventBus>) {
        let store = Arc::new(MemoryStore::new());
        let lock = Arc::new(KeyedLock::new());
        let events = Arc::new(EventBus::new(64));
        let svc = BiddingService::new(
            store.clone(),
            lock,
            events.clone(),
            ladder,
            Duration::from_millis(500),
            3,
            Duration::from_millis(20),
            10_000_000_00,
        );
        (svc, store, events)
    }

    fn seed_auction(store: &MemoryStore, starting_price: i64, reserve_price: Option<i64>) -> Auction {
        let seller = Uuid::new_v4();
        store
            .create_user(crate::models::User {
                id: seller,
                name: "seller".into(),
                email: format!("{seller}@example.com"),
                created_at: Utc::now(),
            })
            .unwrap();
        let auction = Auction {
            id: Uuid::new_v4(),
            title: "item".into(),
            description: "desc".into(),
            created_by: seller,
            starting_price,
            current_price: starting_price,
            reserve_price,
            buy_now_price: None,
            minimum_bid_increment: 1,
            start_time: Utc::now() - chrono::Duration::seconds(5),
            end_time: Utc::now() + chrono::Duration::hours(1),
            has_time_limit: true,
            status: AuctionStatus::Active,
            bid_count: 0,
            winner_id: None,
            last_ending_soon_emitted_at: None,
            created_at: Utc::now(),
        };
        store.create_auction(auction.clone()).unwrap();
        auction
    }

    fn bidder(store: &MemoryStore) -> Uuid {
        let id = Uuid::new_v4();
        store
            .create_user(crate::models::User {
                id,
                name: "bidder".into(),
                email: format!("{id}@example.com"),
                created_at: Utc::now(),
            })
            .unwrap();
        id
    }

    #[tokio::test]
    async fn s1_standard_second_price_sequence() {
        let (svc, store, _events) = service(Ladder::production());
        let auction = seed_auction(&store, 10_000, None);
        let a = bidder(&store);
        let b = bidder(&store);
        let c = bidder(&store);

        svc.place_bid(PlaceBidRequest {
            auction_id: auction.id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

        svc.place_bid(PlaceBidRequest {
            auction_id: auction.id,
            user_id: b,
            amount: 0,
            max_bid: Some(12_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

        let result = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: c,
                amount: 0,
                max_bid: Some(30_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();

        assert_eq!(result.auction.current_price, 21_000);
        assert!(result.is_winning);

        let bids = store.get_bids(auction.id, false).unwrap();
        assert_eq!(bids.len(), 3);
        let winner = bids.iter().find(|b| b.is_winning).unwrap();
        assert_eq!(winner.user_id, c);
    }

    #[tokio::test]
    async fn s2_reserve_not_met_leaves_auction_unsold_after_close() {
        let (svc, store, _events) = service(Ladder::production());
        let auction = seed_auction(&store, 1, Some(100_000));
        let a = bidder(&store);
        let b = bidder(&store);

        svc.place_bid(PlaceBidRequest {
            auction_id: auction.id,
            user_id: a,
            amount: 0,
            max_bid: Some(30_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

        let result = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: b,
                amount: 0,
                max_bid: Some(80_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();

        assert_eq!(result.auction.current_price, 32_500);
        assert!(!result.auction.reserve_met());
    }

    #[tokio::test]
    async fn s3_tie_on_equal_max_keeps_earlier_bidder_winning() {
        let (svc, store, _events) = service(Ladder::production());
        let auction = seed_auction(&store, 10_000, None);
        let a = bidder(&store);
        let b = bidder(&store);

        let first = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: a,
                amount: 0,
                max_bid: Some(20_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();
        assert!(first.is_winning);

        let second = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: b,
                amount: 0,
                max_bid: Some(20_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();
        assert!(!second.is_winning);

        let bids = store.get_bids(auction.id, false).unwrap();
        let winner = bids.iter().find(|bid| bid.is_winning).unwrap();
        assert_eq!(winner.user_id, a);
    }

    #[tokio::test]
    async fn s4_leader_raising_own_max_is_accepted_and_still_winning() {
        let (svc, store, _events) = service(Ladder::production());
        let auction = seed_auction(&store, 10_000, None);
        let a = bidder(&store);
        let b = bidder(&store);

        svc.place_bid(PlaceBidRequest {
            auction_id: auction.id,
            user_id: b,
            amount: 0,
            max_bid: Some(15_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

        let first_a = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: a,
                amount: 0,
                max_bid: Some(20_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();
        assert!(first_a.is_winning);
        assert_eq!(first_a.auction.current_price, 16_000);

        // A is already winning at 16_000 against B's hidden ceiling of
        // 15_000; raising A's own max recomputes to the exact same price
        // and must not be rejected as "below minimum next bid".
        let raised = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: a,
                amount: 0,
                max_bid: Some(25_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();

        assert!(raised.is_winning);
        assert_eq!(raised.auction.current_price, 16_000);
    }

    #[tokio::test]
    async fn s5_reserve_jump_lands_exactly_on_reserve() {
        let (svc, store, _events) = service(Ladder::production());
        let auction = seed_auction(&store, 1_000, Some(30_000));
        let a = bidder(&store);
        let b = bidder(&store);

        svc.place_bid(PlaceBidRequest {
            auction_id: auction.id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

        let result = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: b,
                amount: 0,
                max_bid: Some(40_000),
                auto_bid_step: None,
            })
            .await
            .unwrap();

        assert_eq!(result.auction.current_price, 30_000);
        assert!(result.auction.reserve_met());
    }

    #[tokio::test]
    async fn rejects_bid_from_auction_owner() {
        let (svc, store, _events) = service(Ladder::production());
        let auction = seed_auction(&store, 10_000, None);

        let err = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: auction.created_by,
                amount: 0,
                max_bid: Some(20_000),
                auto_bid_step: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn buy_now_triggers_immediate_conclusion() {
        let (svc, store, _events) = service(Ladder::production());
        let mut auction = seed_auction(&store, 10_000, None);
        auction.buy_now_price = Some(50_000);
        store.update_auction(auction.clone()).unwrap();
        let a = bidder(&store);

        let result = svc
            .place_bid(PlaceBidRequest {
                auction_id: auction.id,
                user_id: a,
                amount: 50_000,
                max_bid: None,
                auto_bid_step: None,
            })
            .await
            .unwrap();

        assert_eq!(result.auction.status, AuctionStatus::Ended);
        assert_eq!(result.auction.winner_id, Some(a));
    }
}
