//! End-to-end scenarios (§8): a full engine — `LifecycleService` to create
//! and open an auction, `BiddingService` to drive a bidding sequence,
//! `RetractionService` to pull a bid back — wired together the way `main.rs`
//! wires them, minus the HTTP/WebSocket surface.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use auction_engine::events::EventBus;
use auction_engine::ladder::Ladder;
use auction_engine::lock::KeyedLock;
use auction_engine::models::{AuctionStatus, RetractionReason, User};
use auction_engine::services::bidding::PlaceBidRequest;
use auction_engine::services::lifecycle::CreateAuctionParams;
use auction_engine::services::retraction::RetractBidRequest;
use auction_engine::services::{BiddingService, LifecycleService, RetractionService};
use auction_engine::store::memory::MemoryStore;
use auction_engine::store::Store;
use chrono::{Duration, Utc};
use uuid::Uuid;

struct Engine {
    store: Arc<dyn Store>,
    bidding: BiddingService,
    lifecycle: LifecycleService,
    retraction: RetractionService,
}

fn engine(ladder: Ladder) -> Engine {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let lock = Arc::new(KeyedLock::new());
    let events = Arc::new(EventBus::new(128));
    let timeout = StdDuration::from_millis(500);
    let retries = 3;
    let retry_delay = StdDuration::from_millis(10);

    let bidding = BiddingService::new(
        store.clone(),
        lock.clone(),
        events.clone(),
        ladder,
        timeout,
        retries,
        retry_delay,
        100_000_000,
    );
    let lifecycle = LifecycleService::new(
        store.clone(),
        lock.clone(),
        events.clone(),
        timeout,
        retries,
        retry_delay,
        100_000_000,
        StdDuration::from_secs(60),
    );
    let retraction = RetractionService::new(
        store.clone(),
        lock,
        events,
        timeout,
        retries,
        retry_delay,
        StdDuration::from_secs(3600),
    );

    Engine {
        store,
        bidding,
        lifecycle,
        retraction,
    }
}

fn register(store: &dyn Store, label: &str) -> Uuid {
    let id = Uuid::new_v4();
    store
        .create_user(User {
            id,
            name: label.to_string(),
            email: format!("{id}@example.com"),
            created_at: Utc::now(),
        })
        .unwrap();
    id
}

async fn open_auction(
    engine: &Engine,
    starting_price: i64,
    reserve_price: Option<i64>,
    buy_now_price: Option<i64>,
) -> (Uuid, Uuid) {
    let seller = register(&*engine.store, "seller");
    let now = Utc::now();
    let auction = engine
        .lifecycle
        .create_auction(CreateAuctionParams {
            title: "Vintage Camera".into(),
            description: "A well-loved camera.".into(),
            starting_price,
            minimum_bid_increment: 1,
            reserve_price,
            buy_now_price,
            start_time: now - Duration::seconds(1),
            end_time: Some(now + Duration::hours(1)),
            has_time_limit: true,
            created_by: seller,
        })
        .await
        .unwrap();
    assert_eq!(auction.status, AuctionStatus::Active);
    (auction.id, seller)
}

/// S1: standard second-price sequence across three bidders.
#[tokio::test]
async fn s1_standard_second_price() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 10_000, None, None).await;

    let a = register(&*engine.store, "a");
    let b = register(&*engine.store, "b");
    let c = register(&*engine.store, "c");

    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: b,
            amount: 0,
            max_bid: Some(12_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    let result = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: c,
            amount: 0,
            max_bid: Some(30_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

    assert_eq!(result.auction.current_price, 21_000);
    assert!(result.is_winning);

    let bids = engine.store.get_bids(auction_id, false).unwrap();
    assert_eq!(bids.len(), 3);
}

/// S2: reserve never cleared, auction closes UNSOLD.
#[tokio::test]
async fn s2_reserve_not_met_closes_unsold() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 1, Some(100_000), None).await;

    let a = register(&*engine.store, "a");
    let b = register(&*engine.store, "b");

    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(30_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    let result = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: b,
            amount: 0,
            max_bid: Some(80_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

    assert_eq!(result.auction.current_price, 32_500);
    assert!(!result.auction.reserve_met());

    let ended = engine.lifecycle.end_auction(auction_id).await.unwrap();
    assert_eq!(ended.status, AuctionStatus::Unsold);
    assert_eq!(ended.winner_id, None);
}

/// S3: two bidders tie on maxBid; the earlier bidder keeps the lead.
#[tokio::test]
async fn s3_tie_on_equal_max_keeps_earlier_leader() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 10_000, None, None).await;
    let a = register(&*engine.store, "a");
    let b = register(&*engine.store, "b");

    let first = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    assert!(first.is_winning);

    let second = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: b,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    assert!(!second.is_winning);
    assert_eq!(second.auction.current_price, 11_000);

    let bids = engine.store.get_bids(auction_id, false).unwrap();
    let winner = bids.iter().find(|bid| bid.is_winning).unwrap();
    assert_eq!(winner.user_id, a);
}

/// S4: the current leader raises their own max; still winning, unchanged price.
#[tokio::test]
async fn s4_leader_raises_own_max() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 10_000, None, None).await;
    let a = register(&*engine.store, "a");
    let b = register(&*engine.store, "b");

    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: b,
            amount: 0,
            max_bid: Some(15_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    let first = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    assert!(first.is_winning);
    let price_after_first = first.auction.current_price;

    let raised = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(25_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

    assert!(raised.is_winning);
    assert_eq!(raised.auction.current_price, price_after_first);
}

/// S5: the formula price lands below reserve, but the bidder's ceiling
/// clears it, so the price jumps straight to the reserve.
#[tokio::test]
async fn s5_reserve_jump() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 1_000, Some(30_000), None).await;
    let a = register(&*engine.store, "a");
    let b = register(&*engine.store, "b");

    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    let result = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
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

/// S6: retracting the winning bid restores the prior leader at their price.
#[tokio::test]
async fn s6_retraction_restores_prior_leader() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 10_000, None, None).await;
    let a = register(&*engine.store, "a");
    let b = register(&*engine.store, "b");

    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    let second = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: b,
            amount: 0,
            max_bid: Some(30_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();
    assert!(second.is_winning);
    let price_before_retraction = second.auction.current_price;

    let bids_before = engine.store.get_bids(auction_id, false).unwrap();
    let a_bid = bids_before.iter().find(|bid| bid.user_id == a).unwrap();
    let price_after_a_alone = a_bid.amount;
    assert!(price_after_a_alone < price_before_retraction);

    let retracted = engine
        .retraction
        .retract_bid(RetractBidRequest {
            bid_id: second.bid.id,
            user_id: b,
            reason: RetractionReason::Typo,
        })
        .await
        .unwrap();

    assert_eq!(retracted.auction.current_price, price_after_a_alone);
    let bids_after = engine.store.get_bids(auction_id, false).unwrap();
    let winner = bids_after.iter().find(|bid| bid.is_winning).unwrap();
    assert_eq!(winner.user_id, a);
}

#[tokio::test]
async fn buy_now_ends_the_auction_immediately() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 10_000, None, Some(50_000)).await;
    let a = register(&*engine.store, "a");

    let result = engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
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

#[tokio::test]
async fn cancel_rejects_once_a_bid_has_landed() {
    let engine = engine(Ladder::production());
    let (auction_id, _seller) = open_auction(&engine, 10_000, None, None).await;
    let a = register(&*engine.store, "a");

    engine
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id,
            user_id: a,
            amount: 0,
            max_bid: Some(20_000),
            auto_bid_step: None,
        })
        .await
        .unwrap();

    assert!(engine.lifecycle.cancel_auction(auction_id).await.is_err());
}
