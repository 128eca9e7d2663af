//! LifecycleService (C6)
//!
//! Auction creation, manual start/end, manual winner selection, and the
//! edit/cancel invariants of §4.6. Grounded on the teacher's
//! `services/order.rs` status-transition-table style, adapted from order
//! fulfillment states to auction lifecycle states.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::lock::KeyedLock;
use crate::models::{Auction, AuctionEvent, AuctionStatus, NO_TIME_LIMIT_DURATION_DAYS};
use crate::store::{Store, StoreError};

use crate::events::EventBus;

fn map_store_err(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound(id) => AppError::not_found(format!("not found: {id}")),
        StoreError::Duplicate(id) => AppError::validation(format!("duplicate: {id}")),
        StoreError::ValidationError(msg) => AppError::validation(msg),
    }
}

pub struct CreateAuctionParams {
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    pub minimum_bid_increment: i64,
    pub reserve_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub has_time_limit: bool,
    pub created_by: Uuid,
}

#[derive(Default)]
pub struct UpdateAuctionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starting_price: Option<i64>,
    pub reserve_price: Option<Option<i64>>,
    pub buy_now_price: Option<Option<i64>>,
    pub end_time: Option<DateTime<Utc>>,
}

pub struct LifecycleService {
    store: Arc<dyn Store>,
    lock: Arc<KeyedLock>,
    events: Arc<EventBus>,
    lock_timeout: StdDuration,
    lock_max_retries: u32,
    lock_retry_delay: StdDuration,
    max_amount_cents: i64,
    min_duration: StdDuration,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn Store>,
        lock: Arc<KeyedLock>,
        events: Arc<EventBus>,
        lock_timeout: StdDuration,
        lock_max_retries: u32,
        lock_retry_delay: StdDuration,
        max_amount_cents: i64,
        min_duration: StdDuration,
    ) -> Self {
        Self {
            store,
            lock,
            events,
            lock_timeout,
            lock_max_retries,
            lock_retry_delay,
            max_amount_cents,
            min_duration,
        }
    }

    fn validate_amounts(
        &self,
        starting_price: i64,
        reserve_price: Option<i64>,
        buy_now_price: Option<i64>,
    ) -> AppResult<()> {
        if starting_price < 0 || starting_price > self.max_amount_cents {
            return Err(AppError::validation("startingPrice out of range"));
        }
        if let Some(r) = reserve_price {
            if r < starting_price || r > self.max_amount_cents {
                return Err(AppError::validation(
                    "reservePrice must be >= startingPrice",
                ));
            }
        }
        if let Some(bn) = buy_now_price {
            if bn <= starting_price || bn > self.max_amount_cents {
                return Err(AppError::validation(
                    "buyNowPrice must be greater than startingPrice",
                ));
            }
            if let Some(r) = reserve_price {
                if bn <= r {
                    return Err(AppError::validation(
                        "buyNowPrice must be greater than reservePrice",
                    ));
                }
            }
        }
        Ok(())
    }

    pub async fn create_auction(&self, params: CreateAuctionParams) -> AppResult<Auction> {
        let now = Utc::now();

        if params.title.is_empty() || params.title.chars().count() > 200 {
            return Err(AppError::validation(
                "title must be non-empty and at most 200 characters",
            ));
        }
        if params.description.is_empty() {
            return Err(AppError::validation("description must be non-empty"));
        }
        if params.minimum_bid_increment <= 0 {
            return Err(AppError::validation("minimumBidIncrement must be > 0"));
        }
        if params.start_time < now - Duration::seconds(5) {
            return Err(AppError::validation("startTime is too far in the past"));
        }
        self.validate_amounts(
            params.starting_price,
            params.reserve_price,
            params.buy_now_price,
        )?;

        let end_time = if params.has_time_limit {
            let end_time = params
                .end_time
                .ok_or_else(|| AppError::validation("endTime is required when hasTimeLimit"))?;
            if end_time <= params.start_time {
                return Err(AppError::validation("endTime must be after startTime"));
            }
            if end_time - params.start_time < Duration::from_std(self.min_duration).unwrap() {
                return Err(AppError::validation("auction duration is too short"));
            }
            end_time
        } else {
            params.start_time + Duration::days(NO_TIME_LIMIT_DURATION_DAYS)
        };

        let status = if params.start_time <= now {
            AuctionStatus::Active
        } else {
            AuctionStatus::Pending
        };

        let auction = Auction {
            id: Uuid::new_v4(),
            title: params.title,
            description: params.description,
            starting_price: params.starting_price,
            current_price: params.starting_price,
            minimum_bid_increment: params.minimum_bid_increment,
            reserve_price: params.reserve_price,
            buy_now_price: params.buy_now_price,
            start_time: params.start_time,
            end_time,
            has_time_limit: params.has_time_limit,
            status,
            created_by: params.created_by,
            winner_id: None,
            bid_count: 0,
            created_at: now,
            last_ending_soon_emitted_at: None,
        };

        let auction = self.store.create_auction(auction).map_err(map_store_err)?;
        self.events.publish(AuctionEvent::AuctionCreated {
            auction: auction.clone(),
            at: now,
        });
        if status == AuctionStatus::Active {
            self.events.publish(AuctionEvent::AuctionStarted {
                auction: auction.clone(),
                at: now,
            });
        }
        Ok(auction)
    }

    pub async fn start_auction(&self, id: Uuid) -> AppResult<Auction> {
        let store = self.store.clone();
        let events = self.events.clone();
        self.run_locked(id, move || async move {
            let now = Utc::now();
            let mut auction = store.get_auction(id).map_err(map_store_err)?;
            if auction.status != AuctionStatus::Pending || now < auction.start_time {
                return Err(AppError::state("auction cannot be started"));
            }
            auction.status = AuctionStatus::Active;
            let auction = store.update_auction(auction).map_err(map_store_err)?;
            events.publish(AuctionEvent::AuctionStarted {
                auction: auction.clone(),
                at: now,
            });
            Ok(auction)
        })
        .await
    }

    pub async fn end_auction(&self, id: Uuid) -> AppResult<Auction> {
        let store = self.store.clone();
        let events = self.events.clone();
        self.run_locked(id, move || async move {
            let now = Utc::now();
            let auction = store.get_auction(id).map_err(map_store_err)?;
            let (auction, event) = conclude(&*store, auction, now)?;
            if let Some(event) = event {
                events.publish(event);
            }
            Ok(auction)
        })
        .await
    }

    pub async fn select_winner(&self, id: Uuid, winner_id: Uuid) -> AppResult<Auction> {
        let store = self.store.clone();
        let events = self.events.clone();
        self.run_locked(id, move || async move {
            let now = Utc::now();
            let mut auction = store.get_auction(id).map_err(map_store_err)?;
            if auction.status != AuctionStatus::Active {
                return Err(AppError::state("auction is not active"));
            }
            let bids = store.get_bids(id, false).map_err(map_store_err)?;
            let winning_bid = bids
                .into_iter()
                .find(|b| b.user_id == winner_id)
                .ok_or_else(|| AppError::validation("user has no non-retracted bid"))?;

            auction.status = AuctionStatus::Ended;
            auction.winner_id = Some(winner_id);
            auction.current_price = auction.current_price.max(winning_bid.amount);
            let auction = store.update_auction(auction).map_err(map_store_err)?;

            events.publish(AuctionEvent::AuctionEnded {
                auction: auction.clone(),
                winner_id: auction.winner_id,
                final_price: Some(auction.current_price),
                at: now,
            });
            Ok(auction)
        })
        .await
    }

    pub async fn update_auction(&self, id: Uuid, patch: UpdateAuctionPatch) -> AppResult<Auction> {
        let store = self.store.clone();
        let events = self.events.clone();
        let max_amount_cents = self.max_amount_cents;
        self.run_locked(id, move || async move {
            let now = Utc::now();
            let mut auction = store.get_auction(id).map_err(map_store_err)?;

            let editable =
                auction.status == AuctionStatus::Pending
                    || (auction.status == AuctionStatus::Active && auction.bid_count == 0);
            if !editable {
                return Err(AppError::state("auction can no longer be edited"));
            }

            if let Some(title) = patch.title {
                if title.is_empty() || title.chars().count() > 200 {
                    return Err(AppError::validation(
                        "title must be non-empty and at most 200 characters",
                    ));
                }
                auction.title = title;
            }
            if let Some(description) = patch.description {
                if description.is_empty() {
                    return Err(AppError::validation("description must be non-empty"));
                }
                auction.description = description;
            }
            if let Some(end_time) = patch.end_time {
                if end_time <= auction.start_time {
                    return Err(AppError::validation("endTime must be after startTime"));
                }
                auction.end_time = end_time;
            }
            if let Some(reserve_price) = patch.reserve_price {
                auction.reserve_price = reserve_price;
            }
            if let Some(buy_now_price) = patch.buy_now_price {
                auction.buy_now_price = buy_now_price;
            }
            if let Some(starting_price) = patch.starting_price {
                if starting_price < 0 || starting_price > max_amount_cents {
                    return Err(AppError::validation("startingPrice out of range"));
                }
                auction.starting_price = starting_price;
                auction.current_price = starting_price;
            }
            if let Some(r) = auction.reserve_price {
                if r < auction.starting_price {
                    return Err(AppError::validation(
                        "reservePrice must be >= startingPrice",
                    ));
                }
                if let Some(bn) = auction.buy_now_price {
                    if bn <= r {
                        return Err(AppError::validation(
                            "buyNowPrice must be greater than reservePrice",
                        ));
                    }
                }
            }

            let auction = store.update_auction(auction).map_err(map_store_err)?;
            events.publish(AuctionEvent::AuctionUpdated {
                auction: auction.clone(),
                at: now,
            });
            Ok(auction)
        })
        .await
    }

    pub async fn cancel_auction(&self, id: Uuid) -> AppResult<()> {
        let store = self.store.clone();
        self.run_locked(id, move || async move {
            let auction = store.get_auction(id).map_err(map_store_err)?;
            if auction.status == AuctionStatus::Ended || auction.bid_count != 0 {
                return Err(AppError::state("auction cannot be cancelled"));
            }
            store.delete_auction(id).map_err(map_store_err)
        })
        .await
    }

    async fn run_locked<F, Fut, T>(&self, id: Uuid, f: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let key = id.to_string();
        match self
            .lock
            .with_lock(
                &key,
                self.lock_timeout,
                self.lock_max_retries,
                self.lock_retry_delay,
                f,
            )
            .await
        {
            Ok(inner) => inner,
            Err(_busy) => Err(AppError::contention(format!("auction {id} is busy"))),
        }
    }
}

/// Shared end-of-auction resolution (§4.6), reused by `end_auction`, the
/// scheduler's timer/fail-safe paths, and the Buy-Now immediate-end path in
/// `BiddingService`. Idempotent on an already-terminal auction.
pub(crate) fn conclude(
    store: &dyn Store,
    mut auction: Auction,
    now: DateTime<Utc>,
) -> AppResult<(Auction, Option<AuctionEvent>)> {
    if auction.status.is_terminal() {
        return Ok((auction, None));
    }
    if auction.status != AuctionStatus::Active {
        return Err(AppError::state("auction is not active"));
    }

    let bids = store.get_bids(auction.id, false).map_err(map_store_err)?;
    let winning_bid = bids.into_iter().find(|b| b.is_winning);

    if auction.reserve_met() {
        auction.status = AuctionStatus::Ended;
        auction.winner_id = winning_bid.map(|b| b.user_id);
    } else {
        auction.status = AuctionStatus::Unsold;
        auction.winner_id = None;
    }

    let auction = store.update_auction(auction).map_err(map_store_err)?;
    let event = AuctionEvent::AuctionEnded {
        auction: auction.clone(),
        winner_id: auction.winner_id,
        final_price: auction.winner_id.map(|_| auction.current_price),
        at: now,
    };
    Ok((auction, Some(event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::time::Duration as StdDuration;

    fn service() -> LifecycleService {
        LifecycleService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(KeyedLock::new()),
            Arc::new(EventBus::new(32)),
            StdDuration::from_millis(500),
            3,
            StdDuration::from_millis(10),
            100_000_000,
            StdDuration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn create_auction_starting_now_is_active() {
        let svc = service();
        let now = Utc::now();
        let auction = svc
            .create_auction(CreateAuctionParams {
                title: "Lamp".into(),
                description: "A lamp".into(),
                starting_price: 1_000,
                minimum_bid_increment: 100,
                reserve_price: None,
                buy_now_price: None,
                start_time: now - Duration::seconds(1),
                end_time: Some(now + Duration::hours(1)),
                has_time_limit: true,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();
        assert_eq!(auction.status, AuctionStatus::Active);
    }

    #[tokio::test]
    async fn create_auction_rejects_bad_reserve_ordering() {
        let svc = service();
        let now = Utc::now();
        let err = svc
            .create_auction(CreateAuctionParams {
                title: "Lamp".into(),
                description: "A lamp".into(),
                starting_price: 1_000,
                minimum_bid_increment: 100,
                reserve_price: Some(5_000),
                buy_now_price: Some(4_000),
                start_time: now,
                end_time: Some(now + Duration::hours(1)),
                has_time_limit: true,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn end_auction_is_idempotent_on_terminal_state() {
        let svc = service();
        let now = Utc::now();
        let auction = svc
            .create_auction(CreateAuctionParams {
                title: "Lamp".into(),
                description: "A lamp".into(),
                starting_price: 1_000,
                minimum_bid_increment: 100,
                reserve_price: None,
                buy_now_price: None,
                start_time: now,
                end_time: Some(now + Duration::hours(1)),
                has_time_limit: true,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();
        svc.end_auction(auction.id).await.unwrap();
        let ended_twice = svc.end_auction(auction.id).await.unwrap();
        assert_eq!(ended_twice.status, AuctionStatus::Ended);
    }

    #[tokio::test]
    async fn cancel_rejects_auction_with_bids() {
        let svc = service();
        let now = Utc::now();
        let auction = svc
            .create_auction(CreateAuctionParams {
                title: "Lamp".into(),
                description: "A lamp".into(),
                starting_price: 1_000,
                minimum_bid_increment: 100,
                reserve_price: None,
                buy_now_price: None,
                start_time: now,
                end_time: Some(now + Duration::hours(1)),
                has_time_limit: true,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();
        let mut a2 = auction.clone();
        a2.bid_count = 1;
        svc.store.update_auction(a2).unwrap();
        assert!(svc.cancel_auction(auction.id).await.is_err());
    }
}
