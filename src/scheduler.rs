//! Scheduler (C8)
//!
//! Cooperative wall-clock ticker (§4.8) that auto-starts/ends auctions and
//! emits ending-soon warnings, plus an independent fail-safe sweep. Grounded
//! on the `tokio::time::interval` tick loop and per-item
//! log-and-swallow error handling of `other_examples`' scheduler.rs — one
//! bad auction must never abort the tick.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::events::EventBus;
use crate::models::{AuctionEvent, AuctionStatus};
use crate::services::LifecycleService;
use crate::store::Store;

/// Fixed per-tick ending-soon window (§4.8: "0 < endTime - now <= 300s").
/// Distinct from `AuctionSettings::ending_soon_threshold`, which governs the
/// HTTP detail endpoint's derived `isEndingSoon` field.
const ENDING_SOON_WINDOW_SECS: i64 = 300;

#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub started: u64,
    pub ended: u64,
    pub ending_soon: u64,
    pub fail_safe_activations: u64,
}

pub struct Scheduler {
    store: Arc<dyn Store>,
    lifecycle: Arc<LifecycleService>,
    events: Arc<EventBus>,
    interval: StdDuration,
    grace_period: StdDuration,
    ending_soon_throttle: StdDuration,
    stats: Mutex<SchedulerStats>,
    started_at: std::time::Instant,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: Arc<LifecycleService>,
        events: Arc<EventBus>,
        interval: StdDuration,
        grace_period: StdDuration,
        ending_soon_throttle: StdDuration,
    ) -> Self {
        Self {
            store,
            lifecycle,
            events,
            interval,
            grace_period,
            ending_soon_throttle,
            stats: Mutex::new(SchedulerStats::default()),
            started_at: std::time::Instant::now(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        *self.stats.lock()
    }

    pub fn uptime(&self) -> StdDuration {
        self.started_at.elapsed()
    }

    /// Run one tick: auto-start due PENDING auctions, auto-end/ending-soon
    /// ACTIVE ones, then the fail-safe sweep. Never panics on a single bad
    /// auction; logs and continues.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) {
        self.stats.lock().ticks += 1;
        let now = Utc::now();

        match self.store.get_auctions_by_status(AuctionStatus::Pending) {
            Ok(pending) => {
                for auction in pending {
                    if now < auction.start_time {
                        continue;
                    }
                    match self.lifecycle.start_auction(auction.id).await {
                        Ok(_) => self.stats.lock().started += 1,
                        Err(err) => {
                            warn!(auction_id = %auction.id, %err, "auto-start failed");
                        }
                    }
                }
            }
            Err(err) => error!(%err, "failed to list pending auctions"),
        }

        match self.store.get_auctions_by_status(AuctionStatus::Active) {
            Ok(active) => {
                for mut auction in active {
                    if auction.has_time_limit && now >= auction.end_time {
                        match self.lifecycle.end_auction(auction.id).await {
                            Ok(_) => self.stats.lock().ended += 1,
                            Err(err) => {
                                warn!(auction_id = %auction.id, %err, "auto-end failed");
                            }
                        }
                        continue;
                    }

                    let remaining = auction.end_time - now;
                    let in_window = remaining > chrono::Duration::zero()
                        && remaining <= chrono::Duration::seconds(ENDING_SOON_WINDOW_SECS);
                    if !in_window {
                        continue;
                    }

                    let throttle = chrono::Duration::from_std(self.ending_soon_throttle)
                        .unwrap_or_else(|_| chrono::Duration::seconds(30));
                    let should_emit = auction
                        .last_ending_soon_emitted_at
                        .map(|last| now - last >= throttle)
                        .unwrap_or(true);
                    if !should_emit {
                        continue;
                    }

                    auction.last_ending_soon_emitted_at = Some(now);
                    match self.store.update_auction(auction.clone()) {
                        Ok(updated) => {
                            self.stats.lock().ending_soon += 1;
                            self.events.publish(AuctionEvent::AuctionEndingSoon {
                                auction: updated,
                                time_remaining_secs: remaining.num_seconds(),
                                at: now,
                            });
                        }
                        Err(err) => warn!(auction_id = %auction.id, %err, "throttle update failed"),
                    }
                }
            }
            Err(err) => error!(%err, "failed to list active auctions"),
        }

        self.run_fail_safe().await;
    }

    /// Force-end ACTIVE auctions stuck past `endTime + gracePeriod`, to cover
    /// a paused or delayed scheduler (§4.8).
    #[tracing::instrument(skip(self))]
    pub async fn run_fail_safe(&self) {
        let now = Utc::now();
        let grace = chrono::Duration::from_std(self.grace_period)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));

        let active = match self.store.get_auctions_by_status(AuctionStatus::Active) {
            Ok(v) => v,
            Err(err) => {
                error!(%err, "fail-safe: failed to list active auctions");
                return;
            }
        };

        for auction in active {
            if !auction.has_time_limit {
                continue;
            }
            if now - auction.end_time <= grace {
                continue;
            }
            match self.lifecycle.end_auction(auction.id).await {
                Ok(_) => {
                    let mut stats = self.stats.lock();
                    stats.fail_safe_activations += 1;
                    stats.ended += 1;
                }
                Err(err) => warn!(auction_id = %auction.id, %err, "fail-safe end failed"),
            }
        }
    }

    /// Spawn the periodic tick loop. A tick still running when the next
    /// interval fires is skipped rather than queued (§5).
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}
