//! Shared fixtures for unit tests across modules.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Auction, AuctionStatus};

pub fn sample_auction(id: Uuid) -> Auction {
    let now = Utc::now();
    Auction {
        id,
        title: "Vintage Camera".into(),
        description: "A well-loved camera.".into(),
        starting_price: 10_000,
        current_price: 10_000,
        minimum_bid_increment: 1_000,
        reserve_price: None,
        buy_now_price: None,
        start_time: now - chrono::Duration::minutes(1),
        end_time: now + chrono::Duration::hours(1),
        has_time_limit: true,
        status: AuctionStatus::Active,
        created_by: Uuid::new_v4(),
        winner_id: None,
        bid_count: 0,
        created_at: now,
        last_ending_soon_emitted_at: None,
    }
}
