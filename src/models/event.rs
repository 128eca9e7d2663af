//! Event payloads fanned out over the EventBus and push channel (§4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auction::Auction;
use super::bid::Bid;

/// Every event the engine can emit. Tagged with its name on the wire so
/// push-channel subscribers can dispatch without inspecting the payload
/// shape first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum AuctionEvent {
    #[serde(rename = "BID_PLACED")]
    BidPlaced {
        bid: Bid,
        auction: Auction,
        is_winning: bool,
        previous_winner_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    #[serde(rename = "BID_RETRACTED")]
    BidRetracted {
        bid: Bid,
        auction: Auction,
        previous_winner_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    #[serde(rename = "AUCTION_CREATED")]
    AuctionCreated { auction: Auction, at: DateTime<Utc> },
    #[serde(rename = "AUCTION_STARTED")]
    AuctionStarted { auction: Auction, at: DateTime<Utc> },
    #[serde(rename = "AUCTION_ENDED")]
    AuctionEnded {
        auction: Auction,
        winner_id: Option<Uuid>,
        final_price: Option<i64>,
        at: DateTime<Utc>,
    },
    #[serde(rename = "AUCTION_ENDING_SOON")]
    AuctionEndingSoon {
        auction: Auction,
        time_remaining_secs: i64,
        at: DateTime<Utc>,
    },
    #[serde(rename = "YOU_WERE_OUTBID")]
    YouWereOutbid {
        auction_id: Uuid,
        previous_amount: i64,
        new_amount: i64,
        new_leader_id: Uuid,
        target_user_id: Uuid,
        at: DateTime<Utc>,
    },
    #[serde(rename = "AUCTION_UPDATED")]
    AuctionUpdated { auction: Auction, at: DateTime<Utc> },
}

impl AuctionEvent {
    /// The auction this event belongs to, for topic routing. `None` would
    /// mean global-only, but every event defined above carries an auction.
    pub fn auction_id(&self) -> Uuid {
        match self {
            Self::BidPlaced { auction, .. }
            | Self::AuctionCreated { auction, .. }
            | Self::AuctionStarted { auction, .. }
            | Self::AuctionEnded { auction, .. }
            | Self::AuctionEndingSoon { auction, .. }
            | Self::AuctionUpdated { auction, .. } => auction.id,
            Self::BidRetracted { auction, .. } => auction.id,
            Self::YouWereOutbid { auction_id, .. } => *auction_id,
        }
    }

    /// Whether the event is also published on the global topic (§4.9 table).
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::BidPlaced { .. }
                | Self::BidRetracted { .. }
                | Self::AuctionCreated { .. }
                | Self::AuctionStarted { .. }
                | Self::AuctionEnded { .. }
        )
    }
}
