//! ProxyEngine (C4) — the second-price proxy algorithm.
//!
//! A pure function: given the current auction state, the bid ladder, and an
//! incoming `(user_id, user_max, custom_step?)`, compute the outcome
//! (§4.4). No persistence, no locking, no events — `BiddingService` is the
//! only thing that acts on a `Decision`. This separation is what lets the
//! algorithm be property-tested without a store or lock (§9).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ladder::Ladder;

/// A competitor's standing proxy ceiling, already filtered by the caller to
/// exclude retracted bids and the requesting user's own bids, and reduced to
/// one entry per competing user (their best standing max-bid) (§4.4).
#[derive(Debug, Clone)]
pub struct CompetingMaxBid {
    pub user_id: Uuid,
    pub max_bid: i64,
    pub first_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProxyInput {
    pub current_price: i64,
    pub reserve_price: Option<i64>,
    /// Bidder-supplied increment override; falls back to the ladder.
    pub custom_step: Option<i64>,
    pub user_id: Uuid,
    pub user_max: i64,
    pub competing_max_bids: Vec<CompetingMaxBid>,
}

/// An auto-bid the engine decided to record on behalf of a displaced
/// competitor (case 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitorAutoBid {
    pub user_id: Uuid,
    pub amount: i64,
    pub is_max_bid_reached: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub user_bid_amount: i64,
    pub would_win: bool,
    pub competitor_auto_bids: Vec<CompetitorAutoBid>,
    pub new_visible_price: i64,
    pub is_max_bid_reached: bool,
    pub message: String,
}

/// Find `H`: the highest competing max-bid, ties broken by earliest
/// `first_timestamp`.
fn highest_competitor(bids: &[CompetingMaxBid]) -> Option<&CompetingMaxBid> {
    bids.iter().fold(None, |best, candidate| match best {
        None => Some(candidate),
        Some(current) => {
            if candidate.max_bid > current.max_bid {
                Some(candidate)
            } else if candidate.max_bid == current.max_bid
                && candidate.first_timestamp < current.first_timestamp
            {
                Some(candidate)
            } else {
                Some(current)
            }
        }
    })
}

/// Run the proxy algorithm against `ladder`. Pure: the same `(input,
/// ladder)` always yields the same output.
pub fn compute(input: &ProxyInput, ladder: &Ladder) -> Decision {
    match highest_competitor(&input.competing_max_bids) {
        // Case 1: no competing bid carries a maxBid. The increment is read
        // at the auction's own current price.
        None => {
            let inc = input
                .custom_step
                .unwrap_or_else(|| ladder.increment(input.current_price));
            let formula_floor = input.current_price + inc;

            let user_bid_amount = input.user_max.min(formula_floor);
            let would_win = user_bid_amount >= formula_floor;
            let is_max_bid_reached =
                user_bid_amount == input.user_max && input.user_max < formula_floor;
            Decision {
                user_bid_amount,
                would_win,
                competitor_auto_bids: Vec::new(),
                new_visible_price: if would_win {
                    user_bid_amount
                } else {
                    input.current_price
                },
                is_max_bid_reached,
                message: if would_win {
                    "new leading bid".to_string()
                } else {
                    "bid below minimum next bid".to_string()
                },
            }
        }

        Some(h) if input.user_max > h.max_bid => {
            // Case 2: user wins with the second-price formula. The
            // increment is read at H's ceiling, the price level being
            // raised to, not the auction's (possibly much lower) stale
            // current price.
            let inc = input
                .custom_step
                .unwrap_or_else(|| ladder.increment(h.max_bid));
            let mut user_bid_amount = h.max_bid + inc;

            // Reserve jump (§4.4): formula price strictly below reserve, but
            // the user's ceiling clears it.
            if let Some(reserve) = input.reserve_price {
                if input.user_max >= reserve && user_bid_amount < reserve {
                    user_bid_amount = reserve;
                }
            }

            let competitor_auto_bids = vec![CompetitorAutoBid {
                user_id: h.user_id,
                amount: h.max_bid,
                is_max_bid_reached: true,
                message: "max reached".to_string(),
            }];

            Decision {
                user_bid_amount,
                would_win: true,
                competitor_auto_bids,
                new_visible_price: user_bid_amount,
                is_max_bid_reached: user_bid_amount >= input.user_max,
                message: "new leading bid".to_string(),
            }
        }

        Some(h) if input.user_max == h.max_bid => {
            // Case 3: tie, earlier timestamp keeps leadership.
            Decision {
                user_bid_amount: input.user_max,
                would_win: false,
                competitor_auto_bids: Vec::new(),
                new_visible_price: input.current_price,
                is_max_bid_reached: true,
                message: "tied with current leader, earlier bid keeps lead".to_string(),
            }
        }

        Some(_) => {
            // Case 4: user's ceiling is below the competitor's.
            Decision {
                user_bid_amount: input.user_max,
                would_win: false,
                competitor_auto_bids: Vec::new(),
                new_visible_price: input.current_price,
                is_max_bid_reached: true,
                message: "outbid by a higher standing max bid".to_string(),
            }
        }
    }
}
