//! Bid endpoints (§6).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Bid, RetractionReason};
use crate::services::bidding::PlaceBidRequest;
use crate::services::retraction::RetractBidRequest;
use crate::state::AppState;

use super::{ok, Envelope};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidBody {
    pub auction_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub max_bid: Option<i64>,
    pub auto_bid_step: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    pub bid: Bid,
    pub is_winning: bool,
}

pub async fn place(
    State(state): State<AppState>,
    Json(body): Json<PlaceBidBody>,
) -> AppResult<Json<Envelope<BidResponse>>> {
    let result = state
        .bidding
        .place_bid(PlaceBidRequest {
            auction_id: body.auction_id,
            user_id: body.user_id,
            amount: body.amount,
            max_bid: body.max_bid,
            auto_bid_step: body.auto_bid_step,
        })
        .await?;
    Ok(ok(BidResponse {
        bid: result.bid,
        is_winning: result.is_winning,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidHistoryResponse {
    pub bids: Vec<Bid>,
}

pub async fn history(
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> AppResult<Json<Envelope<BidHistoryResponse>>> {
    let mut bids = state
        .store
        .get_bids(auction_id, false)
        .map_err(|_| AppError::not_found(format!("auction {auction_id} not found")))?;
    bids.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(ok(BidHistoryResponse { bids }))
}

pub async fn winning_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<Uuid>,
) -> AppResult<Json<Envelope<Option<Bid>>>> {
    let bids = state
        .store
        .get_bids(auction_id, false)
        .map_err(|_| AppError::not_found(format!("auction {auction_id} not found")))?;
    Ok(ok(bids.into_iter().find(|b| b.is_winning)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetractBidBody {
    pub user_id: Uuid,
    pub reason: RetractionReason,
}

pub async fn retract(
    State(state): State<AppState>,
    Path(bid_id): Path<Uuid>,
    Json(body): Json<RetractBidBody>,
) -> AppResult<Json<Envelope<Bid>>> {
    let result = state
        .retraction
        .retract_bid(RetractBidRequest {
            bid_id,
            user_id: body.user_id,
            reason: body.reason,
        })
        .await?;
    Ok(ok(result.bid))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanRetractQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanRetractResponse {
    pub can_retract: bool,
    pub reason: Option<String>,
}

pub async fn can_retract(
    State(state): State<AppState>,
    Path(bid_id): Path<Uuid>,
    Query(query): Query<CanRetractQuery>,
) -> AppResult<Json<Envelope<CanRetractResponse>>> {
    let (can_retract, reason) = state.retraction.can_retract(bid_id, query.user_id)?;
    Ok(ok(CanRetractResponse { can_retract, reason }))
}
