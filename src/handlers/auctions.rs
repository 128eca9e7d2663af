//! Auction endpoints (§6). DTO naming follows the teacher's
//! `handlers/auctions.rs` (`AuctionQuery`, `AuctionResponse`, ...).

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Auction, AuctionStatus};
use crate::services::lifecycle::{CreateAuctionParams, UpdateAuctionPatch};
use crate::state::AppState;

use super::{ok, Envelope};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionQuery {
    pub status: Option<AuctionStatus>,
    pub created_by: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResponse {
    #[serde(flatten)]
    pub auction: Auction,
    pub time_remaining: i64,
    pub minimum_bid: i64,
    pub reserve_met: bool,
    pub is_ending_soon: bool,
}

fn with_derived(auction: Auction, state: &AppState) -> AuctionResponse {
    let now = Utc::now();
    let increment = state.ladder.increment(auction.current_price);
    let threshold = chrono::Duration::from_std(state.config.auction.ending_soon_threshold)
        .unwrap_or_else(|_| chrono::Duration::seconds(60));
    AuctionResponse {
        time_remaining: auction.time_remaining(now).num_seconds(),
        minimum_bid: auction.minimum_next_bid(increment),
        reserve_met: auction.reserve_met(),
        is_ending_soon: auction.is_ending_soon(now, threshold),
        auction,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionBody {
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    #[serde(default)]
    pub minimum_bid_increment: Option<i64>,
    pub reserve_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub start_time: chrono::DateTime<Utc>,
    pub end_time: Option<chrono::DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub has_time_limit: bool,
    pub created_by: Uuid,
}

fn default_true() -> bool {
    true
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateAuctionBody>,
) -> AppResult<Json<Envelope<AuctionResponse>>> {
    let auction = state
        .lifecycle
        .create_auction(CreateAuctionParams {
            title: body.title,
            description: body.description,
            starting_price: body.starting_price,
            minimum_bid_increment: body
                .minimum_bid_increment
                .unwrap_or_else(|| state.ladder.increment(body.starting_price)),
            reserve_price: body.reserve_price,
            buy_now_price: body.buy_now_price,
            start_time: body.start_time,
            end_time: body.end_time,
            has_time_limit: body.has_time_limit,
            created_by: body.created_by,
        })
        .await?;
    Ok(ok(with_derived(auction, &state)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<AuctionQuery>,
) -> AppResult<Json<Envelope<Vec<AuctionResponse>>>> {
    let mut auctions = state
        .store
        .get_all_auctions()
        .map_err(|e| AppError::internal(e.to_string()))?;

    if let Some(status) = query.status {
        auctions.retain(|a| a.status == status);
    }
    if let Some(created_by) = query.created_by {
        auctions.retain(|a| a.created_by == created_by);
    }
    auctions.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    let response = auctions
        .into_iter()
        .map(|a| with_derived(a, &state))
        .collect();
    Ok(ok(response))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<AuctionResponse>>> {
    let auction = state
        .store
        .get_auction(id)
        .map_err(|_| AppError::not_found(format!("auction {id} not found")))?;
    Ok(ok(with_derived(auction, &state)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuctionBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starting_price: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_nested_option")]
    pub reserve_price: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_nested_option")]
    pub buy_now_price: Option<Option<i64>>,
    pub end_time: Option<chrono::DateTime<Utc>>,
}

/// Distinguishes "field omitted" from "field explicitly set to null" for
/// nullable patch fields, the way PATCH-style updates in this ecosystem do.
fn deserialize_nested_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAuctionBody>,
) -> AppResult<Json<Envelope<AuctionResponse>>> {
    let auction = state
        .lifecycle
        .update_auction(
            id,
            UpdateAuctionPatch {
                title: body.title,
                description: body.description,
                starting_price: body.starting_price,
                reserve_price: body.reserve_price,
                buy_now_price: body.buy_now_price,
                end_time: body.end_time,
            },
        )
        .await?;
    Ok(ok(with_derived(auction, &state)))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<()>>> {
    state.lifecycle.cancel_auction(id).await?;
    Ok(ok(()))
}

pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<AuctionResponse>>> {
    let auction = state.lifecycle.start_auction(id).await?;
    Ok(ok(with_derived(auction, &state)))
}

pub async fn end(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<AuctionResponse>>> {
    let auction = state.lifecycle.end_auction(id).await?;
    Ok(ok(with_derived(auction, &state)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectWinnerBody {
    pub winner_id: Uuid,
}

pub async fn select_winner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SelectWinnerBody>,
) -> AppResult<Json<Envelope<AuctionResponse>>> {
    let auction = state
        .lifecycle
        .select_winner(id, body.winner_id)
        .await?;
    Ok(ok(with_derived(auction, &state)))
}
