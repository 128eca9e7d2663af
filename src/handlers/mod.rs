//! HTTP surface (§6). Request parsing, routing, and CORS are explicitly out
//! of scope for the core (§1), but a concrete binary needs a concrete
//! surface, so this is grounded on the teacher's `handlers/auctions.rs` DTO
//! style and wired with `axum`, the framework the rest of the retrieved
//! pack reaches for (e.g. the astria and Kaskade manifests).

pub mod auctions;
pub mod bids;
pub mod ws;

use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// `{success: true, data}` / `{success: false, error: {...}}` envelope (§6).
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
        error: None,
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code(),
                message: self.to_string(),
                details: self.details().cloned(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auctions", post(auctions::create).get(auctions::list))
        .route(
            "/auctions/:id",
            get(auctions::detail).put(auctions::update).delete(auctions::cancel),
        )
        .route("/auctions/:id/start", post(auctions::start))
        .route("/auctions/:id/end", post(auctions::end))
        .route("/auctions/:id/select-winner", post(auctions::select_winner))
        .route("/auctions/:id/bids", get(bids::history))
        .route("/auctions/:id/winning-bid", get(bids::winning_bid))
        .route("/bids", post(bids::place))
        .route("/bids/:id/retract", post(bids::retract))
        .route("/bids/:id/can-retract", get(bids::can_retract))
        .route("/ws", get(ws::upgrade))
        .with_state(state)
}
