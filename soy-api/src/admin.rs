use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use soy_booking::{BookingStats, TimeRange};
use soy_core::booking::{Booking, RawStatusPatch};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    pub amount: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    #[serde(alias = "timeRange")]
    pub time_range: Option<String>,
}

/// Admin routes; the caller wraps them in `admin_auth_middleware`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/bookings", get(list_bookings))
        .route("/api/admin/bookings/{id}", put(update_booking))
        .route("/api/admin/bookings/{id}/refund", post(refund_booking))
        .route("/api/admin/stats", get(stats))
}

async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_all().await?))
}

async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<RawStatusPatch>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.admin_update(id, patch).await?))
}

async fn refund_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RefundRequest>>,
) -> Result<Json<Booking>, AppError> {
    let amount = body.and_then(|Json(req)| req.amount);
    Ok(Json(state.bookings.refund(id, amount).await?))
}

async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<BookingStats>, AppError> {
    let range = TimeRange::parse_lenient(query.time_range.as_deref());
    Ok(Json(state.bookings.stats(range).await?))
}
