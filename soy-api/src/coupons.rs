use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use soy_core::coupon::Coupon;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    #[serde(default)]
    pub code: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/coupons/validate", post(validate_coupon))
}

async fn validate_coupon(
    State(state): State<AppState>,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<Coupon>, AppError> {
    Ok(Json(state.bookings.validate_coupon(&req.code).await?))
}
