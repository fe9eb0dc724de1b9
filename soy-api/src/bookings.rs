use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use soy_booking::{BookingView, NewBooking, PaymentRequest};
use soy_core::booking::Booking;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BookingIdRequest {
    #[serde(alias = "bookingId")]
    pub booking_id: Uuid,
}

/// Customer routes; the caller wraps them in `customer_auth_middleware`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/my-bookings", get(my_bookings))
        .route("/api/bookings/initiate-payment", post(initiate_payment))
        .route("/api/bookings/mock-payment/success", post(mock_payment_success))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create_booking(user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    Ok(Json(state.bookings.my_bookings(user.user_id).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    Ok(Json(state.bookings.get_booking(id, &user.actor()).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel(id, &user.actor()).await?))
}

async fn initiate_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<BookingIdRequest>,
) -> Result<Json<PaymentRequest>, AppError> {
    let request = state.bookings.initiate_payment(req.booking_id, &user.actor()).await?;
    Ok(Json(request))
}

async fn mock_payment_success(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<BookingIdRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.mock_payment_success(req.booking_id, &user.actor()).await?))
}
