//! PayU posts the customer's browser back here after checkout. The endpoint is
//! public; authenticity comes from the reverse hash, not from a bearer token.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Form, Router,
};
use soy_booking::{BookingError, CallbackOutcome, PayuCallback};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/bookings/payu-callback", post(payu_callback))
}

async fn payu_callback(State(state): State<AppState>, Form(callback): Form<PayuCallback>) -> Response {
    tracing::debug!("PayU callback for txnid '{}' with status '{}'", callback.txnid, callback.status);

    match state.bookings.handle_callback(callback).await {
        Ok(outcome) => match (&outcome, outcome.redirect_status()) {
            (CallbackOutcome::Settled { booking_id, txnid, .. }, Some(status)) => {
                match state.bookings.gateway().status_redirect(status, *booking_id, txnid) {
                    Ok(target) => Redirect::to(&target).into_response(),
                    Err(err) => AppError::from(err).into_response(),
                }
            }
            _ => (StatusCode::OK, "Status Unknown/Pending").into_response(),
        },
        Err(BookingError::SignatureMismatch) => (StatusCode::BAD_REQUEST, "Hash Mismatch").into_response(),
        Err(BookingError::BookingNotFound(txnid)) => {
            tracing::warn!("PayU callback for unknown txnid '{}'", txnid);
            (StatusCode::NOT_FOUND, "Booking not found").into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}
