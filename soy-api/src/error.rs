use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use soy_booking::BookingError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    Booking(BookingError),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Booking(err) => {
                let status = booking_status(&err);
                let code = err.code();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, code, "Internal Server Error".to_string())
                } else {
                    (status, code, err.to_string())
                }
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal Server Error".to_string())
            }
        }
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::Validation(_)
        | BookingError::InvalidCoupon(_)
        | BookingError::TooManyReferralCodes(_)
        | BookingError::DuplicateReferralCode(_)
        | BookingError::InvalidReferralCode(_)
        | BookingError::SignatureMismatch => StatusCode::BAD_REQUEST,
        BookingError::BookingNotFound(_) | BookingError::NotFound(_) | BookingError::MockPaymentsDisabled => {
            StatusCode::NOT_FOUND
        }
        BookingError::AlreadyPaid
        | BookingError::InvalidTransition { .. }
        | BookingError::ConcurrentUpdate(_)
        | BookingError::CancellationNotAllowed(_) => StatusCode::CONFLICT,
        BookingError::Forbidden => StatusCode::FORBIDDEN,
        BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = self.parts();

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
