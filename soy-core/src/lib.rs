pub mod account;
pub mod booking;
pub mod coupon;
pub mod event;
pub mod repository;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("This booking has already been paid")]
    AlreadyPaid,
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Booking cannot be cancelled: {0}")]
    CancellationNotAllowed(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
