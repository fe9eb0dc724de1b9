use soy_core::repository::StoreError;
use soy_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid or inactive coupon code: {0}")]
    InvalidCoupon(String),

    #[error("You can use a maximum of {0} referral codes")]
    TooManyReferralCodes(usize),

    #[error("Referral code {0} was entered more than once")]
    DuplicateReferralCode(String),

    #[error("Invalid or already used referral code: {0}")]
    InvalidReferralCode(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("This booking has already been paid")]
    AlreadyPaid,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Booking {0} was updated by another request; reload and retry")]
    ConcurrentUpdate(String),

    #[error("Booking cannot be cancelled: {0}")]
    CancellationNotAllowed(String),

    #[error("Not authorized to access this booking")]
    Forbidden,

    #[error("Payment signature mismatch")]
    SignatureMismatch,

    #[error("Mock payments are disabled")]
    MockPaymentsDisabled,

    #[error("Storage failure: {0}")]
    Store(String),
}

impl BookingError {
    /// Stable machine-readable code returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::InvalidCoupon(_) => "INVALID_COUPON",
            BookingError::TooManyReferralCodes(_) => "TOO_MANY_REFERRAL_CODES",
            BookingError::DuplicateReferralCode(_) => "DUPLICATE_REFERRAL_CODE",
            BookingError::InvalidReferralCode(_) => "INVALID_REFERRAL_CODE",
            BookingError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::AlreadyPaid => "ALREADY_PAID",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::ConcurrentUpdate(_) => "CONCURRENT_UPDATE",
            BookingError::CancellationNotAllowed(_) => "CANCELLATION_NOT_ALLOWED",
            BookingError::Forbidden => "FORBIDDEN",
            BookingError::SignatureMismatch => "SIGNATURE_MISMATCH",
            BookingError::MockPaymentsDisabled => "MOCK_PAYMENTS_DISABLED",
            BookingError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<CoreError> for BookingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => BookingError::Validation(msg),
            CoreError::AlreadyPaid => BookingError::AlreadyPaid,
            CoreError::InvalidTransition { from, to } => BookingError::InvalidTransition { from, to },
            CoreError::CancellationNotAllowed(msg) => BookingError::CancellationNotAllowed(msg),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            // Lost the race for a referral source between quoting and persisting
            StoreError::ReferralUnavailable(code) => BookingError::InvalidReferralCode(code),
            StoreError::StaleWrite(id) => BookingError::ConcurrentUpdate(id.to_string()),
            StoreError::Core(core) => core.into(),
            other => BookingError::Store(other.to_string()),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
