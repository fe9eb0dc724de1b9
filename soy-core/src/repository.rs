use async_trait::async_trait;
use uuid::Uuid;

use crate::account::Customer;
use crate::booking::{Booking, BookingDraft, PaymentState, StatusPatch};
use crate::coupon::Coupon;
use crate::event::Event;
use crate::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Referral code {0} is no longer available")]
    ReferralUnavailable(String),
    #[error("Booking reference {0} already exists")]
    DuplicateReference(String),
    #[error("Booking {0} was modified concurrently")]
    StaleWrite(Uuid),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new booking. Every reference in `consume_referrals` is flipped to
    /// used in the same unit of work; if any of them is already used nothing is written.
    async fn create(&self, draft: BookingDraft, consume_referrals: &[String]) -> StoreResult<Booking>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Booking>>;

    async fn find_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Booking>>;

    /// Booking with the given reference that has not yet been redeemed as a referral.
    async fn find_unused_referral(&self, reference: &str) -> StoreResult<Option<Booking>>;

    /// Apply an admin patch if the stored payment columns still equal `expected`.
    /// `Ok(None)` when the booking does not exist, `StaleWrite` when it changed.
    async fn update_status(
        &self,
        id: Uuid,
        patch: &StatusPatch,
        expected: &PaymentState,
    ) -> StoreResult<Option<Booking>>;

    /// Write back the payment and lifecycle columns of an already persisted booking.
    /// Compare-and-set: fails with `StaleWrite` unless the stored payment columns
    /// still equal `expected`, the state the change was computed from.
    async fn save_payment_state(&self, booking: &Booking, expected: &PaymentState) -> StoreResult<()>;

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn list_all(&self) -> StoreResult<Vec<Booking>>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_active_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>>;
}
