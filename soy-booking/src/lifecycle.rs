use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soy_core::booking::{
    Attendee, Booking, BookingDraft, PaymentMethod, PaymentState, PaymentStatus, RawStatusPatch,
    StatusPatch, TicketType,
};
use soy_core::coupon::Coupon;
use soy_core::repository::{
    BookingRepository, CouponRepository, CustomerRepository, EventRepository, StoreError,
};
use soy_core::CoreError;
use soy_shared::{reference, Masked};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discount::{DiscountCalculator, DEFAULT_REFERRAL_DISCOUNT};
use crate::error::{BookingError, BookingResult};
use crate::gateway::{CallbackStatus, PaymentRequest, PayuCallback, PayuGateway};
use crate::reporting::{self, BookingStats, TimeRange};

pub const DEFAULT_BASE_PRICE: i64 = 1311;

/// Reconciliation attempts for one callback when concurrent writers keep winning.
const CALLBACK_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct PricingPolicy {
    pub base_price: i64,
    pub referral_discount: i64,
    pub reference_prefix: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_BASE_PRICE,
            referral_discount: DEFAULT_REFERRAL_DISCOUNT,
            reference_prefix: reference::DEFAULT_PREFIX.to_string(),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// Booking form as submitted by a customer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewBooking {
    pub event_id: Option<Uuid>,
    pub ticket_type: Option<String>,
    pub quantity: Option<i32>,
    pub aadhar_number: Masked<String>,
    pub tshirt_size: Option<String>,
    pub attendees: Vec<Attendee>,
    pub coupon_code: Option<String>,
    pub referral_code: Option<String>,
}

/// Booking together with its derived cancellation eligibility.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub can_cancel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The callback resolved to a booking; `payment_status` is its state after processing.
    Settled {
        booking_id: Uuid,
        txnid: String,
        payment_status: PaymentStatus,
    },
    /// Verified, but PayU has not reached a final status yet.
    Unresolved { status: String },
}

impl CallbackOutcome {
    pub fn redirect_status(&self) -> Option<&'static str> {
        match self {
            CallbackOutcome::Settled { payment_status: PaymentStatus::Completed, .. } => Some("success"),
            CallbackOutcome::Settled { .. } => Some("failure"),
            CallbackOutcome::Unresolved { .. } => None,
        }
    }
}

/// Orchestrates booking creation, payment reconciliation and the admin operations.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    customers: Arc<dyn CustomerRepository>,
    events: Arc<dyn EventRepository>,
    discounts: DiscountCalculator,
    gateway: PayuGateway,
    pricing: PricingPolicy,
    enable_mock_payments: bool,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        coupons: Arc<dyn CouponRepository>,
        customers: Arc<dyn CustomerRepository>,
        events: Arc<dyn EventRepository>,
        gateway: PayuGateway,
        pricing: PricingPolicy,
    ) -> Self {
        let discounts = DiscountCalculator::new(coupons, bookings.clone(), pricing.referral_discount);
        Self {
            bookings,
            customers,
            events,
            discounts,
            gateway,
            pricing,
            enable_mock_payments: false,
        }
    }

    pub fn with_mock_payments(mut self, enabled: bool) -> Self {
        self.enable_mock_payments = enabled;
        self
    }

    pub fn gateway(&self) -> &PayuGateway {
        &self.gateway
    }

    // ------------------------------------------------------------------------
    // Customer operations
    // ------------------------------------------------------------------------

    /// Price the form, then persist a pending booking while consuming its referral
    /// sources in the same unit of work.
    pub async fn create_booking(&self, user_id: Uuid, request: NewBooking) -> BookingResult<Booking> {
        let ticket_type = match request.ticket_type.as_deref().map(str::trim) {
            None | Some("") => return Err(BookingError::Validation("Ticket type is required".to_string())),
            Some(raw) => raw.parse::<TicketType>()?,
        };

        let mut attendees = request.attendees;
        if attendees.is_empty() {
            if let Some(customer) = self.customers.find_customer(user_id).await? {
                attendees.push(Attendee {
                    name: customer.full_name(),
                    email: customer.email.clone(),
                    phone: customer.phone.clone(),
                    ..Default::default()
                });
            }
        }

        let mut draft = BookingDraft {
            booking_reference: None,
            user_id: Some(user_id),
            event_id: request.event_id,
            ticket_type: Some(ticket_type),
            quantity: request.quantity,
            total_amount: Some(self.pricing.base_price),
            discount_amount: 0,
            coupon_id: None,
            coupon_code: None,
            referral_codes_used: Vec::new(),
            aadhar_number: request.aadhar_number,
            tshirt_size: request.tshirt_size,
            attendees,
        };
        draft.validate()?;

        let quote = self
            .discounts
            .quote(
                self.pricing.base_price,
                request.coupon_code.as_deref(),
                request.referral_code.as_deref(),
            )
            .await?;

        draft.total_amount = Some(quote.final_amount);
        draft.discount_amount = quote.discount_amount;
        draft.coupon_id = quote.applied_coupon_id;
        draft.coupon_code = quote.coupon_code;
        draft.referral_codes_used = quote.consumed_referral_references.clone();
        draft.booking_reference = Some(reference::generate(&self.pricing.reference_prefix));

        let booking = self
            .bookings
            .create(draft, &quote.consumed_referral_references)
            .await?;

        info!(
            "Created booking {} ({}) for user {}: total {} after discount {}",
            booking.id, booking.booking_reference, user_id, booking.total_amount, booking.discount_amount
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid, actor: &Actor) -> BookingResult<BookingView> {
        let booking = self.load(booking_id).await?;
        ensure_access(&booking, actor)?;
        self.view(booking, Utc::now()).await
    }

    pub async fn my_bookings(&self, user_id: Uuid) -> BookingResult<Vec<BookingView>> {
        let now = Utc::now();
        let mut views = Vec::new();
        for booking in self.bookings.list_for_user(user_id).await? {
            views.push(self.view(booking, now).await?);
        }
        Ok(views)
    }

    pub async fn cancel(&self, booking_id: Uuid, actor: &Actor) -> BookingResult<Booking> {
        let mut booking = self.load(booking_id).await?;
        if booking.user_id != actor.user_id {
            return Err(BookingError::Forbidden);
        }

        let read = booking.payment_state();
        let starts_at = self.event_start(&booking).await?;
        booking.cancel(starts_at, Utc::now())?;
        self.commit(&booking, &read).await?;

        info!("Booking {} cancelled by its owner", booking.id);
        Ok(booking)
    }

    pub async fn validate_coupon(&self, code: &str) -> BookingResult<Coupon> {
        self.discounts.find_coupon(code).await
    }

    // ------------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------------

    /// Build a signed PayU form and move the booking to `pending` under the new txnid.
    pub async fn initiate_payment(&self, booking_id: Uuid, actor: &Actor) -> BookingResult<PaymentRequest> {
        let mut booking = self.load(booking_id).await?;
        ensure_access(&booking, actor)?;
        if booking.payment_status == PaymentStatus::Completed {
            return Err(BookingError::AlreadyPaid);
        }

        let read = booking.payment_state();
        let customer = self.customers.find_customer(booking.user_id).await?;
        let request = self.gateway.build_request(&booking, customer.as_ref());

        booking.begin_payment(&request.txnid, Utc::now())?;
        self.commit(&booking, &read).await?;

        info!("Initiated PayU payment {} for booking {}", request.txnid, booking.id);
        Ok(request)
    }

    /// Verify a PayU callback and reconcile the booking it refers to. Replays of an
    /// already applied terminal state are acknowledged without further writes.
    pub async fn handle_callback(&self, callback: PayuCallback) -> BookingResult<CallbackOutcome> {
        let status = match self.gateway.verify_callback(&callback) {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    "PayU callback hash mismatch for txnid '{}' (udf1 '{}'); possible tampering",
                    callback.txnid, callback.udf1
                );
                return Err(err);
            }
        };

        if let CallbackStatus::Other(status) = status {
            info!("PayU callback for {} reported non-final status '{}'", callback.txnid, status);
            return Ok(CallbackOutcome::Unresolved { status });
        }

        let raw = serde_json::to_value(&callback).ok();

        for attempt in 1..=CALLBACK_ATTEMPTS {
            let (mut booking, superseded) = self.locate_callback_booking(&callback).await?;
            let read = booking.payment_state();
            let now = Utc::now();

            let result = match status {
                CallbackStatus::Success => booking.complete_payment(
                    callback.txnid.clone(),
                    PayuGateway::payment_method_for_mode(&callback.mode),
                    raw.clone(),
                    now,
                ),
                // A newer attempt owns the booking; an old attempt failing changes nothing
                _ if superseded => Ok(false),
                _ => booking.fail_payment(raw.clone(), now),
            };

            match result {
                Ok(true) => match self.bookings.save_payment_state(&booking, &read).await {
                    Ok(()) => {
                        info!(
                            "Booking {} payment {} after PayU callback {}",
                            booking.id, booking.payment_status, callback.txnid
                        );
                    }
                    Err(StoreError::StaleWrite(_)) => {
                        debug!(
                            "Booking {} changed during callback {} (attempt {}), reloading",
                            booking.id, callback.txnid, attempt
                        );
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                },
                Ok(false) if superseded && status == CallbackStatus::Success => {
                    warn!(
                        "PayU reports success for {} but booking {} is already paid under {:?}; check for a double charge",
                        callback.txnid, booking.id, booking.payment_id
                    );
                }
                Ok(false) => {
                    debug!("Duplicate PayU callback {} for booking {}", callback.txnid, booking.id);
                }
                Err(CoreError::InvalidTransition { from, to }) => {
                    // Out-of-order callback against a terminal state; keep what we have
                    warn!(
                        "Ignoring PayU callback {} for booking {}: {} -> {} not allowed",
                        callback.txnid, booking.id, from, to
                    );
                }
                Err(err) => return Err(err.into()),
            }

            return Ok(CallbackOutcome::Settled {
                booking_id: booking.id,
                txnid: callback.txnid,
                payment_status: booking.payment_status,
            });
        }

        warn!("Gave up reconciling PayU callback {} after {} attempts", callback.txnid, CALLBACK_ATTEMPTS);
        Err(BookingError::ConcurrentUpdate(callback.udf1))
    }

    /// Booking a verified callback refers to. Normally found by txnid; when the customer
    /// started a newer attempt meanwhile, the signed `udf1` still names the booking and
    /// the second value is `true`.
    async fn locate_callback_booking(&self, callback: &PayuCallback) -> BookingResult<(Booking, bool)> {
        if let Some(booking) = self.bookings.find_by_payment_id(&callback.txnid).await? {
            return Ok((booking, false));
        }

        let by_udf = match Uuid::parse_str(callback.udf1.trim()) {
            Ok(id) => self.bookings.find_by_id(id).await?,
            Err(_) => None,
        };
        match by_udf {
            Some(booking) => {
                info!(
                    "PayU callback {} is for a superseded attempt on booking {} (current {:?})",
                    callback.txnid, booking.id, booking.payment_id
                );
                Ok((booking, true))
            }
            None => Err(BookingError::BookingNotFound(callback.txnid.clone())),
        }
    }

    /// Development-only shortcut that marks a booking paid without the gateway.
    pub async fn mock_payment_success(&self, booking_id: Uuid, actor: &Actor) -> BookingResult<Booking> {
        if !self.enable_mock_payments {
            return Err(BookingError::MockPaymentsDisabled);
        }

        let mut booking = self.load(booking_id).await?;
        ensure_access(&booking, actor)?;
        let read = booking.payment_state();

        let now = Utc::now();
        let payment_id = format!("mock_payment_{}", now.timestamp_millis());
        if !booking.complete_payment(payment_id, PaymentMethod::DemoPayment, None, now)? {
            return Err(BookingError::AlreadyPaid);
        }
        self.commit(&booking, &read).await?;

        info!("Mock payment recorded for booking {}", booking.id);
        Ok(booking)
    }

    // ------------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------------

    pub async fn list_all(&self) -> BookingResult<Vec<Booking>> {
        Ok(self.bookings.list_all().await?)
    }

    pub async fn admin_update(&self, booking_id: Uuid, raw: RawStatusPatch) -> BookingResult<Booking> {
        let patch = StatusPatch::from_raw(raw);
        let mut booking = self.load(booking_id).await?;
        if patch.is_empty() {
            return Ok(booking);
        }

        // Validate against the current row; the store re-checks it has not moved
        let read = booking.payment_state();
        patch.apply_to(&mut booking, Utc::now())?;

        let updated = self
            .bookings
            .update_status(booking_id, &patch, &read)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;

        info!("Admin updated booking {}: {:?}", booking_id, patch);
        Ok(updated)
    }

    pub async fn refund(&self, booking_id: Uuid, amount: Option<i64>) -> BookingResult<Booking> {
        let mut booking = self.load(booking_id).await?;
        let read = booking.payment_state();
        booking.refund(amount, Utc::now())?;
        self.commit(&booking, &read).await?;

        info!("Refunded {} on booking {}", booking.refund_amount, booking.id);
        Ok(booking)
    }

    pub async fn stats(&self, range: TimeRange) -> BookingResult<BookingStats> {
        let bookings = self.bookings.list_all().await?;
        Ok(reporting::compute_stats(&bookings, range, Utc::now()))
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn load(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))
    }

    /// Persist a transition computed from `read`. Losing to a payment that completed in
    /// the meantime reports `AlreadyPaid`; any other interleaving is a conflict.
    async fn commit(&self, booking: &Booking, read: &PaymentState) -> BookingResult<()> {
        match self.bookings.save_payment_state(booking, read).await {
            Ok(()) => Ok(()),
            Err(StoreError::StaleWrite(id)) => {
                let current = self.load(id).await?;
                warn!(
                    "Discarded write to booking {}: read {} but it is now {}",
                    id, read.payment_status, current.payment_status
                );
                if current.payment_status == PaymentStatus::Completed
                    && read.payment_status != PaymentStatus::Completed
                {
                    Err(BookingError::AlreadyPaid)
                } else {
                    Err(BookingError::ConcurrentUpdate(id.to_string()))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn event_start(&self, booking: &Booking) -> BookingResult<Option<DateTime<Utc>>> {
        let Some(event_id) = booking.event_id else {
            return Ok(None);
        };
        Ok(self.events.find_event(event_id).await?.map(|event| event.starts_at))
    }

    async fn view(&self, booking: Booking, now: DateTime<Utc>) -> BookingResult<BookingView> {
        let starts_at = self.event_start(&booking).await?;
        let can_cancel = booking.can_cancel(starts_at, now);
        Ok(BookingView { booking, can_cancel })
    }
}

fn ensure_access(booking: &Booking, actor: &Actor) -> BookingResult<()> {
    if actor.is_admin || booking.user_id == actor.user_id {
        Ok(())
    } else {
        Err(BookingError::Forbidden)
    }
}
