use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use soy_shared::{reference, Masked};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 10;

/// Hours that must remain before the event for a customer cancellation.
pub const CANCELLATION_WINDOW_HOURS: i64 = 24;

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TicketType {
    General,
    #[serde(rename = "PC")]
    Pc,
    Associate,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::General => "General",
            TicketType::Pc => "PC",
            TicketType::Associate => "Associate",
        }
    }
}

impl FromStr for TicketType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "General" => Ok(TicketType::General),
            "PC" => Ok(TicketType::Pc),
            "Associate" => Ok(TicketType::Associate),
            other => Err(CoreError::ValidationError(format!("Unknown ticket type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::ValidationError(format!("Unknown payment status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Upi,
    Netbanking,
    Wallet,
    DemoPayment,
    Payu,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Netbanking => "netbanking",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::DemoPayment => "demo_payment",
            PaymentMethod::Payu => "payu",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "netbanking" => Ok(PaymentMethod::Netbanking),
            "wallet" => Ok(PaymentMethod::Wallet),
            "demo_payment" => Ok(PaymentMethod::DemoPayment),
            "payu" => Ok(PaymentMethod::Payu),
            other => Err(CoreError::ValidationError(format!("Unknown payment method: {}", other))),
        }
    }
}

/// Booking lifecycle status, independent of the payment status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Attended,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Attended => "attended",
            BookingStatus::NoShow => "no-show",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "attended" => Ok(BookingStatus::Attended),
            "no-show" => Ok(BookingStatus::NoShow),
            other => Err(CoreError::ValidationError(format!("Unknown booking status: {}", other))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Attendees
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl Attendee {
    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ValidationError("Attendee name is required".to_string()));
        }
        if !looks_like_email(&self.email) {
            return Err(CoreError::ValidationError(format!(
                "Please enter a valid email for attendee {}",
                self.name
            )));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

// ============================================================================
// Draft & Booking
// ============================================================================

/// Unpersisted booking as assembled by the booking service.
#[derive(Debug, Clone, Default)]
pub struct BookingDraft {
    pub booking_reference: Option<String>,
    pub user_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub ticket_type: Option<TicketType>,
    pub quantity: Option<i32>,
    pub total_amount: Option<i64>,
    pub discount_amount: i64,
    pub coupon_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub referral_codes_used: Vec<String>,
    pub aadhar_number: Masked<String>,
    pub tshirt_size: Option<String>,
    pub attendees: Vec<Attendee>,
}

impl BookingDraft {
    pub fn validate(&self) -> CoreResult<()> {
        if self.user_id.is_none() {
            return Err(CoreError::ValidationError("User is required".to_string()));
        }
        if self.ticket_type.is_none() {
            return Err(CoreError::ValidationError("Ticket type is required".to_string()));
        }
        if self.aadhar_number.expose().trim().is_empty() {
            return Err(CoreError::ValidationError("Aadhar number is required".to_string()));
        }

        let quantity = self.quantity.unwrap_or(MIN_QUANTITY);
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
            return Err(CoreError::ValidationError(format!(
                "Quantity must be between {} and {}",
                MIN_QUANTITY, MAX_QUANTITY
            )));
        }

        match self.total_amount {
            None => return Err(CoreError::ValidationError("Total amount is required".to_string())),
            Some(amount) if amount < 0 => {
                return Err(CoreError::ValidationError("Total amount cannot be negative".to_string()))
            }
            Some(_) => {}
        }
        if self.discount_amount < 0 {
            return Err(CoreError::ValidationError("Discount amount cannot be negative".to_string()));
        }

        if self.referral_codes_used.len() > 2 {
            return Err(CoreError::ValidationError(
                "A booking can consume at most 2 referral codes".to_string(),
            ));
        }

        for attendee in &self.attendees {
            attendee.validate()?;
        }

        Ok(())
    }
}

/// One ticket purchase attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: String,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub ticket_type: TicketType,
    pub quantity: i32,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_id: Option<String>,
    pub status: BookingStatus,
    pub coupon_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub referral_codes_used: Vec<String>,
    pub referral_coupon_used: bool,
    pub aadhar_number: Masked<String>,
    pub tshirt_size: Option<String>,
    pub attendees: Vec<Attendee>,
    pub gateway_response: Option<serde_json::Value>,
    pub refund_amount: i64,
    pub refund_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The columns a conditional payment write expects to find unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentState {
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub status: BookingStatus,
}

impl Booking {
    pub fn payment_state(&self) -> PaymentState {
        PaymentState {
            payment_status: self.payment_status,
            payment_id: self.payment_id.clone(),
            status: self.status,
        }
    }

    /// Validate a draft and turn it into a new `(pending, confirmed)` booking.
    /// The reference is generated with `reference_prefix` unless the draft carries one.
    pub fn from_draft(draft: BookingDraft, reference_prefix: &str, now: DateTime<Utc>) -> CoreResult<Self> {
        draft.validate()?;

        let booking_reference = match draft.booking_reference {
            Some(existing) if !existing.trim().is_empty() => existing,
            _ => reference::generate(reference_prefix),
        };

        // validate() guarantees these are present
        let user_id = draft
            .user_id
            .ok_or_else(|| CoreError::ValidationError("User is required".to_string()))?;
        let ticket_type = draft
            .ticket_type
            .ok_or_else(|| CoreError::ValidationError("Ticket type is required".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            booking_reference,
            user_id,
            event_id: draft.event_id,
            ticket_type,
            quantity: draft.quantity.unwrap_or(MIN_QUANTITY),
            total_amount: draft.total_amount.unwrap_or_default(),
            discount_amount: draft.discount_amount,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            payment_id: None,
            status: BookingStatus::Confirmed,
            coupon_id: draft.coupon_id,
            coupon_code: draft.coupon_code,
            referral_codes_used: draft.referral_codes_used,
            referral_coupon_used: false,
            aadhar_number: draft.aadhar_number,
            tshirt_size: draft.tshirt_size,
            attendees: draft.attendees,
            gateway_response: None,
            refund_amount: 0,
            refund_processed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Transition: pending|failed → pending, recording the new gateway transaction id.
    pub fn begin_payment(&mut self, transaction_id: &str, now: DateTime<Utc>) -> CoreResult<()> {
        match self.payment_status {
            PaymentStatus::Completed => Err(CoreError::AlreadyPaid),
            PaymentStatus::Refunded => Err(self.invalid_transition(PaymentStatus::Pending)),
            PaymentStatus::Pending | PaymentStatus::Failed => {
                self.payment_status = PaymentStatus::Pending;
                self.payment_id = Some(transaction_id.to_string());
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// Transition: pending|failed → completed. Returns `false` when the booking was
    /// already completed, in which case nothing is changed.
    pub fn complete_payment(
        &mut self,
        payment_id: String,
        method: PaymentMethod,
        gateway_response: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        match self.payment_status {
            PaymentStatus::Completed => Ok(false),
            PaymentStatus::Refunded => Err(self.invalid_transition(PaymentStatus::Completed)),
            PaymentStatus::Pending | PaymentStatus::Failed => {
                self.payment_status = PaymentStatus::Completed;
                self.status = BookingStatus::Confirmed;
                self.payment_id = Some(payment_id);
                self.payment_method = Some(method);
                if gateway_response.is_some() {
                    self.gateway_response = gateway_response;
                }
                self.updated_at = now;
                Ok(true)
            }
        }
    }

    /// Transition: pending → failed. The lifecycle `status` stays as it is so the
    /// customer can start another payment attempt. Returns `false` when already failed.
    pub fn fail_payment(
        &mut self,
        gateway_response: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        match self.payment_status {
            PaymentStatus::Failed => Ok(false),
            PaymentStatus::Pending => {
                self.payment_status = PaymentStatus::Failed;
                if gateway_response.is_some() {
                    self.gateway_response = gateway_response;
                }
                self.updated_at = now;
                Ok(true)
            }
            PaymentStatus::Completed | PaymentStatus::Refunded => {
                Err(self.invalid_transition(PaymentStatus::Failed))
            }
        }
    }

    /// Transition: completed → refunded. Defaults to refunding the full amount.
    pub fn refund(&mut self, amount: Option<i64>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_status != PaymentStatus::Completed {
            return Err(self.invalid_transition(PaymentStatus::Refunded));
        }

        let amount = amount.unwrap_or(self.total_amount);
        if amount < 0 || amount > self.total_amount {
            return Err(CoreError::ValidationError(format!(
                "Refund amount must be between 0 and {}",
                self.total_amount
            )));
        }

        self.payment_status = PaymentStatus::Refunded;
        self.refund_amount = amount;
        self.refund_processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Derived cancellation eligibility; never stored.
    pub fn can_cancel(&self, event_starts_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(starts_at) = event_starts_at else {
            return false;
        };

        self.status == BookingStatus::Confirmed
            && self.payment_status == PaymentStatus::Completed
            && starts_at - now > Duration::hours(CANCELLATION_WINDOW_HOURS)
    }

    pub fn cancel(&mut self, event_starts_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.can_cancel(event_starts_at, now) {
            return Err(CoreError::CancellationNotAllowed(format!(
                "only paid, confirmed bookings can be cancelled more than {} hours before the event",
                CANCELLATION_WINDOW_HOURS
            )));
        }

        self.status = BookingStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    fn invalid_transition(&self, to: PaymentStatus) -> CoreError {
        CoreError::InvalidTransition {
            from: self.payment_status.to_string(),
            to: to.to_string(),
        }
    }
}

// ============================================================================
// Status patches
// ============================================================================

/// Untyped partial update as received from an admin client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatusPatch {
    pub payment_status: Option<String>,
    pub status: Option<String>,
    pub payment_id: Option<String>,
    pub payment_method: Option<String>,
}

/// Typed partial update of the status columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusPatch {
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<BookingStatus>,
    pub payment_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

impl StatusPatch {
    /// Values outside the enumerations are dropped rather than rejected, so older
    /// clients sending extra states still get their valid fields applied.
    pub fn from_raw(raw: RawStatusPatch) -> Self {
        Self {
            payment_status: parse_or_drop("payment_status", raw.payment_status),
            status: parse_or_drop("status", raw.status),
            payment_id: raw.payment_id.filter(|id| !id.trim().is_empty()),
            payment_method: parse_or_drop("payment_method", raw.payment_method),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payment_status.is_none()
            && self.status.is_none()
            && self.payment_id.is_none()
            && self.payment_method.is_none()
    }

    /// Apply the patch; a booking may only end up `completed` with a payment id and method.
    /// Settled payments (`completed`, `refunded`) keep their payment status; refunds go
    /// through [`Booking::refund`].
    pub fn apply_to(&self, booking: &mut Booking, now: DateTime<Utc>) -> CoreResult<()> {
        if let Some(next) = self.payment_status {
            if next != booking.payment_status && !patchable_transition(booking.payment_status, next) {
                return Err(booking.invalid_transition(next));
            }
        }

        let mut patched = booking.clone();

        if let Some(payment_status) = self.payment_status {
            patched.payment_status = payment_status;
        }
        if let Some(status) = self.status {
            patched.status = status;
        }
        if let Some(payment_id) = &self.payment_id {
            patched.payment_id = Some(payment_id.clone());
        }
        if let Some(method) = self.payment_method {
            patched.payment_method = Some(method);
        }

        if patched.payment_status == PaymentStatus::Completed
            && (patched.payment_id.is_none() || patched.payment_method.is_none())
        {
            return Err(CoreError::ValidationError(
                "Completed bookings require a payment id and payment method".to_string(),
            ));
        }

        patched.updated_at = now;
        *booking = patched;
        Ok(())
    }
}

fn patchable_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    matches!(
        (from, to),
        (PaymentStatus::Pending | PaymentStatus::Failed, PaymentStatus::Pending)
            | (PaymentStatus::Pending | PaymentStatus::Failed, PaymentStatus::Failed)
            | (PaymentStatus::Pending | PaymentStatus::Failed, PaymentStatus::Completed)
    )
}

fn parse_or_drop<T: FromStr>(field: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::debug!("Dropping unknown {} value '{}' from status patch", field, value);
            None
        }
    }
}
