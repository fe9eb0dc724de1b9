//! In-process store implementing every repository trait. Used by tests and by
//! `database.in_memory = true` demo runs; data is lost on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use soy_core::account::{Customer, Role};
use soy_core::booking::{Booking, BookingDraft, PaymentState, StatusPatch};
use soy_core::coupon::Coupon;
use soy_core::event::Event;
use soy_core::repository::{
    BookingRepository, CouponRepository, CustomerRepository, EventRepository, StoreError, StoreResult,
};
use soy_shared::reference;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    bookings: HashMap<Uuid, Booking>,
    coupons: HashMap<String, Coupon>,
    customers: HashMap<Uuid, Customer>,
    events: HashMap<Uuid, Event>,
}

impl MemoryState {
    fn booking_by(&self, predicate: impl Fn(&Booking) -> bool) -> Option<Booking> {
        self.bookings.values().find(|b| predicate(b)).cloned()
    }

    fn newest_first(&self, predicate: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.values().filter(|b| predicate(b)).cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // Writes are applied whole, so a poisoned lock still guards consistent data
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_coupon(&self, code: &str, discount_amount: i64, is_active: bool) -> Coupon {
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: code.to_string(),
            discount_amount,
            is_active,
        };
        self.state().coupons.insert(coupon.code.clone(), coupon.clone());
        coupon
    }

    pub fn insert_customer(&self, first_name: &str, email: &str) -> Customer {
        self.upsert_customer(Customer {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: String::new(),
            email: email.to_string(),
            phone: None,
            role: Role::User,
        })
    }

    pub fn upsert_customer(&self, customer: Customer) -> Customer {
        self.state().customers.insert(customer.id, customer.clone());
        customer
    }

    pub fn insert_event(&self, title: &str, starts_at: DateTime<Utc>) -> Event {
        let event = Event {
            id: Uuid::new_v4(),
            title: title.to_string(),
            starts_at,
        };
        self.state().events.insert(event.id, event.clone());
        event
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create(&self, draft: BookingDraft, consume_referrals: &[String]) -> StoreResult<Booking> {
        let booking = Booking::from_draft(draft, reference::DEFAULT_PREFIX, Utc::now())?;

        // Check, flip and insert under one lock so concurrent redemptions serialize
        let mut state = self.state();

        let mut sources = Vec::with_capacity(consume_referrals.len());
        for code in consume_referrals {
            let source = state
                .bookings
                .values()
                .find(|b| &b.booking_reference == code && !b.referral_coupon_used)
                .map(|b| b.id)
                .ok_or_else(|| StoreError::ReferralUnavailable(code.clone()))?;
            sources.push(source);
        }

        if state
            .bookings
            .values()
            .any(|b| b.booking_reference == booking.booking_reference)
        {
            return Err(StoreError::DuplicateReference(booking.booking_reference));
        }

        let now = Utc::now();
        for id in sources {
            if let Some(source) = state.bookings.get_mut(&id) {
                source.referral_coupon_used = true;
                source.updated_at = now;
            }
        }

        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.state().bookings.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Booking>> {
        Ok(self.state().booking_by(|b| b.booking_reference == reference))
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Booking>> {
        Ok(self
            .state()
            .booking_by(|b| b.payment_id.as_deref() == Some(payment_id)))
    }

    async fn find_unused_referral(&self, reference: &str) -> StoreResult<Option<Booking>> {
        Ok(self
            .state()
            .booking_by(|b| b.booking_reference == reference && !b.referral_coupon_used))
    }

    async fn update_status(
        &self,
        id: Uuid,
        patch: &StatusPatch,
        expected: &PaymentState,
    ) -> StoreResult<Option<Booking>> {
        let mut state = self.state();
        let Some(booking) = state.bookings.get_mut(&id) else {
            return Ok(None);
        };
        if booking.payment_state() != *expected {
            return Err(StoreError::StaleWrite(id));
        }

        patch.apply_to(booking, Utc::now())?;
        Ok(Some(booking.clone()))
    }

    async fn save_payment_state(&self, booking: &Booking, expected: &PaymentState) -> StoreResult<()> {
        let mut state = self.state();
        let stored = match state.bookings.get_mut(&booking.id) {
            Some(stored) if stored.payment_state() == *expected => stored,
            _ => return Err(StoreError::StaleWrite(booking.id)),
        };

        stored.payment_status = booking.payment_status;
        stored.payment_method = booking.payment_method;
        stored.payment_id = booking.payment_id.clone();
        stored.status = booking.status;
        stored.gateway_response = booking.gateway_response.clone();
        stored.refund_amount = booking.refund_amount;
        stored.refund_processed_at = booking.refund_processed_at;
        stored.updated_at = booking.updated_at;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(self.state().newest_first(|b| b.user_id == user_id))
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        Ok(self.state().newest_first(|_| true))
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn find_active_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        Ok(self
            .state()
            .coupons
            .get(code)
            .filter(|coupon| coupon.is_active)
            .cloned())
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.state().customers.get(&id).cloned())
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.state().events.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soy_core::booking::{PaymentMethod, PaymentStatus, TicketType};

    fn draft() -> BookingDraft {
        BookingDraft {
            user_id: Some(Uuid::new_v4()),
            ticket_type: Some(TicketType::Associate),
            total_amount: Some(1311),
            aadhar_number: "123412341234".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_reference_once() {
        let store = InMemoryStore::new();
        let booking = store.create(draft(), &[]).await.unwrap();
        assert!(booking.booking_reference.starts_with("SOY3-"));

        let mut paid = booking.clone();
        paid.complete_payment("TXN1".to_string(), PaymentMethod::Card, None, Utc::now())
            .unwrap();
        store.save_payment_state(&paid, &booking.payment_state()).await.unwrap();

        let stored = store.find_by_reference(&booking.booking_reference).await.unwrap().unwrap();
        assert_eq!(stored.id, booking.id);
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
        assert_eq!(stored.booking_reference, booking.booking_reference);
        assert_eq!(store.find_by_payment_id("TXN1").await.unwrap().unwrap().id, booking.id);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_rejected() {
        let store = InMemoryStore::new();
        let mut first = draft();
        first.booking_reference = Some("SOY3-SAME-00000".to_string());
        let mut second = draft();
        second.booking_reference = Some("SOY3-SAME-00000".to_string());

        store.create(first, &[]).await.unwrap();
        assert!(matches!(
            store.create(second, &[]).await,
            Err(StoreError::DuplicateReference(_))
        ));
    }

    #[tokio::test]
    async fn test_referral_consumed_exactly_once() {
        let store = InMemoryStore::new();
        let source = store.create(draft(), &[]).await.unwrap();
        let code = vec![source.booking_reference.clone()];

        store.create(draft(), &code).await.unwrap();
        assert!(store.find_unused_referral(&code[0]).await.unwrap().is_none());

        let result = store.create(draft(), &code).await;
        assert!(matches!(result, Err(StoreError::ReferralUnavailable(_))));
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_referral_leaves_other_sources_untouched() {
        let store = InMemoryStore::new();
        let source = store.create(draft(), &[]).await.unwrap();
        let codes = vec![source.booking_reference.clone(), "SOY3-NOPE-00000".to_string()];

        assert!(store.create(draft(), &codes).await.is_err());
        assert!(store.find_unused_referral(&source.booking_reference).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_draft_is_rejected() {
        let store = InMemoryStore::new();
        let mut bad = draft();
        bad.quantity = Some(0);
        assert!(matches!(store.create(bad, &[]).await, Err(StoreError::Core(_))));
    }

    #[tokio::test]
    async fn test_update_status_unknown_booking() {
        let store = InMemoryStore::new();
        let expected = Booking::from_draft(draft(), "SOY3", Utc::now()).unwrap().payment_state();
        let result = store
            .update_status(Uuid::new_v4(), &StatusPatch::default(), &expected)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_payment_write_from_stale_state_is_refused() {
        let store = InMemoryStore::new();
        let booking = store.create(draft(), &[]).await.unwrap();
        let read_before_payment = booking.payment_state();

        let mut paid = booking.clone();
        paid.complete_payment("TXN1".to_string(), PaymentMethod::Upi, None, Utc::now())
            .unwrap();
        store.save_payment_state(&paid, &read_before_payment).await.unwrap();

        // A retry computed from the pre-payment read must not reopen the booking
        let mut retry = booking.clone();
        retry.begin_payment("TXN2", Utc::now()).unwrap();
        assert!(matches!(
            store.save_payment_state(&retry, &read_before_payment).await,
            Err(StoreError::StaleWrite(id)) if id == booking.id
        ));

        let patch = StatusPatch {
            payment_status: Some(PaymentStatus::Failed),
            ..Default::default()
        };
        assert!(matches!(
            store.update_status(booking.id, &patch, &read_before_payment).await,
            Err(StoreError::StaleWrite(_))
        ));

        let stored = store.find_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
        assert_eq!(stored.payment_id.as_deref(), Some("TXN1"));
    }
}
