use std::collections::HashSet;
use std::sync::Arc;

use soy_core::coupon::Coupon;
use soy_core::repository::{BookingRepository, CouponRepository};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};

pub const MAX_REFERRAL_CODES: usize = 2;
pub const DEFAULT_REFERRAL_DISCOUNT: i64 = 50;

/// Priced outcome of a booking form, before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountQuote {
    pub discount_amount: i64,
    pub final_amount: i64,
    pub applied_coupon_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub consumed_referral_references: Vec<String>,
}

pub fn final_amount(base_price: i64, discount_amount: i64) -> i64 {
    (base_price - discount_amount).max(0)
}

/// Split a comma separated referral field into distinct codes, preserving input order.
pub fn parse_referral_codes(input: Option<&str>) -> BookingResult<Vec<String>> {
    let Some(input) = input else {
        return Ok(Vec::new());
    };

    let codes: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect();

    if codes.len() > MAX_REFERRAL_CODES {
        return Err(BookingError::TooManyReferralCodes(MAX_REFERRAL_CODES));
    }

    let mut seen = HashSet::new();
    for code in &codes {
        if !seen.insert(code.as_str()) {
            return Err(BookingError::DuplicateReferralCode(code.clone()));
        }
    }

    Ok(codes)
}

/// Prices a booking from the base price, an optional coupon and up to two referral codes.
pub struct DiscountCalculator {
    coupons: Arc<dyn CouponRepository>,
    bookings: Arc<dyn BookingRepository>,
    referral_discount: i64,
}

impl DiscountCalculator {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        bookings: Arc<dyn BookingRepository>,
        referral_discount: i64,
    ) -> Self {
        Self {
            coupons,
            bookings,
            referral_discount,
        }
    }

    /// Look up an active coupon by exact code.
    pub async fn find_coupon(&self, code: &str) -> BookingResult<Coupon> {
        let Some(code) = Coupon::normalize_code(code) else {
            return Err(BookingError::Validation("Coupon code is required".to_string()));
        };

        self.coupons
            .find_active_by_code(code)
            .await?
            .ok_or_else(|| BookingError::InvalidCoupon(code.to_string()))
    }

    /// Read-only: referral sources are only checked here, consumption happens when
    /// the booking is persisted.
    pub async fn quote(
        &self,
        base_price: i64,
        coupon_code: Option<&str>,
        referral_input: Option<&str>,
    ) -> BookingResult<DiscountQuote> {
        let mut discount_amount = 0;
        let mut applied_coupon_id = None;
        let mut applied_code = None;

        if let Some(code) = coupon_code.and_then(Coupon::normalize_code) {
            let coupon = self.find_coupon(code).await?;
            discount_amount += coupon.discount_amount.max(0);
            applied_coupon_id = Some(coupon.id);
            applied_code = Some(coupon.code);
        }

        let referral_codes = parse_referral_codes(referral_input)?;
        for code in &referral_codes {
            if self.bookings.find_unused_referral(code).await?.is_none() {
                return Err(BookingError::InvalidReferralCode(code.clone()));
            }
        }
        discount_amount += self.referral_discount * referral_codes.len() as i64;

        tracing::debug!(
            "Quoted discount {} (coupon: {:?}, referrals: {:?})",
            discount_amount,
            applied_code,
            referral_codes
        );

        Ok(DiscountQuote {
            discount_amount,
            final_amount: final_amount(base_price, discount_amount),
            applied_coupon_id,
            coupon_code: applied_code,
            consumed_referral_references: referral_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soy_core::booking::{Booking, BookingDraft, TicketType};
    use soy_store::memory::InMemoryStore;

    fn calculator(store: &Arc<InMemoryStore>) -> DiscountCalculator {
        DiscountCalculator::new(store.clone(), store.clone(), DEFAULT_REFERRAL_DISCOUNT)
    }

    async fn seed_booking(store: &InMemoryStore) -> Booking {
        let draft = BookingDraft {
            user_id: Some(Uuid::new_v4()),
            ticket_type: Some(TicketType::General),
            quantity: Some(1),
            total_amount: Some(1311),
            aadhar_number: "123412341234".into(),
            ..Default::default()
        };
        store.create(draft, &[]).await.unwrap()
    }

    #[test]
    fn test_final_amount_never_negative() {
        assert_eq!(final_amount(1311, 150), 1161);
        assert_eq!(final_amount(100, 150), 0);
        assert_eq!(final_amount(0, 0), 0);
    }

    #[test]
    fn test_parse_referral_codes() {
        assert!(parse_referral_codes(None).unwrap().is_empty());
        assert!(parse_referral_codes(Some(" , ")).unwrap().is_empty());
        assert_eq!(
            parse_referral_codes(Some(" SOY3-A-1 , SOY3-B-2 ")).unwrap(),
            vec!["SOY3-A-1".to_string(), "SOY3-B-2".to_string()]
        );
        assert!(matches!(
            parse_referral_codes(Some("A,B,C")),
            Err(BookingError::TooManyReferralCodes(2))
        ));
        assert!(matches!(
            parse_referral_codes(Some("A, A")),
            Err(BookingError::DuplicateReferralCode(code)) if code == "A"
        ));
    }

    #[tokio::test]
    async fn test_coupon_and_referral_discount() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_coupon("COLLEGE100", 100, true);
        let referrer = seed_booking(&store).await;

        let quote = calculator(&store)
            .quote(1311, Some("COLLEGE100"), Some(&referrer.booking_reference))
            .await
            .unwrap();

        assert_eq!(quote.discount_amount, 150);
        assert_eq!(quote.final_amount, 1161);
        assert_eq!(quote.coupon_code.as_deref(), Some("COLLEGE100"));
        assert_eq!(quote.consumed_referral_references, vec![referrer.booking_reference.clone()]);

        // Quoting never consumes the referral
        let source = store.find_by_id(referrer.id).await.unwrap().unwrap();
        assert!(!source.referral_coupon_used);
    }

    #[tokio::test]
    async fn test_inactive_or_unknown_coupon_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_coupon("OLD50", 50, false);

        let result = calculator(&store).quote(1311, Some("OLD50"), None).await;
        assert!(matches!(result, Err(BookingError::InvalidCoupon(code)) if code == "OLD50"));

        let result = calculator(&store).quote(1311, Some("NOPE"), None).await;
        assert!(matches!(result, Err(BookingError::InvalidCoupon(_))));

        // Blank input means no coupon
        let quote = calculator(&store).quote(1311, Some("   "), None).await.unwrap();
        assert_eq!(quote.final_amount, 1311);
    }

    #[tokio::test]
    async fn test_unknown_referral_aborts_whole_quote() {
        let store = Arc::new(InMemoryStore::new());
        let referrer = seed_booking(&store).await;
        let input = format!("{},SOY3-MISSING-00000", referrer.booking_reference);

        let result = calculator(&store).quote(1311, None, Some(&input)).await;
        assert!(matches!(result, Err(BookingError::InvalidReferralCode(code)) if code == "SOY3-MISSING-00000"));
    }

    #[tokio::test]
    async fn test_used_referral_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let referrer = seed_booking(&store).await;

        let draft = BookingDraft {
            user_id: Some(Uuid::new_v4()),
            ticket_type: Some(TicketType::Pc),
            total_amount: Some(1261),
            discount_amount: 50,
            aadhar_number: "999988887777".into(),
            referral_codes_used: vec![referrer.booking_reference.clone()],
            ..Default::default()
        };
        store
            .create(draft, &[referrer.booking_reference.clone()])
            .await
            .unwrap();

        let result = calculator(&store)
            .quote(1311, None, Some(&referrer.booking_reference))
            .await;
        assert!(matches!(result, Err(BookingError::InvalidReferralCode(_))));
    }
}
