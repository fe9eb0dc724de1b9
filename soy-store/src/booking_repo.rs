use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use soy_core::booking::{Attendee, Booking, BookingDraft, PaymentMethod, PaymentState, StatusPatch};
use soy_core::repository::{BookingRepository, StoreError, StoreResult};
use soy_shared::{reference, Masked};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::{db_err, is_unique_violation};

const BOOKING_COLUMNS: &str = "id, booking_reference, user_id, event_id, ticket_type, quantity, \
     total_amount, discount_amount, payment_status, payment_method, payment_id, status, \
     coupon_id, coupon_code, referral_codes_used, referral_coupon_used, aadhar_number, \
     tshirt_size, attendees, gateway_response, refund_amount, refund_processed_at, \
     created_at, updated_at";

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE {}", BOOKING_COLUMNS, clause);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(BookingRow::into_booking).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_reference: String,
    user_id: Uuid,
    event_id: Option<Uuid>,
    ticket_type: String,
    quantity: i32,
    total_amount: i64,
    discount_amount: i64,
    payment_status: String,
    payment_method: Option<String>,
    payment_id: Option<String>,
    status: String,
    coupon_id: Option<Uuid>,
    coupon_code: Option<String>,
    referral_codes_used: Vec<String>,
    referral_coupon_used: bool,
    aadhar_number: String,
    tshirt_size: Option<String>,
    attendees: Json<Vec<Attendee>>,
    gateway_response: Option<Value>,
    refund_amount: i64,
    refund_processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> StoreResult<Booking> {
        let payment_method = self
            .payment_method
            .as_deref()
            .map(str::parse::<PaymentMethod>)
            .transpose()?;

        Ok(Booking {
            id: self.id,
            booking_reference: self.booking_reference,
            user_id: self.user_id,
            event_id: self.event_id,
            ticket_type: self.ticket_type.parse()?,
            quantity: self.quantity,
            total_amount: self.total_amount,
            discount_amount: self.discount_amount,
            payment_status: self.payment_status.parse()?,
            payment_method,
            payment_id: self.payment_id,
            status: self.status.parse()?,
            coupon_id: self.coupon_id,
            coupon_code: self.coupon_code,
            referral_codes_used: self.referral_codes_used,
            referral_coupon_used: self.referral_coupon_used,
            aadhar_number: Masked(self.aadhar_number),
            tshirt_size: self.tshirt_size,
            attendees: self.attendees.0,
            gateway_response: self.gateway_response,
            refund_amount: self.refund_amount,
            refund_processed_at: self.refund_processed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create(&self, draft: BookingDraft, consume_referrals: &[String]) -> StoreResult<Booking> {
        let booking = Booking::from_draft(draft, reference::DEFAULT_PREFIX, Utc::now())?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Conditional flip; under concurrent redemption only one transaction sees a row
        for code in consume_referrals {
            let result = sqlx::query(
                "UPDATE bookings SET referral_coupon_used = TRUE, updated_at = NOW() \
                 WHERE booking_reference = $1 AND referral_coupon_used = FALSE",
            )
            .bind(code)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if result.rows_affected() != 1 {
                tx.rollback().await.map_err(db_err)?;
                tracing::info!("Referral {} already redeemed, booking not created", code);
                return Err(StoreError::ReferralUnavailable(code.clone()));
            }
        }

        let insert = sqlx::query(
            r#"
            INSERT INTO bookings (id, booking_reference, user_id, event_id, ticket_type, quantity,
                total_amount, discount_amount, payment_status, payment_method, payment_id, status,
                coupon_id, coupon_code, referral_codes_used, referral_coupon_used, aadhar_number,
                tshirt_size, attendees, gateway_response, refund_amount, refund_processed_at,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_reference)
        .bind(booking.user_id)
        .bind(booking.event_id)
        .bind(booking.ticket_type.as_str())
        .bind(booking.quantity)
        .bind(booking.total_amount)
        .bind(booking.discount_amount)
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_method.map(|m| m.as_str()))
        .bind(&booking.payment_id)
        .bind(booking.status.as_str())
        .bind(booking.coupon_id)
        .bind(&booking.coupon_code)
        .bind(&booking.referral_codes_used)
        .bind(booking.referral_coupon_used)
        .bind(booking.aadhar_number.expose())
        .bind(&booking.tshirt_size)
        .bind(Json(&booking.attendees))
        .bind(&booking.gateway_response)
        .bind(booking.refund_amount)
        .bind(booking.refund_processed_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = insert {
            tx.rollback().await.map_err(db_err)?;
            if is_unique_violation(&err) {
                return Err(StoreError::DuplicateReference(booking.booking_reference));
            }
            return Err(db_err(err));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Booking>> {
        self.fetch_one_where("booking_reference = $1", reference).await
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Booking>> {
        self.fetch_one_where("payment_id = $1", payment_id).await
    }

    async fn find_unused_referral(&self, reference: &str) -> StoreResult<Option<Booking>> {
        self.fetch_one_where("booking_reference = $1 AND referral_coupon_used = FALSE", reference)
            .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        patch: &StatusPatch,
        expected: &PaymentState,
    ) -> StoreResult<Option<Booking>> {
        let Some(mut current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        if current.payment_state() != *expected {
            return Err(StoreError::StaleWrite(id));
        }
        patch.apply_to(&mut current, Utc::now())?;

        let sql = format!(
            "UPDATE bookings SET \
                payment_status = COALESCE($2, payment_status), \
                status = COALESCE($3, status), \
                payment_id = COALESCE($4, payment_id), \
                payment_method = COALESCE($5, payment_method), \
                updated_at = NOW() \
             WHERE id = $1 AND payment_status = $6 AND payment_id IS NOT DISTINCT FROM $7 AND status = $8 \
             RETURNING {}",
            BOOKING_COLUMNS
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(patch.payment_status.map(|s| s.as_str()))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(&patch.payment_id)
            .bind(patch.payment_method.map(|m| m.as_str()))
            .bind(expected.payment_status.as_str())
            .bind(&expected.payment_id)
            .bind(expected.status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => row.into_booking().map(Some),
            None => Err(StoreError::StaleWrite(id)),
        }
    }

    async fn save_payment_state(&self, booking: &Booking, expected: &PaymentState) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                payment_status = $2,
                payment_method = $3,
                payment_id = $4,
                status = $5,
                gateway_response = $6,
                refund_amount = $7,
                refund_processed_at = $8,
                updated_at = $9
            WHERE id = $1
              AND payment_status = $10
              AND payment_id IS NOT DISTINCT FROM $11
              AND status = $12
            "#,
        )
        .bind(booking.id)
        .bind(booking.payment_status.as_str())
        .bind(booking.payment_method.map(|m| m.as_str()))
        .bind(&booking.payment_id)
        .bind(booking.status.as_str())
        .bind(&booking.gateway_response)
        .bind(booking.refund_amount)
        .bind(booking.refund_processed_at)
        .bind(booking.updated_at)
        .bind(expected.payment_status.as_str())
        .bind(&expected.payment_id)
        .bind(expected.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        // Zero rows: another writer moved the booking since it was read
        if result.rows_affected() != 1 {
            return Err(StoreError::StaleWrite(booking.id));
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        let sql = format!("SELECT {} FROM bookings ORDER BY created_at DESC", BOOKING_COLUMNS);
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}
