use async_trait::async_trait;
use soy_core::coupon::Coupon;
use soy_core::repository::{CouponRepository, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::db_err;

pub struct PgCouponRepository {
    pool: PgPool,
}

impl PgCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_amount: i64,
    is_active: bool,
}

#[async_trait]
impl CouponRepository for PgCouponRepository {
    async fn find_active_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, discount_amount, is_active FROM coupons WHERE code = $1 AND is_active = TRUE",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| Coupon {
            id: r.id,
            code: r.code,
            discount_amount: r.discount_amount,
            is_active: r.is_active,
        }))
    }
}
