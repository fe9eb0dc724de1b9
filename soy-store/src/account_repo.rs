use async_trait::async_trait;
use soy_core::account::{Customer, Role};
use soy_core::repository::{CustomerRepository, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::db_err;

/// Read-only view over the `users` table; accounts are managed elsewhere.
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    role: String,
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn find_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, first_name, last_name, email, phone, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| Customer {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
            role: Role::parse_lenient(&r.role),
        }))
    }
}
