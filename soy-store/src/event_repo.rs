use async_trait::async_trait;
use chrono::{DateTime, Utc};
use soy_core::event::Event;
use soy_core::repository::{EventRepository, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::db_err;

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    starts_at: DateTime<Utc>,
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>("SELECT id, title, starts_at FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(|r| Event {
            id: r.id,
            title: r.title,
            starts_at: r.starts_at,
        }))
    }
}
