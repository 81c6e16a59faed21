use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    garment_service::GarmentServiceInput,
    timer::{TimedUnit, TimerFields, WorkStage},
};

/// A garment on an order. It is also the per-garment timed unit of work.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Garment {
    pub id: Uuid,
    pub order_id: Uuid, // Foreign key to Order
    pub name: String,
    pub assignee: Option<String>,
    pub is_active: bool,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
    pub accumulated_minutes: f64,
    pub stage: WorkStage,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateGarment {
    pub name: String,
    #[serde(default)]
    pub services: Vec<GarmentServiceInput>,
}

impl Garment {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Garment>(
            r#"SELECT id, order_id, name, assignee, is_active, started_at, stopped_at, accumulated_minutes, stage, version, created_at, updated_at
               FROM garments
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Garments of an order in intake order.
    pub async fn find_by_order_id(
        pool: &SqlitePool,
        order_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Garment>(
            r#"SELECT id, order_id, name, assignee, is_active, started_at, stopped_at, accumulated_minutes, stage, version, created_at, updated_at
               FROM garments
               WHERE order_id = $1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_active(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Garment>(
            r#"SELECT id, order_id, name, assignee, is_active, started_at, stopped_at, accumulated_minutes, stage, version, created_at, updated_at
               FROM garments
               WHERE is_active = 1
               ORDER BY started_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        order_id: Uuid,
        name: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Garment>(
            r#"INSERT INTO garments (id, order_id, name)
               VALUES ($1, $2, $3)
               RETURNING id, order_id, name, assignee, is_active, started_at, stopped_at, accumulated_minutes, stage, version, created_at, updated_at"#,
        )
        .bind(id)
        .bind(order_id)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    /// Write the timer columns if the row is still at `expected_version`.
    pub async fn update_timer(
        pool: &SqlitePool,
        id: Uuid,
        expected_version: i64,
        timer: &TimerFields,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Garment>(
            r#"UPDATE garments
               SET assignee = $3, is_active = $4, started_at = $5, stopped_at = $6,
                   accumulated_minutes = $7, stage = $8,
                   version = version + 1, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND version = $2
               RETURNING id, order_id, name, assignee, is_active, started_at, stopped_at, accumulated_minutes, stage, version, created_at, updated_at"#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(&timer.assignee)
        .bind(timer.is_active)
        .bind(&timer.started_at)
        .bind(&timer.stopped_at)
        .bind(timer.accumulated_minutes)
        .bind(timer.stage)
        .fetch_optional(pool)
        .await
    }
}

#[async_trait]
impl TimedUnit for Garment {
    const ENTITY: &'static str = "garment";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn timer(&self) -> TimerFields {
        TimerFields {
            is_active: self.is_active,
            assignee: self.assignee.clone(),
            started_at: self.started_at.clone(),
            stopped_at: self.stopped_at.clone(),
            accumulated_minutes: self.accumulated_minutes,
            stage: self.stage,
        }
    }

    async fn fetch_active(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        Self::find_active(pool).await
    }

    async fn update_timer_if_version(
        pool: &SqlitePool,
        id: Uuid,
        expected_version: i64,
        timer: &TimerFields,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::update_timer(pool, id, expected_version, timer).await
    }
}
