use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Catalog entry for an alteration or tailoring service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub estimated_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateService {
    pub name: String,
    pub estimated_minutes: Option<i64>,
}

impl Service {
    pub async fn create(pool: &SqlitePool, data: &CreateService) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Service>(
            r#"INSERT INTO services (id, name, estimated_minutes)
               VALUES ($1, $2, $3)
               RETURNING id, name, estimated_minutes, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(data.estimated_minutes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Service>(
            r#"SELECT id, name, estimated_minutes, created_at
               FROM services
               ORDER BY name ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Service>(
            r#"SELECT id, name, estimated_minutes, created_at
               FROM services
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
