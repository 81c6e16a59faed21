use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

/// Append-only audit record. Rows are never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct EventLogEntry {
    pub id: Uuid,
    pub actor: String,
    pub entity: String,
    pub entity_id: Uuid,
    pub action: String,
    #[ts(type = "unknown")]
    pub details: Option<Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateEventLogEntry {
    pub actor: String,
    pub entity: String,
    pub entity_id: Uuid,
    pub action: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct EventLogQuery {
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
}

impl EventLogEntry {
    pub async fn create(
        pool: &SqlitePool,
        data: CreateEventLogEntry,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EventLogEntry>(
            r#"INSERT INTO event_logs (id, actor, entity, entity_id, action, details)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, actor, entity, entity_id, action, details, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.actor)
        .bind(data.entity)
        .bind(data.entity_id)
        .bind(data.action)
        .bind(data.details.map(Json))
        .fetch_one(pool)
        .await
    }

    /// Newest first, optionally narrowed to one entity kind or one row.
    pub async fn find(pool: &SqlitePool, filter: &EventLogQuery) -> Result<Vec<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, actor, entity, entity_id, action, details, created_at FROM event_logs WHERE 1 = 1",
        );
        if let Some(entity) = &filter.entity {
            query.push(" AND entity = ").push_bind(entity.clone());
        }
        if let Some(entity_id) = filter.entity_id {
            query.push(" AND entity_id = ").push_bind(entity_id);
        }
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(100).clamp(1, 1000));
        query.build_query_as::<EventLogEntry>().fetch_all(pool).await
    }
}
