use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::timer::{TimedUnit, TimerFields, WorkStage};

/// Operation label of the task created for a garment without any service.
pub const GENERAL_WORK_OPERATION: &str = "General Work";
pub const GENERAL_WORK_PLANNED_MINUTES: i64 = 60;

/// Planned and actual work for one (garment, service) pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub garment_id: Uuid,         // Foreign key to Garment
    pub service_id: Option<Uuid>, // None for the general-work task
    pub operation: String,
    pub stage: WorkStage,
    pub planned_minutes: i64,
    pub actual_minutes: f64,
    pub is_active: bool,
    pub assignee: Option<String>,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending task about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub id: Uuid,
    pub garment_id: Uuid,
    pub service_id: Option<Uuid>,
    pub operation: String,
    pub planned_minutes: i64,
}

impl NewTask {
    pub fn general_work(garment_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            garment_id,
            service_id: None,
            operation: GENERAL_WORK_OPERATION.to_string(),
            planned_minutes: GENERAL_WORK_PLANNED_MINUTES,
        }
    }
}

impl Task {
    /// True once any time has been tracked against the task.
    pub fn has_started(&self) -> bool {
        self.stage != WorkStage::Pending
            || self.is_active
            || self.started_at.is_some()
            || self.stopped_at.is_some()
            || self.actual_minutes > 0.0
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, garment_id, service_id, operation, stage, planned_minutes, actual_minutes, is_active, assignee, started_at, stopped_at, version, created_at, updated_at
               FROM tasks
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_order_id(
        pool: &SqlitePool,
        order_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT t.id, t.garment_id, t.service_id, t.operation, t.stage, t.planned_minutes, t.actual_minutes, t.is_active, t.assignee, t.started_at, t.stopped_at, t.version, t.created_at, t.updated_at
               FROM tasks t
               JOIN garments g ON g.id = t.garment_id
               WHERE g.order_id = $1
               ORDER BY g.created_at ASC, g.rowid ASC, t.rowid ASC"#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_garment_ids(
        pool: &SqlitePool,
        garment_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if garment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, garment_id, service_id, operation, stage, planned_minutes, actual_minutes, is_active, assignee, started_at, stopped_at, version, created_at, updated_at FROM tasks WHERE garment_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in garment_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        query.build_query_as::<Task>().fetch_all(pool).await
    }

    pub async fn find_active(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, garment_id, service_id, operation, stage, planned_minutes, actual_minutes, is_active, assignee, started_at, stopped_at, version, created_at, updated_at
               FROM tasks
               WHERE is_active = 1
               ORDER BY started_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    /// Insert every task in a single statement; either all rows land or none do.
    pub async fn insert_batch(pool: &SqlitePool, tasks: &[NewTask]) -> Result<u64, sqlx::Error> {
        if tasks.is_empty() {
            return Ok(0);
        }
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO tasks (id, garment_id, service_id, operation, stage, planned_minutes) ",
        );
        query.push_values(tasks, |mut row, task| {
            row.push_bind(task.id)
                .push_bind(task.garment_id)
                .push_bind(task.service_id)
                .push_bind(task.operation.clone())
                .push_bind(WorkStage::Pending)
                .push_bind(task.planned_minutes);
        });
        let result = query.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Delete the task only if no time was ever tracked on it.
    pub async fn delete_if_never_started(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"DELETE FROM tasks
               WHERE id = $1
                 AND stage = 'pending'
                 AND is_active = 0
                 AND started_at IS NULL
                 AND stopped_at IS NULL
                 AND actual_minutes = 0"#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Write the timer columns if the row is still at `expected_version`.
    pub async fn update_timer(
        pool: &SqlitePool,
        id: Uuid,
        expected_version: i64,
        timer: &TimerFields,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET assignee = $3, is_active = $4, started_at = $5, stopped_at = $6,
                   actual_minutes = $7, stage = $8,
                   version = version + 1, updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND version = $2
               RETURNING id, garment_id, service_id, operation, stage, planned_minutes, actual_minutes, is_active, assignee, started_at, stopped_at, version, created_at, updated_at"#,
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
impl TimedUnit for Task {
    const ENTITY: &'static str = "task";

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
            accumulated_minutes: self.actual_minutes,
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
