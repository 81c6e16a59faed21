use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Join row: a service requested on a garment, with quantity.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct GarmentService {
    pub id: Uuid,
    pub garment_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GarmentServiceInput {
    pub service_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// A garment-service row joined with its catalog entry. The catalog columns
/// are `None` when the service no longer exists.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceLine {
    pub garment_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i64,
    pub service_name: Option<String>,
    pub estimated_minutes: Option<i64>,
}

impl GarmentService {
    pub async fn create<'e, E>(
        executor: E,
        garment_id: Uuid,
        service_id: Uuid,
        quantity: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, GarmentService>(
            r#"INSERT INTO garment_services (id, garment_id, service_id, quantity)
               VALUES ($1, $2, $3, $4)
               RETURNING id, garment_id, service_id, quantity"#,
        )
        .bind(Uuid::new_v4())
        .bind(garment_id)
        .bind(service_id)
        .bind(quantity)
        .fetch_one(executor)
        .await
    }
}

impl ServiceLine {
    /// Every garment-service row of an order, with the service's name and estimate.
    pub async fn find_by_order_id(
        pool: &SqlitePool,
        order_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ServiceLine>(
            r#"SELECT gs.garment_id, gs.service_id, gs.quantity,
                      s.name AS service_name, s.estimated_minutes
               FROM garment_services gs
               JOIN garments g ON g.id = gs.garment_id
               LEFT JOIN services s ON s.id = gs.service_id
               WHERE g.order_id = $1
               ORDER BY g.created_at ASC, g.rowid ASC, gs.rowid ASC"#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }
}
