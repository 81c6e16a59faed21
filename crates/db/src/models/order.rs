use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    garment::{CreateGarment, Garment},
    garment_service::GarmentService,
};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Working,
    Done,
    Ready,
    Delivered,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Order {
    pub id: Uuid,
    pub client_name: String,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub due_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intake payload: the order with every garment and its requested services.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateOrder {
    pub client_name: String,
    pub notes: Option<String>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub garments: Vec<CreateGarment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OrderWithGarments {
    #[serde(flatten)]
    #[ts(flatten)]
    pub order: Order,
    pub garments: Vec<Garment>,
}

impl Order {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"SELECT id, client_name, status, notes, due_date, created_at, updated_at
               FROM orders
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Record an order together with its garments and garment-service rows.
    pub async fn create(pool: &SqlitePool, data: &CreateOrder) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let order_id = Uuid::new_v4();
        let order = sqlx::query_as::<_, Order>(
            r#"INSERT INTO orders (id, client_name, notes, due_date)
               VALUES ($1, $2, $3, $4)
               RETURNING id, client_name, status, notes, due_date, created_at, updated_at"#,
        )
        .bind(order_id)
        .bind(&data.client_name)
        .bind(&data.notes)
        .bind(&data.due_date)
        .fetch_one(&mut *tx)
        .await?;

        for garment in &data.garments {
            let garment_id = Uuid::new_v4();
            Garment::create(&mut *tx, garment_id, order_id, &garment.name).await?;
            for line in &garment.services {
                GarmentService::create(&mut *tx, garment_id, line.service_id, line.quantity)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(order)
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"UPDATE orders
               SET status = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, client_name, status, notes, due_date, created_at, updated_at"#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn with_garments(
        self,
        pool: &SqlitePool,
    ) -> Result<OrderWithGarments, sqlx::Error> {
        let garments = Garment::find_by_order_id(pool, self.id).await?;
        Ok(OrderWithGarments {
            order: self,
            garments,
        })
    }
}
