//! Expands an order's garment services into individual work tasks.

use std::collections::HashSet;

use db::models::{
    garment::Garment,
    garment_service::ServiceLine,
    order::Order,
    task::{NewTask, Task},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

/// Operation label when a garment-service row points at a missing catalog entry.
const UNKNOWN_SERVICE_OPERATION: &str = "Service";

#[derive(Debug, Error)]
pub enum TaskAutoCreateError {
    #[error("order not found")]
    OrderNotFound,
    #[error("task creation failed: {0}")]
    Failed(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct AutoCreateSummary {
    pub tasks_created: u64,
    pub garments_processed: usize,
}

pub struct TaskAutoCreator {
    pool: SqlitePool,
}

impl TaskAutoCreator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the missing tasks for every garment of the order.
    ///
    /// Safe to call repeatedly: pairs that already have a task are skipped,
    /// and all new tasks are written in one batch.
    pub async fn auto_create_tasks(
        &self,
        order_id: Uuid,
    ) -> Result<AutoCreateSummary, TaskAutoCreateError> {
        Order::find_by_id(&self.pool, order_id)
            .await?
            .ok_or(TaskAutoCreateError::OrderNotFound)?;

        let garment_ids: Vec<Uuid> = Garment::find_by_order_id(&self.pool, order_id)
            .await?
            .into_iter()
            .map(|g| g.id)
            .collect();
        let lines = ServiceLine::find_by_order_id(&self.pool, order_id).await?;
        let existing: HashSet<(Uuid, Option<Uuid>)> =
            Task::find_by_garment_ids(&self.pool, &garment_ids)
                .await?
                .into_iter()
                .map(|t| (t.garment_id, t.service_id))
                .collect();

        let new_tasks = plan_tasks(&garment_ids, &lines, existing);
        if new_tasks.is_empty() {
            debug!(order_id = %order_id, "Task auto-creation: nothing to create");
        }
        let tasks_created = Task::insert_batch(&self.pool, &new_tasks).await?;

        info!(
            order_id = %order_id,
            tasks_created,
            garments_processed = garment_ids.len(),
            "Task auto-creation finished"
        );

        Ok(AutoCreateSummary {
            tasks_created,
            garments_processed: garment_ids.len(),
        })
    }
}

/// Decide which tasks to create, given the pairs that already have one.
///
/// One task per (garment, service); a garment with no services gets a single
/// general-work task.
pub fn plan_tasks(
    garment_ids: &[Uuid],
    lines: &[ServiceLine],
    mut existing: HashSet<(Uuid, Option<Uuid>)>,
) -> Vec<NewTask> {
    let mut planned = Vec::new();

    for &garment_id in garment_ids {
        let mut has_services = false;
        for line in lines.iter().filter(|l| l.garment_id == garment_id) {
            has_services = true;
            if !existing.insert((garment_id, Some(line.service_id))) {
                continue;
            }
            let planned_minutes = line
                .estimated_minutes
                .unwrap_or(0)
                .saturating_mul(line.quantity);
            planned.push(NewTask {
                id: Uuid::new_v4(),
                garment_id,
                service_id: Some(line.service_id),
                operation: line
                    .service_name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_SERVICE_OPERATION.to_string()),
                planned_minutes,
            });
        }

        if !has_services && existing.insert((garment_id, None)) {
            planned.push(NewTask::general_work(garment_id));
        }
    }

    planned
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            garment::CreateGarment,
            garment_service::GarmentServiceInput,
            order::CreateOrder,
            service::{CreateService, Service},
            task::{GENERAL_WORK_OPERATION, GENERAL_WORK_PLANNED_MINUTES},
        },
    };

    use super::*;

    fn line(garment_id: Uuid, service_id: Uuid, quantity: i64, minutes: Option<i64>) -> ServiceLine {
        ServiceLine {
            garment_id,
            service_id,
            quantity,
            service_name: Some("Hem".to_string()),
            estimated_minutes: minutes,
        }
    }

    #[test]
    fn planned_minutes_scale_with_quantity() {
        let garment = Uuid::new_v4();
        let hem = Uuid::new_v4();
        let planned = plan_tasks(&[garment], &[line(garment, hem, 3, Some(25))], HashSet::new());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].planned_minutes, 75);
        assert_eq!(planned[0].operation, "Hem");
        assert_eq!(planned[0].service_id, Some(hem));
    }

    #[test]
    fn unknown_estimate_plans_zero_minutes() {
        let garment = Uuid::new_v4();
        let mut orphan = line(garment, Uuid::new_v4(), 2, None);
        orphan.service_name = None;
        let planned = plan_tasks(&[garment], &[orphan], HashSet::new());
        assert_eq!(planned[0].planned_minutes, 0);
        assert_eq!(planned[0].operation, UNKNOWN_SERVICE_OPERATION);
    }

    #[test]
    fn existing_pairs_and_repeated_lines_are_skipped() {
        let garment = Uuid::new_v4();
        let hem = Uuid::new_v4();
        let taper = Uuid::new_v4();
        let lines = [
            line(garment, hem, 1, Some(20)),
            line(garment, taper, 1, Some(40)),
            line(garment, taper, 1, Some(40)),
        ];
        let existing = HashSet::from([(garment, Some(hem))]);
        let planned = plan_tasks(&[garment], &lines, existing);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].service_id, Some(taper));
    }

    #[test]
    fn garment_without_services_gets_general_work_once() {
        let garment = Uuid::new_v4();
        let planned = plan_tasks(&[garment], &[], HashSet::new());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].operation, GENERAL_WORK_OPERATION);
        assert_eq!(planned[0].planned_minutes, GENERAL_WORK_PLANNED_MINUTES);
        assert_eq!(planned[0].service_id, None);

        let again = plan_tasks(&[garment], &[], HashSet::from([(garment, None)]));
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let db = DBService::new_in_memory().await.unwrap();
        let hem = Service::create(
            &db.pool,
            &CreateService {
                name: "Hem trousers".to_string(),
                estimated_minutes: Some(30),
            },
        )
        .await
        .unwrap();
        let zip = Service::create(
            &db.pool,
            &CreateService {
                name: "Replace zip".to_string(),
                estimated_minutes: Some(45),
            },
        )
        .await
        .unwrap();
        let order = Order::create(
            &db.pool,
            &CreateOrder {
                client_name: "Mr. Adeyemi".to_string(),
                notes: None,
                due_date: None,
                garments: vec![
                    CreateGarment {
                        name: "trousers".to_string(),
                        services: vec![
                            GarmentServiceInput {
                                service_id: hem.id,
                                quantity: 2,
                            },
                            GarmentServiceInput {
                                service_id: zip.id,
                                quantity: 1,
                            },
                        ],
                    },
                    CreateGarment {
                        name: "overcoat".to_string(),
                        services: vec![],
                    },
                ],
            },
        )
        .await
        .unwrap();

        let creator = TaskAutoCreator::new(db.pool.clone());
        let first = creator.auto_create_tasks(order.id).await.unwrap();
        assert_eq!(
            first,
            AutoCreateSummary {
                tasks_created: 3,
                garments_processed: 2,
            }
        );

        let second = creator.auto_create_tasks(order.id).await.unwrap();
        assert_eq!(second.tasks_created, 0);
        assert_eq!(second.garments_processed, 2);

        let tasks = Task::find_by_order_id(&db.pool, order.id).await.unwrap();
        let summary: Vec<_> = tasks
            .iter()
            .map(|t| (t.operation.as_str(), t.planned_minutes))
            .collect();
        assert_eq!(
            summary,
            [("Hem trousers", 60), ("Replace zip", 45), (GENERAL_WORK_OPERATION, 60)]
        );
    }

    #[tokio::test]
    async fn missing_order_is_reported() {
        let db = DBService::new_in_memory().await.unwrap();
        let err = TaskAutoCreator::new(db.pool.clone())
            .auto_create_tasks(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskAutoCreateError::OrderNotFound));
    }
}
