//! Background sweep that force-stops timers left running past the ceiling.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use db::models::{
    event_log::CreateEventLogEntry,
    garment::Garment,
    task::Task,
    timer::{TimedUnit, format_timestamp},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    event_log::record_event,
    timer_state::{Staleness, force_stop, staleness},
};

pub const REAPER_ACTOR: &str = "system:stale-timer-reaper";

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} was changed by another request during the sweep")]
    Concurrent(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReapedTimer {
    pub entity: String,
    pub id: Uuid,
    pub previous_assignee: Option<String>,
    pub started_at: String,
    pub capped_minutes: i64,
    pub accumulated_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SweepFailure {
    pub entity: String,
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct SweepReport {
    pub examined: usize,
    pub stopped: Vec<ReapedTimer>,
    pub failed: Vec<SweepFailure>,
    /// Running timers whose start time cannot be read; left untouched.
    pub unreadable: Vec<Uuid>,
}

/// Stops every running garment or task timer started more than `ceiling` ago.
pub struct StaleTimerReaper {
    pool: SqlitePool,
    ceiling: Duration,
    poll_interval: StdDuration,
}

impl StaleTimerReaper {
    pub fn new(pool: SqlitePool, ceiling: Duration, poll_interval: StdDuration) -> Self {
        Self {
            pool,
            ceiling,
            poll_interval,
        }
    }

    /// Spawn the recurring sweep
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting stale timer reaper with interval {:?}, ceiling: {} min",
            self.poll_interval,
            self.ceiling.num_minutes()
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            match self.sweep(Utc::now()).await {
                Ok(report) if report.stopped.is_empty() && report.failed.is_empty() => {
                    debug!(examined = report.examined, "Stale timer sweep: nothing to stop");
                }
                Ok(report) => {
                    info!(
                        examined = report.examined,
                        stopped = report.stopped.len(),
                        failed = report.failed.len(),
                        "Stale timer sweep finished"
                    );
                }
                Err(e) => error!("Error sweeping stale timers: {}", e),
            }
        }
    }

    /// Run one sweep over garments and tasks.
    ///
    /// Per-timer failures are recorded in the report and do not stop the sweep;
    /// only failing to list running timers is an error.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReaperError> {
        let mut report = SweepReport::default();
        self.sweep_units::<Garment>(now, &mut report).await?;
        self.sweep_units::<Task>(now, &mut report).await?;
        Ok(report)
    }

    async fn sweep_units<U: TimedUnit>(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), ReaperError> {
        let running = U::fetch_active(&self.pool).await?;

        for unit in running {
            report.examined += 1;
            match staleness(&unit.timer(), now, self.ceiling) {
                Staleness::NotRunning | Staleness::Fresh => {}
                Staleness::Unparsable { raw } => {
                    warn!(
                        entity = U::ENTITY,
                        id = %unit.id(),
                        started_at = ?raw,
                        "Stale timer sweep: running timer has an unreadable start time, skipping"
                    );
                    report.unreadable.push(unit.id());
                }
                Staleness::Stale { started_at } => {
                    let id = unit.id();
                    match self.reap(unit, started_at, now).await {
                        Ok(reaped) => report.stopped.push(reaped),
                        Err(e) => {
                            warn!(
                                entity = U::ENTITY,
                                id = %id,
                                error = %e,
                                "Stale timer sweep: failed to stop timer"
                            );
                            report.failed.push(SweepFailure {
                                entity: U::ENTITY.to_string(),
                                id,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn reap<U: TimedUnit>(
        &self,
        unit: U,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReapedTimer, ReaperError> {
        let current = unit.timer();
        let transition = force_stop(&current, now, self.ceiling);
        let capped_minutes = self.ceiling.num_minutes();

        U::update_timer_if_version(&self.pool, unit.id(), unit.version(), &transition.fields)
            .await?
            .ok_or(ReaperError::Concurrent(U::ENTITY))?;

        info!(
            entity = U::ENTITY,
            id = %unit.id(),
            assignee = ?current.assignee,
            started_at = %started_at,
            capped_minutes,
            "Stale timer sweep: timer force-stopped"
        );

        let started_at = format_timestamp(started_at);
        record_event(
            &self.pool,
            CreateEventLogEntry {
                actor: REAPER_ACTOR.to_string(),
                entity: U::ENTITY.to_string(),
                entity_id: unit.id(),
                action: "timer_auto_stopped".to_string(),
                details: Some(serde_json::json!({
                    "reason": format!(
                        "timer running longer than {} hours",
                        self.ceiling.num_hours()
                    ),
                    "started_at": started_at,
                    "capped_minutes": capped_minutes,
                    "ceiling_minutes": capped_minutes,
                    "previous_assignee": current.assignee,
                })),
            },
        )
        .await;

        Ok(ReapedTimer {
            entity: U::ENTITY.to_string(),
            id: unit.id(),
            previous_assignee: current.assignee,
            started_at,
            capped_minutes,
            accumulated_minutes: transition.fields.accumulated_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use db::{
        DBService,
        models::{
            event_log::{EventLogEntry, EventLogQuery},
            garment::CreateGarment,
            order::{CreateOrder, Order},
            task::NewTask,
            timer::WorkStage,
        },
    };

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 20, 0, 0).unwrap()
    }

    async fn setup(garments: usize) -> (DBService, Vec<Garment>) {
        let db = DBService::new_in_memory().await.unwrap();
        let order = Order::create(
            &db.pool,
            &CreateOrder {
                client_name: "Atelier walk-in".to_string(),
                notes: None,
                due_date: None,
                garments: (0..garments)
                    .map(|i| CreateGarment {
                        name: format!("garment {i}"),
                        services: vec![],
                    })
                    .collect(),
            },
        )
        .await
        .unwrap();
        let garments = Garment::find_by_order_id(&db.pool, order.id).await.unwrap();
        (db, garments)
    }

    async fn run_garment(db: &DBService, id: Uuid, started_at: &str, accumulated: f64) {
        sqlx::query(
            "UPDATE garments SET is_active = 1, assignee = 'alice', started_at = $2, accumulated_minutes = $3, stage = 'working' WHERE id = $1",
        )
        .bind(id)
        .bind(started_at)
        .bind(accumulated)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    fn reaper(db: &DBService) -> StaleTimerReaper {
        StaleTimerReaper::new(db.pool.clone(), Duration::hours(10), StdDuration::from_secs(60))
    }

    #[tokio::test]
    async fn caps_an_eleven_hour_timer_at_the_ceiling() {
        let (db, garments) = setup(1).await;
        let started = format_timestamp(now() - Duration::hours(11));
        run_garment(&db, garments[0].id, &started, 15.0).await;

        let report = reaper(&db).sweep(now()).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.stopped.len(), 1);
        assert_eq!(report.stopped[0].capped_minutes, 600);
        assert_eq!(report.stopped[0].previous_assignee.as_deref(), Some("alice"));

        let garment = Garment::find_by_id(&db.pool, garments[0].id).await.unwrap().unwrap();
        assert_eq!(garment.accumulated_minutes, 615.0);
        assert_eq!(garment.stage, WorkStage::Done);
        assert!(!garment.is_active);
        assert_eq!(garment.assignee, None);
        assert_eq!(garment.started_at, None);

        let events = EventLogEntry::find(
            &db.pool,
            &EventLogQuery {
                entity: Some("garment".to_string()),
                entity_id: Some(garment.id),
                limit: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, REAPER_ACTOR);
        assert_eq!(events[0].action, "timer_auto_stopped");
        let details = events[0].details.as_ref().unwrap();
        assert_eq!(details.0["capped_minutes"], 600);
        assert_eq!(details.0["started_at"], started);
    }

    #[tokio::test]
    async fn leaves_fresh_and_unreadable_timers_alone() {
        let (db, garments) = setup(2).await;
        let fresh = format_timestamp(now() - Duration::hours(2));
        run_garment(&db, garments[0].id, &fresh, 0.0).await;
        run_garment(&db, garments[1].id, "garbage", 0.0).await;

        let report = reaper(&db).sweep(now()).await.unwrap();
        assert_eq!(report.examined, 2);
        assert!(report.stopped.is_empty());
        assert_eq!(report.unreadable, vec![garments[1].id]);

        for garment in &garments {
            let garment = Garment::find_by_id(&db.pool, garment.id).await.unwrap().unwrap();
            assert!(garment.is_active);
        }
    }

    #[tokio::test]
    async fn sweeps_stale_tasks_too() {
        let (db, garments) = setup(1).await;
        let task = NewTask::general_work(garments[0].id);
        Task::insert_batch(&db.pool, std::slice::from_ref(&task)).await.unwrap();
        sqlx::query(
            "UPDATE tasks SET is_active = 1, assignee = 'bob', started_at = $2, stage = 'working' WHERE id = $1",
        )
        .bind(task.id)
        .bind(format_timestamp(now() - Duration::days(3)))
        .execute(&db.pool)
        .await
        .unwrap();

        let report = reaper(&db).sweep(now()).await.unwrap();
        assert_eq!(report.stopped.len(), 1);
        assert_eq!(report.stopped[0].entity, "task");

        let task = Task::find_by_id(&db.pool, task.id).await.unwrap().unwrap();
        assert_eq!(task.actual_minutes, 600.0);
        assert_eq!(task.stage, WorkStage::Done);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_sweep() {
        let (db, garments) = setup(2).await;
        let stale = format_timestamp(now() - Duration::hours(12));
        run_garment(&db, garments[0].id, &stale, 0.0).await;
        run_garment(&db, garments[1].id, &stale, 0.0).await;

        sqlx::query(&format!(
            "CREATE TRIGGER refuse_update BEFORE UPDATE ON garments WHEN OLD.id = X'{}' \
             BEGIN SELECT RAISE(ABORT, 'row is locked'); END",
            garments[0].id.simple()
        ))
        .execute(&db.pool)
        .await
        .unwrap();

        let report = reaper(&db).sweep(now()).await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, garments[0].id);
        assert_eq!(report.stopped.len(), 1);
        assert_eq!(report.stopped[0].id, garments[1].id);

        let untouched = Garment::find_by_id(&db.pool, garments[0].id).await.unwrap().unwrap();
        assert!(untouched.is_active);
    }
}
