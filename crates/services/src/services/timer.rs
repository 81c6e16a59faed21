//! Timer controller: drives garment and task timers through the shared state machine.

use chrono::{DateTime, Utc};
use db::models::{
    event_log::CreateEventLogEntry,
    garment::Garment,
    task::Task,
    timer::{TimedUnit, WorkStage},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    authz::{Actor, StaffId},
    event_log::record_event,
    timer_state::{
        Elapsed, TimerCommand, TimerState, TransitionError, current_session_seconds,
    },
};

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("timer is held by {holder}; only they or an operator may change it")]
    PermissionDenied { holder: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
}

impl From<TransitionError> for TimerError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::PermissionDenied { holder } => TimerError::PermissionDenied { holder },
            TransitionError::Conflict(msg) => TimerError::Conflict(msg),
            TransitionError::Validation(msg) => TimerError::Validation(msg),
        }
    }
}

/// Which timer a command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTarget {
    /// A garment of an order. Without an explicit garment the controller
    /// picks the first garment (intake order) able to take the command.
    Garment {
        order_id: Uuid,
        garment_id: Option<Uuid>,
    },
    Task { task_id: Uuid },
}

/// Read-only projection of a timer at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TimerStatus {
    pub entity: String,
    pub id: Uuid,
    pub state: TimerState,
    pub is_running: bool,
    pub is_paused: bool,
    pub is_completed: bool,
    pub assignee: Option<String>,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
    pub accumulated_minutes: f64,
    pub current_session_seconds: i64,
    pub total_seconds: i64,
    pub stage: WorkStage,
    pub version: i64,
}

impl TimerStatus {
    pub fn of<U: TimedUnit>(unit: &U, now: DateTime<Utc>) -> Self {
        let fields = unit.timer();
        let state = TimerState::of(&fields);
        let current_session_seconds = current_session_seconds(&fields, now);
        let accumulated_seconds = (fields.accumulated_minutes * 60.0).round() as i64;
        Self {
            entity: U::ENTITY.to_string(),
            id: unit.id(),
            state,
            is_running: state == TimerState::Running,
            is_paused: state == TimerState::Paused,
            is_completed: state == TimerState::Done,
            assignee: fields.assignee,
            started_at: fields.started_at,
            stopped_at: fields.stopped_at,
            accumulated_minutes: fields.accumulated_minutes,
            current_session_seconds,
            total_seconds: accumulated_seconds + current_session_seconds,
            stage: fields.stage,
            version: unit.version(),
        }
    }
}

#[derive(Clone)]
pub struct TimerService {
    pool: SqlitePool,
}

impl TimerService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn start_timer(
        &self,
        target: TimerTarget,
        assignee: StaffId,
    ) -> Result<TimerStatus, TimerError> {
        self.execute(target, TimerCommand::Start { assignee }).await
    }

    pub async fn pause_timer(
        &self,
        target: TimerTarget,
        requester: Option<Actor>,
    ) -> Result<TimerStatus, TimerError> {
        self.execute(target, TimerCommand::Pause { requester }).await
    }

    pub async fn resume_timer(
        &self,
        target: TimerTarget,
        requester: Option<Actor>,
    ) -> Result<TimerStatus, TimerError> {
        self.execute(target, TimerCommand::Resume { requester }).await
    }

    pub async fn stop_timer(
        &self,
        target: TimerTarget,
        requester: Option<Actor>,
    ) -> Result<TimerStatus, TimerError> {
        self.execute(target, TimerCommand::Stop { requester }).await
    }

    /// Overwrite the accumulated time of a timer that is not running.
    pub async fn manual_update_timer(
        &self,
        target: TimerTarget,
        hours: f64,
        minutes: f64,
    ) -> Result<TimerStatus, TimerError> {
        self.execute(target, TimerCommand::ManualUpdate { hours, minutes })
            .await
    }

    pub async fn get_timer_status(&self, target: TimerTarget) -> Result<TimerStatus, TimerError> {
        self.timer_status_at(target, Utc::now()).await
    }

    pub async fn execute(
        &self,
        target: TimerTarget,
        command: TimerCommand,
    ) -> Result<TimerStatus, TimerError> {
        self.execute_at(target, command, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        target: TimerTarget,
        command: TimerCommand,
        now: DateTime<Utc>,
    ) -> Result<TimerStatus, TimerError> {
        match target {
            TimerTarget::Garment {
                order_id,
                garment_id,
            } => {
                let garment = self
                    .resolve_garment(order_id, garment_id, |state| command.accepts(state))
                    .await?;
                let updated = self.apply(garment, &command, now).await?;
                Ok(TimerStatus::of(&updated, now))
            }
            TimerTarget::Task { task_id } => {
                let task = Task::find_by_id(&self.pool, task_id)
                    .await?
                    .ok_or(TimerError::NotFound("task"))?;
                let updated = self.apply(task, &command, now).await?;
                Ok(TimerStatus::of(&updated, now))
            }
        }
    }

    pub async fn timer_status_at(
        &self,
        target: TimerTarget,
        now: DateTime<Utc>,
    ) -> Result<TimerStatus, TimerError> {
        match target {
            TimerTarget::Garment {
                order_id,
                garment_id,
            } => {
                let garment = self
                    .resolve_garment(order_id, garment_id, |state| state == TimerState::Running)
                    .await?;
                Ok(TimerStatus::of(&garment, now))
            }
            TimerTarget::Task { task_id } => {
                let task = Task::find_by_id(&self.pool, task_id)
                    .await?
                    .ok_or(TimerError::NotFound("task"))?;
                Ok(TimerStatus::of(&task, now))
            }
        }
    }

    /// The explicit garment when given (it must belong to the order), else
    /// the first garment of the order matching `prefer`, else the first one.
    async fn resolve_garment(
        &self,
        order_id: Uuid,
        garment_id: Option<Uuid>,
        prefer: impl Fn(TimerState) -> bool,
    ) -> Result<Garment, TimerError> {
        if let Some(garment_id) = garment_id {
            return Garment::find_by_id(&self.pool, garment_id)
                .await?
                .filter(|g| g.order_id == order_id)
                .ok_or(TimerError::NotFound("garment"));
        }
        let mut garments = Garment::find_by_order_id(&self.pool, order_id).await?;
        if garments.is_empty() {
            return Err(TimerError::NotFound("garment"));
        }
        let index = garments
            .iter()
            .position(|g| prefer(TimerState::of(&g.timer())))
            .unwrap_or(0);
        Ok(garments.swap_remove(index))
    }

    async fn apply<U: TimedUnit>(
        &self,
        unit: U,
        command: &TimerCommand,
        now: DateTime<Utc>,
    ) -> Result<U, TimerError> {
        let current = unit.timer();
        let transition = command.apply(&current, now)?;

        let updated =
            U::update_timer_if_version(&self.pool, unit.id(), unit.version(), &transition.fields)
                .await?
                .ok_or_else(|| {
                    TimerError::Conflict(format!(
                        "{} was changed by another request; reload and try again",
                        U::ENTITY
                    ))
                })?;

        let actor = command
            .issuer()
            .map(StaffId::to_string)
            .or_else(|| current.assignee.clone())
            .unwrap_or_else(|| "anonymous".to_string());

        if let Elapsed::Discarded { reason } = &transition.elapsed {
            warn!(
                entity = U::ENTITY,
                id = %unit.id(),
                started_at = ?current.started_at,
                reason = %reason,
                "Timer session could not be measured; accumulated time left unchanged"
            );
            record_event(
                &self.pool,
                CreateEventLogEntry {
                    actor: actor.clone(),
                    entity: U::ENTITY.to_string(),
                    entity_id: unit.id(),
                    action: "timer_elapsed_discarded".to_string(),
                    details: Some(serde_json::json!({
                        "reason": reason,
                        "started_at": current.started_at,
                        "accumulated_minutes": current.accumulated_minutes,
                    })),
                },
            )
            .await;
        }

        let added_minutes = match transition.elapsed {
            Elapsed::Added { minutes } => Some(minutes),
            _ => None,
        };
        info!(
            entity = U::ENTITY,
            id = %unit.id(),
            action = command.action(),
            actor = %actor,
            accumulated_minutes = transition.fields.accumulated_minutes,
            "Timer updated"
        );
        record_event(
            &self.pool,
            CreateEventLogEntry {
                actor,
                entity: U::ENTITY.to_string(),
                entity_id: unit.id(),
                action: command.action().to_string(),
                details: Some(serde_json::json!({
                    "previous_state": TimerState::of(&current),
                    "added_minutes": added_minutes,
                    "accumulated_minutes": transition.fields.accumulated_minutes,
                    "stage": transition.fields.stage,
                })),
            },
        )
        .await;

        Ok(updated)
    }
}
