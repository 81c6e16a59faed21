//! The work-timer state machine shared by garment and task timers.
//!
//! Everything here is pure: a command is applied to the stored
//! [`TimerFields`] at a given instant and yields the fields to write back.

use chrono::{DateTime, Duration, Utc};
use db::models::timer::{TimerFields, WorkStage, format_timestamp};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use ts_rs::TS;

use super::authz::{Actor, StaffId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Done,
}

impl TimerState {
    pub fn of(fields: &TimerFields) -> Self {
        if fields.is_active {
            TimerState::Running
        } else if fields.stage == WorkStage::Done {
            TimerState::Done
        } else if fields.stopped_at.is_some() {
            TimerState::Paused
        } else {
            TimerState::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("timer is held by {holder}; only they or an operator may change it")]
    PermissionDenied { holder: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
}

/// What happened to the running session's elapsed time.
#[derive(Debug, Clone, PartialEq)]
pub enum Elapsed {
    /// The command does not close a session.
    Untouched,
    Added { minutes: f64 },
    /// The session could not be measured; accumulated time was kept as is.
    Discarded { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub fields: TimerFields,
    pub elapsed: Elapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerCommand {
    Start { assignee: StaffId },
    Pause { requester: Option<Actor> },
    Resume { requester: Option<Actor> },
    Stop { requester: Option<Actor> },
    ManualUpdate { hours: f64, minutes: f64 },
}

impl TimerCommand {
    /// Event log action name.
    pub fn action(&self) -> &'static str {
        match self {
            TimerCommand::Start { .. } => "timer_started",
            TimerCommand::Pause { .. } => "timer_paused",
            TimerCommand::Resume { .. } => "timer_resumed",
            TimerCommand::Stop { .. } => "timer_stopped",
            TimerCommand::ManualUpdate { .. } => "timer_manual_update",
        }
    }

    /// The staff id that issued the command, if known.
    pub fn issuer(&self) -> Option<&StaffId> {
        match self {
            TimerCommand::Start { assignee } => Some(assignee),
            TimerCommand::Pause { requester }
            | TimerCommand::Resume { requester }
            | TimerCommand::Stop { requester } => requester.as_ref().map(|a| &a.staff_id),
            TimerCommand::ManualUpdate { .. } => None,
        }
    }

    /// Whether a unit in `state` can take this command.
    pub fn accepts(&self, state: TimerState) -> bool {
        match self {
            TimerCommand::Start { .. } => state != TimerState::Running,
            TimerCommand::Pause { .. } | TimerCommand::Stop { .. } => state == TimerState::Running,
            TimerCommand::Resume { .. } => state == TimerState::Paused,
            TimerCommand::ManualUpdate { .. } => state != TimerState::Running,
        }
    }

    pub fn apply(&self, current: &TimerFields, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
        let state = TimerState::of(current);
        match self {
            TimerCommand::Start { assignee } => {
                if state == TimerState::Running {
                    return Err(TransitionError::Conflict(
                        "timer is already running".to_string(),
                    ));
                }
                Ok(Transition {
                    fields: TimerFields {
                        is_active: true,
                        assignee: Some(assignee.to_string()),
                        started_at: Some(format_timestamp(now)),
                        stage: WorkStage::Working,
                        ..current.clone()
                    },
                    elapsed: Elapsed::Untouched,
                })
            }
            TimerCommand::Pause { requester } => {
                require_running(state, "pause")?;
                authorize(requester.as_ref(), current)?;
                let (accumulated_minutes, elapsed) = close_session(current, now);
                Ok(Transition {
                    fields: TimerFields {
                        is_active: false,
                        started_at: None,
                        stopped_at: Some(format_timestamp(now)),
                        accumulated_minutes,
                        ..current.clone()
                    },
                    elapsed,
                })
            }
            TimerCommand::Resume { requester } => {
                if state != TimerState::Paused {
                    return Err(TransitionError::Conflict(format!(
                        "cannot resume a timer that is {state}, not paused"
                    )));
                }
                authorize(requester.as_ref(), current)?;
                Ok(Transition {
                    fields: TimerFields {
                        is_active: true,
                        started_at: Some(format_timestamp(now)),
                        stage: WorkStage::Working,
                        ..current.clone()
                    },
                    elapsed: Elapsed::Untouched,
                })
            }
            TimerCommand::Stop { requester } => {
                require_running(state, "stop")?;
                authorize(requester.as_ref(), current)?;
                let (accumulated_minutes, elapsed) = close_session(current, now);
                Ok(finish(accumulated_minutes, elapsed, now))
            }
            TimerCommand::ManualUpdate { hours, minutes } => {
                if state == TimerState::Running {
                    return Err(TransitionError::Conflict(
                        "pause the timer before editing its time".to_string(),
                    ));
                }
                let total = manual_minutes(*hours, *minutes)?;
                Ok(Transition {
                    fields: TimerFields {
                        accumulated_minutes: total,
                        ..current.clone()
                    },
                    elapsed: Elapsed::Untouched,
                })
            }
        }
    }
}

/// Outcome of checking a running unit against the ceiling.
#[derive(Debug, Clone, PartialEq)]
pub enum Staleness {
    NotRunning,
    Fresh,
    Stale { started_at: DateTime<Utc> },
    Unparsable { raw: Option<String> },
}

pub fn staleness(fields: &TimerFields, now: DateTime<Utc>, ceiling: Duration) -> Staleness {
    if !fields.is_active {
        return Staleness::NotRunning;
    }
    match fields.parsed_started_at() {
        Some(started_at) if started_at < now - ceiling => Staleness::Stale { started_at },
        Some(_) => Staleness::Fresh,
        None => Staleness::Unparsable {
            raw: fields.started_at.clone(),
        },
    }
}

/// Force-stop a stale running unit, crediting exactly `ceiling` rather than
/// the real elapsed time.
pub fn force_stop(current: &TimerFields, now: DateTime<Utc>, ceiling: Duration) -> Transition {
    let capped = ceiling.num_minutes() as f64;
    let (accumulated_minutes, elapsed) = add_minutes(current.accumulated_minutes, capped);
    finish(accumulated_minutes, elapsed, now)
}

/// Seconds of the current session at `now`; zero when not running or
/// when the start time cannot be read.
pub fn current_session_seconds(fields: &TimerFields, now: DateTime<Utc>) -> i64 {
    if !fields.is_active {
        return 0;
    }
    fields
        .parsed_started_at()
        .map(|started| (now - started).num_seconds().max(0))
        .unwrap_or(0)
}

fn finish(accumulated_minutes: f64, elapsed: Elapsed, now: DateTime<Utc>) -> Transition {
    Transition {
        fields: TimerFields {
            is_active: false,
            assignee: None,
            started_at: None,
            stopped_at: Some(format_timestamp(now)),
            accumulated_minutes: accumulated_minutes.round(),
            stage: WorkStage::Done,
        },
        elapsed,
    }
}

fn require_running(state: TimerState, verb: &str) -> Result<(), TransitionError> {
    if state == TimerState::Running {
        Ok(())
    } else {
        Err(TransitionError::Conflict(format!(
            "cannot {verb} a timer that is {state}"
        )))
    }
}

fn authorize(requester: Option<&Actor>, current: &TimerFields) -> Result<(), TransitionError> {
    match requester {
        Some(actor) if !actor.may_control(current.assignee.as_deref()) => {
            Err(TransitionError::PermissionDenied {
                holder: current.assignee.clone().unwrap_or_default(),
            })
        }
        _ => Ok(()),
    }
}

/// Fold the running session into the accumulated minutes.
fn close_session(current: &TimerFields, now: DateTime<Utc>) -> (f64, Elapsed) {
    let Some(raw) = current.started_at.as_deref() else {
        return (
            current.accumulated_minutes,
            Elapsed::Discarded {
                reason: "running timer has no start time".to_string(),
            },
        );
    };
    let Some(started) = current.parsed_started_at() else {
        return (
            current.accumulated_minutes,
            Elapsed::Discarded {
                reason: format!("start time {raw:?} is not a timestamp"),
            },
        );
    };
    let elapsed_seconds = ((now - started).num_milliseconds() as f64 / 1000.0).max(0.0);
    add_minutes(current.accumulated_minutes, elapsed_seconds / 60.0)
}

fn add_minutes(previous: f64, minutes: f64) -> (f64, Elapsed) {
    let total = previous + minutes;
    if total.is_finite() && minutes.is_finite() {
        (total, Elapsed::Added { minutes })
    } else {
        (
            previous,
            Elapsed::Discarded {
                reason: format!("elapsed time {minutes} is not a finite number"),
            },
        )
    }
}

fn manual_minutes(hours: f64, minutes: f64) -> Result<f64, TransitionError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(TransitionError::Validation(format!(
            "hours must be a non-negative number, got {hours}"
        )));
    }
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(TransitionError::Validation(format!(
            "minutes must be a non-negative number, got {minutes}"
        )));
    }
    Ok(hours * 60.0 + minutes)
}
