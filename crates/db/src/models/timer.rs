//! Timer columns shared by every row that can be timed (garments and tasks).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Production stage of a garment or task on the board.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "work_stage", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkStage {
    #[default]
    Pending,
    Working,
    Done,
    Ready,
    Delivered,
}

/// The mutable timer state of a timed row, as stored.
///
/// `started_at` and `stopped_at` are kept as the raw stored text: rows can be
/// written by other clients, and a value that does not parse must not make
/// the whole row unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TimerFields {
    pub is_active: bool,
    pub assignee: Option<String>,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
    pub accumulated_minutes: f64,
    pub stage: WorkStage,
}

impl TimerFields {
    pub fn parsed_started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parse a stored timestamp. Accepts RFC 3339 and SQLite's
/// `YYYY-MM-DD HH:MM:SS[.fff]` (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A row carrying [`TimerFields`] that the timer controller can drive.
///
/// Updates are compare-and-swap on the row's `version` column: they return
/// `None` when the row changed since it was read.
#[async_trait]
pub trait TimedUnit: Sized + Send + Sync {
    /// Entity name used in the event log.
    const ENTITY: &'static str;

    fn id(&self) -> Uuid;
    fn version(&self) -> i64;
    fn timer(&self) -> TimerFields;

    async fn fetch_active(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error>;

    async fn update_timer_if_version(
        pool: &SqlitePool,
        id: Uuid,
        expected_version: i64,
        timer: &TimerFields,
    ) -> Result<Option<Self>, sqlx::Error>;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_rfc3339_and_sqlite_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 4, 9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-04T09:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-04T11:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-04 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-04 09:30:00.000"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("not-a-time"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("2025-13-40T99:00:00Z"), None);
    }

    #[test]
    fn format_round_trips_through_parse() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(ts), "2025-01-02T03:04:05.000Z");
        assert_eq!(parse_timestamp(&format_timestamp(ts)), Some(ts));
    }

    #[test]
    fn stage_text_form_is_lowercase() {
        assert_eq!(WorkStage::Working.to_string(), "working");
        assert_eq!("delivered".parse::<WorkStage>().unwrap(), WorkStage::Delivered);
    }
}
