//! Fire-and-forget writes to the audit log.

use db::models::event_log::{CreateEventLogEntry, EventLogEntry};
use sqlx::SqlitePool;
use tracing::warn;

/// Append an entry; a failed write is logged and otherwise ignored so the
/// action being audited still completes.
pub async fn record_event(pool: &SqlitePool, entry: CreateEventLogEntry) {
    let entity = entry.entity.clone();
    let entity_id = entry.entity_id;
    let action = entry.action.clone();
    if let Err(e) = EventLogEntry::create(pool, entry).await {
        warn!(
            entity = %entity,
            entity_id = %entity_id,
            action = %action,
            error = %e,
            "Failed to append event log entry"
        );
    }
}
