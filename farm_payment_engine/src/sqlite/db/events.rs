use log::trace;
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::db_types::ProcessedEvent;

/// Inserts the event id. A primary key conflict means the event has been seen before, and `false` is returned.
pub async fn insert_if_new(event_id: &str, event_type: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT INTO processed_events (event_id, event_type) VALUES ($1, $2)")
        .bind(event_id)
        .bind(event_type)
        .execute(conn)
        .await;
    match result {
        Ok(_) => {
            trace!("🗃️ Event {event_id} recorded");
            Ok(true)
        },
        Err(e) if is_unique_violation(&e) => {
            trace!("🗃️ Event {event_id} has been recorded before");
            Ok(false)
        },
        Err(e) => Err(e),
    }
}

pub async fn delete_event(event_id: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM processed_events WHERE event_id = $1").bind(event_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn fetch_event(event_id: &str, conn: &mut SqliteConnection) -> Result<Option<ProcessedEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM processed_events WHERE event_id = $1").bind(event_id).fetch_optional(conn).await
}
