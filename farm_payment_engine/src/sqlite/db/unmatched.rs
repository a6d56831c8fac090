use sqlx::SqliteConnection;

use crate::db_types::{NewUnmatchedPayment, UnmatchedPayment};

pub async fn insert_unmatched(payment: NewUnmatchedPayment, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO unmatched_payments (event_id, payment_intent_id, amount_received, payment_method)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING;
        "#,
    )
    .bind(payment.event_id)
    .bind(payment.payment_intent_id)
    .bind(payment.amount_received)
    .bind(payment.payment_method)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_unresolved(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<UnmatchedPayment>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM unmatched_payments WHERE resolved_at IS NULL ORDER BY received_at, event_id LIMIT $1",
    )
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn resolve(event_id: &str, order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE unmatched_payments SET resolved_at = CURRENT_TIMESTAMP, resolved_order_id = $2
            WHERE event_id = $1 AND resolved_at IS NULL;
        "#,
    )
    .bind(event_id)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
