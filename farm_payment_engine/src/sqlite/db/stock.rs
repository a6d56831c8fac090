use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{SelectedOptions, StockRecord},
    traits::LedgerError,
};

/// Takes `quantity` units from the stock record. The `quantity >= $3` guard makes this safe under concurrency without
/// any read beforehand. If nothing was updated, a follow-up read determines which error to report.
pub async fn decrement(
    product_id: &str,
    options: &SelectedOptions,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<StockRecord, LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::InvalidQuantity(quantity));
    }
    let option_key = options.canonical_key();
    let record: Option<StockRecord> = sqlx::query_as(
        r#"
            UPDATE stock SET quantity = quantity - $3, updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1 AND option_key = $2 AND quantity >= $3
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(&option_key)
    .bind(quantity)
    .fetch_all(&mut *conn)
    .await?
    .pop();
    if let Some(record) = record {
        trace!("🗃️ Stock of {product_id} {option_key} is now {}", record.quantity);
        return Ok(record);
    }
    match fetch(product_id, options, conn).await? {
        Some(_) => Err(LedgerError::InsufficientStock {
            product_id: product_id.to_string(),
            option_key,
            requested: quantity,
        }),
        None => Err(LedgerError::StockRecordNotFound { product_id: product_id.to_string(), option_key }),
    }
}

pub async fn fetch(
    product_id: &str,
    options: &SelectedOptions,
    conn: &mut SqliteConnection,
) -> Result<Option<StockRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stock WHERE product_id = $1 AND option_key = $2")
        .bind(product_id)
        .bind(options.canonical_key())
        .fetch_optional(conn)
        .await
}

pub async fn upsert(
    product_id: &str,
    options: &SelectedOptions,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<StockRecord, LedgerError> {
    if quantity < 0 {
        return Err(LedgerError::InvalidQuantity(quantity));
    }
    let record: Option<StockRecord> = sqlx::query_as(
        r#"
            INSERT INTO stock (product_id, option_key, quantity) VALUES ($1, $2, $3)
            ON CONFLICT (product_id, option_key) DO UPDATE SET quantity = excluded.quantity, updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(product_id)
    .bind(options.canonical_key())
    .bind(quantity)
    .fetch_all(conn)
    .await?
    .pop();
    record.ok_or_else(|| sqlx::Error::RowNotFound.into())
}
