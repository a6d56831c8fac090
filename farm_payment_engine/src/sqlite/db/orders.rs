use log::{debug, trace};
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderItem, PaymentIntentId},
    traits::{FailedTransition, LedgerError, PaidTransition},
};

/// Inserts a new order and its line items using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, LedgerError> {
    let subtotal = order.subtotal();
    let total = order.total_amount();
    let pi = order.payment_intent_id.clone();
    let result = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (
                payment_intent_id,
                customer_name,
                customer_email,
                customer_phone,
                shipping_postal_code,
                shipping_prefecture,
                shipping_address,
                subtotal,
                shipping_fee,
                discount_amount,
                total_amount,
                coupon_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order.payment_intent_id)
    .bind(order.customer_name)
    .bind(order.customer_email)
    .bind(order.customer_phone)
    .bind(order.shipping_postal_code)
    .bind(order.shipping_prefecture)
    .bind(order.shipping_address)
    .bind(subtotal)
    .bind(order.shipping_fee)
    .bind(order.discount_amount)
    .bind(total)
    .bind(order.coupon_id)
    .fetch_all(&mut *conn)
    .await;
    let saved: Order = match result.map(|mut rows| rows.pop()) {
        Ok(Some(o)) => o,
        Ok(None) => return Err(sqlx::Error::RowNotFound.into()),
        Err(e) if is_unique_violation(&e) => return Err(LedgerError::OrderAlreadyExists(pi)),
        Err(e) => return Err(e.into()),
    };
    for item in order.items {
        insert_item(saved.id, item, conn).await?;
    }
    debug!("🗃️ Order #{} for payment intent {} inserted with total {total}", saved.id, saved.payment_intent_id);
    Ok(saved)
}

async fn insert_item(order_id: i64, item: NewOrderItem, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    if item.quantity <= 0 {
        return Err(LedgerError::InvalidQuantity(item.quantity));
    }
    let line_total = item.line_total();
    sqlx::query(
        r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, selected_options, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.product_name)
    .bind(item.quantity)
    .bind(item.selected_options.canonical_key())
    .bind(item.unit_price)
    .bind(line_total)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_payment_intent(
    payment_intent: &PaymentIntentId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_intent_id = $1")
        .bind(payment_intent.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

// Writes with `RETURNING` are drained with `fetch_all`. An UPDATE that is not stepped to completion is not committed.

/// The guarded `-> paid` transition. The status check and the write happen in the same statement, so of any number of
/// concurrent callers, exactly one gets the updated row back.
pub async fn mark_paid(
    order_id: i64,
    transition: PaidTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let notes = transition.joined_notes();
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_status = 'paid',
                fulfillment_status = 'processing',
                paid_at = $2,
                payment_method = $3,
                order_number = COALESCE(order_number, $4),
                notes = CASE
                    WHEN $5 IS NULL THEN notes
                    WHEN notes = '' THEN $5
                    ELSE notes || char(10) || $5
                END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(transition.paid_at)
    .bind(transition.payment_method)
    .bind(transition.order_number)
    .bind(notes)
    .fetch_all(conn)
    .await?
    .pop();
    match &order {
        Some(o) => trace!("🗃️ Order #{order_id} marked as paid with number {:?}", o.order_number),
        None => trace!("🗃️ Order #{order_id} was already paid. Nothing written"),
    }
    Ok(order)
}

/// The guarded `-> failed` transition. The note is only appended if the order was still pending.
pub async fn mark_failed(
    order_id: i64,
    transition: FailedTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET
                notes = CASE
                    WHEN $2 IS NULL OR payment_status <> 'pending' THEN notes
                    WHEN notes = '' THEN $2
                    ELSE notes || char(10) || $2
                END,
                payment_status = 'failed',
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(transition.note)
    .fetch_all(conn)
    .await
    .map(|mut rows| rows.pop())
}
