use sqlx::SqliteConnection;

use crate::db_types::{Coupon, NewCoupon};

pub async fn insert_coupon(coupon: NewCoupon, conn: &mut SqliteConnection) -> Result<Coupon, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO coupons (code, usage_limit, valid_from, valid_until) VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(coupon.code)
    .bind(coupon.usage_limit)
    .bind(coupon.valid_from)
    .bind(coupon.valid_until)
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)
}

pub async fn fetch_coupon(coupon_id: i64, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM coupons WHERE id = $1").bind(coupon_id).fetch_optional(conn).await
}

/// Single-statement increment, so concurrent increments are never lost.
pub async fn increment_usage(coupon_id: i64, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as::<_, Coupon>("UPDATE coupons SET usage_count = usage_count + 1 WHERE id = $1 RETURNING *")
        .bind(coupon_id)
        .fetch_all(conn)
        .await
        .map(|mut rows| rows.pop())
}
