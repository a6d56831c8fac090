//! `SqliteDatabase` is a concrete implementation of a Farm Payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{coupons, db_url, events, new_pool, orders, stock, unmatched};
use crate::{
    db_types::{
        Coupon,
        NewCoupon,
        NewOrder,
        NewUnmatchedPayment,
        Order,
        OrderItem,
        PaymentIntentId,
        ProcessedEvent,
        SelectedOptions,
        StockRecord,
        UnmatchedPayment,
    },
    traits::{
        CouponLedger,
        EventStore,
        FailedTransition,
        LedgerError,
        OrderLedger,
        PaidTransition,
        ReconciliationDatabase,
        StockLedger,
        UnmatchedPayments,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl EventStore for SqliteDatabase {
    async fn record_if_new(&self, event_id: &str, event_type: &str) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let is_new = events::insert_if_new(event_id, event_type, &mut conn).await?;
        Ok(is_new)
    }

    async fn forget_event(&self, event_id: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let n = events::delete_event(event_id, &mut conn).await?;
        debug!("🗃️ Forgot event {event_id} ({n} record(s) removed)");
        Ok(())
    }

    async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let event = events::fetch_event(event_id, &mut conn).await?;
        Ok(event)
    }
}

impl OrderLedger for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_payment_intent(
        &self,
        payment_intent: &PaymentIntentId,
    ) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_intent(payment_intent, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn mark_order_paid(&self, order_id: i64, transition: PaidTransition) -> Result<Option<Order>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_paid(order_id, transition, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_failed(
        &self,
        order_id: i64,
        transition: FailedTransition,
    ) -> Result<Option<Order>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_failed(order_id, transition, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }
}

impl StockLedger for SqliteDatabase {
    async fn decrement_stock(
        &self,
        product_id: &str,
        options: &SelectedOptions,
        quantity: i64,
    ) -> Result<StockRecord, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let record = stock::decrement(product_id, options, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn fetch_stock(&self, product_id: &str, options: &SelectedOptions) -> Result<Option<StockRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let record = stock::fetch(product_id, options, &mut conn).await?;
        Ok(record)
    }

    async fn set_stock(
        &self,
        product_id: &str,
        options: &SelectedOptions,
        quantity: i64,
    ) -> Result<StockRecord, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let record = stock::upsert(product_id, options, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }
}

impl CouponLedger for SqliteDatabase {
    async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let coupon = coupons::insert_coupon(coupon, &mut tx).await?;
        tx.commit().await?;
        Ok(coupon)
    }

    async fn fetch_coupon(&self, coupon_id: i64) -> Result<Option<Coupon>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let coupon = coupons::fetch_coupon(coupon_id, &mut conn).await?;
        Ok(coupon)
    }

    async fn increment_coupon_usage(&self, coupon_id: i64) -> Result<Coupon, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let coupon = coupons::increment_usage(coupon_id, &mut tx).await?;
        tx.commit().await?;
        coupon.ok_or(LedgerError::CouponNotFound(coupon_id))
    }
}

impl UnmatchedPayments for SqliteDatabase {
    async fn record_unmatched_payment(&self, payment: NewUnmatchedPayment) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let inserted = unmatched::insert_unmatched(payment, &mut conn).await?;
        Ok(inserted)
    }

    async fn fetch_unresolved_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let payments = unmatched::fetch_unresolved(limit, &mut conn).await?;
        Ok(payments)
    }

    async fn resolve_unmatched_payment(&self, event_id: &str, order_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let resolved = unmatched::resolve(event_id, order_id, &mut conn).await?;
        Ok(resolved)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
