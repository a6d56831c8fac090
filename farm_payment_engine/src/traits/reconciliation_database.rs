use thiserror::Error;

use crate::{
    db_types::PaymentIntentId,
    traits::{CouponLedger, EventStore, OrderLedger, StockLedger, UnmatchedPayments},
};

/// The highest level of behaviour for backends supporting the reconciliation flow.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: Clone + EventStore + OrderLedger + StockLedger + CouponLedger + UnmatchedPayments {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("The ledger database failed: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since one already exists for payment intent {0}")]
    OrderAlreadyExists(PaymentIntentId),
    #[error("Not enough stock of {product_id} {option_key} to take {requested}")]
    InsufficientStock { product_id: String, option_key: String, requested: i64 },
    #[error("There is no stock record for {product_id} {option_key}")]
    StockRecordNotFound { product_id: String, option_key: String },
    #[error("The requested coupon (id {0}) does not exist")]
    CouponNotFound(i64),
    #[error("Quantities must be positive, but got {0}")]
    InvalidQuantity(i64),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
