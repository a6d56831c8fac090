use crate::{
    db_types::{NewUnmatchedPayment, UnmatchedPayment},
    traits::LedgerError,
};

/// Successful payments that arrived before (or without) their order.
#[allow(async_fn_in_trait)]
pub trait UnmatchedPayments {
    /// Returns `false` if a record for this event id already exists.
    async fn record_unmatched_payment(&self, payment: NewUnmatchedPayment) -> Result<bool, LedgerError>;

    /// Unresolved records, oldest first.
    async fn fetch_unresolved_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, LedgerError>;

    /// Marks the record as resolved against the given order. Returns `false` if it was already resolved.
    async fn resolve_unmatched_payment(&self, event_id: &str, order_id: i64) -> Result<bool, LedgerError>;
}
