use crate::{
    db_types::{NewOrder, Order, OrderItem, PaymentIntentId},
    traits::{FailedTransition, LedgerError, PaidTransition},
};

/// Orders and their line items.
///
/// Orders are created by the checkout flow before the customer is sent to the processor. The reconciliation flow only
/// ever reads them and performs the guarded payment transitions below.
#[allow(async_fn_in_trait)]
pub trait OrderLedger {
    /// Stores a new order with its line items in a single transaction. Subtotal and total are computed from the items.
    ///
    /// Fails with [`LedgerError::OrderAlreadyExists`] if an order for the payment intent already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, LedgerError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, LedgerError>;

    async fn fetch_order_by_payment_intent(&self, payment_intent: &PaymentIntentId)
        -> Result<Option<Order>, LedgerError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, LedgerError>;

    /// Moves the order to `paid` and `processing`, provided it is not already paid.
    ///
    /// The check and the write are one statement. If another request won the race (or the order was already paid),
    /// `None` is returned and nothing is written. The order number is only set if the order does not have one.
    async fn mark_order_paid(&self, order_id: i64, transition: PaidTransition) -> Result<Option<Order>, LedgerError>;

    /// Moves the order to `failed`, provided it is not paid. Returns `None` if the order is paid.
    async fn mark_order_failed(
        &self,
        order_id: i64,
        transition: FailedTransition,
    ) -> Result<Option<Order>, LedgerError>;
}
