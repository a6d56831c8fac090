use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, PaymentIntentId};
use fpg_common::Yen;

/// Published exactly once per order, on the `-> paid` transition edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

/// Published when a successful payment could not be matched to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUnmatchedEvent {
    pub event_id: String,
    pub payment_intent_id: PaymentIntentId,
    pub amount_received: Yen,
}
