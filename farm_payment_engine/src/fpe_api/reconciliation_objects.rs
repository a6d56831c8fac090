use std::time::Duration;

use fpg_common::Yen;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, PaymentIntentId},
    helpers::DEFAULT_ORDER_NUMBER_PREFIX,
};

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// A verified payment event, reduced to the fields reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    Succeeded(PaymentSucceeded),
    Failed(PaymentFailed),
    /// Any event type we do not act on.
    Unhandled { event_id: String, event_type: String },
}

impl PaymentEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Succeeded(e) => &e.event_id,
            Self::Failed(e) => &e.event_id,
            Self::Unhandled { event_id, .. } => event_id,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::Succeeded(_) => PAYMENT_SUCCEEDED,
            Self::Failed(_) => PAYMENT_FAILED,
            Self::Unhandled { event_type, .. } => event_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    pub event_id: String,
    pub payment_intent_id: PaymentIntentId,
    pub amount_received: Yen,
    /// The processor's payment method type, e.g. `card` or `konbini`.
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub event_id: String,
    pub payment_intent_id: PaymentIntentId,
    pub failure_message: Option<String>,
}

/// What processing a payment event did. Every variant is a successful (2xx) outcome from the processor's point of
/// view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// The order moved to `paid` on this event and the side effects were applied. Side-effect failures are listed,
    /// but do not undo the payment.
    Paid { order: Order, side_effect_failures: Vec<String> },
    /// This event id had been seen before, and there was nothing left to do.
    Duplicate { order_id: i64 },
    /// A different event (or a concurrent request) already moved the order to `paid`.
    AlreadyPaid { order_id: i64 },
    /// No order exists for the payment intent, even after retrying. The payment was set aside for the sweeper.
    OrderNotFound { payment_intent_id: PaymentIntentId },
    Failed { order: Order },
    AlreadyFailed { order_id: i64 },
    /// A failure event for an order that is already paid.
    TerminalState { order_id: i64 },
    Ignored { reason: String },
}

impl ReconciliationOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Paid { .. } => "paid",
            Self::Duplicate { .. } => "duplicate",
            Self::AlreadyPaid { .. } => "already_paid",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::Failed { .. } => "failed",
            Self::AlreadyFailed { .. } => "already_failed",
            Self::TerminalState { .. } => "terminal_state",
            Self::Ignored { .. } => "ignored",
        }
    }

    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Self::OrderNotFound { .. } => Some("order_not_found"),
            _ => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    pub fn paid_order(&self) -> Option<&Order> {
        match self {
            Self::Paid { order, .. } => Some(order),
            _ => None,
        }
    }
}

/// How hard to look for an order that the checkout flow may not have committed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LookupRetry {
    fn default() -> Self {
        Self { attempts: 3, delay: Duration::from_secs(1) }
    }
}

impl LookupRetry {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts: attempts.max(1), delay }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationSettings {
    pub lookup_retry: LookupRetry,
    pub order_number_prefix: String,
    /// Recorded when the processor does not report a payment method.
    pub default_payment_method: String,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            lookup_retry: LookupRetry::default(),
            order_number_prefix: DEFAULT_ORDER_NUMBER_PREFIX.to_string(),
            default_payment_method: "card".to_string(),
        }
    }
}

impl ReconciliationSettings {
    pub fn with_lookup_retry(mut self, retry: LookupRetry) -> Self {
        self.lookup_retry = retry;
        self
    }

    pub fn with_order_number_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.order_number_prefix = prefix.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    pub examined: usize,
    /// Orders that were paid by this sweep.
    pub settled: Vec<Order>,
    /// Side effects of settled orders that could not be applied. See [`ReconciliationOutcome::Paid`].
    pub side_effect_failures: usize,
    /// Records resolved against orders that were already paid.
    pub already_paid: usize,
    pub still_unmatched: usize,
    pub errors: usize,
}

impl SweepResult {
    pub fn resolved(&self) -> usize {
        self.settled.len() + self.already_paid
    }
}
