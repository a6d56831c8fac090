//! Farm Payment Engine
//!
//! The Farm Payment Engine reconciles card-processor payment notifications with storefront orders. It is
//! provider-agnostic: the processor-specific wire format and signature scheme live in the server crate, and arrive here
//! as verified [`PaymentEvent`]s.
//!
//! The library is divided into the following sections:
//! 1. Data types ([`mod@db_types`]) and the ledger traits ([`mod@traits`]) that database backends implement. SQLite is
//!    the supported backend. You should never need to access the database directly. Instead, use the public API.
//! 2. The reconciliation API ([`ReconciliationApi`]). It records each event exactly once, moves orders to `paid` or
//!    `failed` with guarded updates, and applies the side effects of a payment (stock, coupon usage, notifications)
//!    exactly once per order.
//!
//! The engine also provides a set of events that can be subscribed to. For example, when an order is paid, an
//! [`events::OrderPaidEvent`] is emitted. A simple actor framework is used so that you can hook into these events
//! without holding up the payment flow.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

mod fpe_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use fpe_api::{
    errors::ReconciliationError,
    reconciliation_api::ReconciliationApi,
    reconciliation_objects::{
        LookupRetry,
        PaymentEvent,
        PaymentFailed,
        PaymentSucceeded,
        ReconciliationOutcome,
        ReconciliationSettings,
        SweepResult,
        PAYMENT_FAILED,
        PAYMENT_SUCCEEDED,
    },
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{LedgerError, ReconciliationDatabase};
