//! # Ledger traits
//!
//! This module defines the interface contracts that payment engine database *backends* must honour.
//!
//! Every cross-request coordination point of the reconciliation flow is expressed here as a single atomic backend
//! operation, so that correctness never depends on in-process locks:
//!
//! * [`EventStore`] is the idempotency gate. Recording an event id is an insert, and a conflict means "seen before".
//! * [`OrderLedger`] holds orders and their line items, and performs the status-guarded payment transitions.
//! * [`StockLedger`] performs the guarded stock decrement.
//! * [`CouponLedger`] performs the coupon usage increment.
//! * [`UnmatchedPayments`] remembers successful payments whose order could not be found.
//!
//! [`ReconciliationDatabase`] ties these together and is what the [`crate::ReconciliationApi`] is generic over.
mod coupon_ledger;
mod data_objects;
mod event_store;
mod order_ledger;
mod reconciliation_database;
mod stock_ledger;
mod unmatched_payments;

pub use coupon_ledger::CouponLedger;
pub use data_objects::{FailedTransition, PaidTransition};
pub use event_store::EventStore;
pub use order_ledger::OrderLedger;
pub use reconciliation_database::{LedgerError, ReconciliationDatabase};
pub use stock_ledger::StockLedger;
pub use unmatched_payments::UnmatchedPayments;
