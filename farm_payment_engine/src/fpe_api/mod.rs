//! # Farm payment engine public API
//!
//! The `fpe_api` module exposes the programmatic API for the Farm Payment engine.
//!
//! * [`reconciliation_api`] turns processor payment events into order state transitions and their side effects.
//! * [`reconciliation_objects`] holds the event and outcome types that flow in and out of the API.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits required by the API.
//!
//! ```rust,ignore
//! use farm_payment_engine::{events::EventProducers, ReconciliationApi, ReconciliationSettings, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = ReconciliationApi::new(db, EventProducers::default(), ReconciliationSettings::default());
//! let outcome = api.process_event(event).await?;
//! ```
pub mod errors;
pub mod reconciliation_api;
pub mod reconciliation_objects;
