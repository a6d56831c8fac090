//! # Farm Payment Gateway server
//! This module hosts the server code for the payment gateway. It is responsible for:
//! Listening for incoming webhook requests from the card processor.
//! Verifying the signature of each delivery against the raw request body.
//! Handing the verified payment event to the reconciliation engine, and answering the processor.
//! Relaying paid orders to a downstream service, and periodically sweeping payments that arrived before their order.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: The webhook route for receiving payment events from the processor.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod signature;
pub mod sweep_worker;

#[cfg(test)]
mod endpoint_tests;
