//! Payment gateway reconciliation service for the storefront backend.
//!
//! Creates QR payment requests and wallet-funded payouts at the configured
//! gateways, records them in the payment ledger and reconciles order and
//! wallet state from gateway callbacks.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
