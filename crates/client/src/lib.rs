//! Forkful Client - Cart, checkout and role-scoped order coordination.
//!
//! # Architecture
//!
//! - [`session::SessionContext`] is the explicit per-user context: it owns the
//!   selected restaurant, the [`cart::Cart`] and the payment cancellation
//!   root, and tears them down at sign-out
//! - [`checkout::CheckoutOrchestrator`] turns a cart into an order in two
//!   phases (payment confirmation, then order creation)
//! - [`views`] hold the customer, admin and driver projections of the orders
//!   they can see, and push transitions through
//!   [`forkful_core::lifecycle`] before sending them
//! - [`gateway::OrderGateway`] is the only boundary to the ordering service
//!
//! # Modules
//!
//! - [`cart`] - Restaurant-scoped cart aggregate
//! - [`checkout`] - Two-phase checkout orchestrator
//! - [`config`] - Environment configuration
//! - [`error`] - `AppError` and Sentry helpers
//! - [`gateway`] - Ordering service contract, HTTP and in-memory implementations
//! - [`payment`] - Simulated payment confirmation (QR, UPI ID, cash)
//! - [`session`] - Identity and per-user state
//! - [`views`] - Customer history, admin console, driver console

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod payment;
pub mod session;
pub mod views;

pub use error::{AppError, Result};
