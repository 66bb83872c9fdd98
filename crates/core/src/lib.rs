//! Forkful Core - Shared order types and the order status state machine.
//!
//! This crate provides the types used across all Forkful components:
//! - `client` - Cart, checkout orchestration and role-scoped order views
//! - `cli` - Command-line driver for the client core
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no HTTP
//! clients, no async. The state machine in [`lifecycle`] is the single
//! definition of which role may move an order where; every view and the
//! in-memory backing service consult it instead of deriving permissions
//! inline.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, statuses, roles and records
//! - [`lifecycle`] - Allowed transitions per role and their validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod lifecycle;
pub mod types;

pub use lifecycle::{
    Relation, TransitionError, allowed_transitions, check_assignment, check_transition,
};
pub use types::*;
