//! Core types for Forkful.
//!
//! This module provides type-safe wrappers and records for the ordering
//! domain.

pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Driver, MenuItem, NewOrder, Order, OrderItem, OrderPatch, Restaurant};
pub use price::{format_amount, line_total};
pub use role::{Role, RoleParseError};
pub use status::*;
