//! Order, driver and catalog records as the client core sees them.
//!
//! These serialize with camelCase names. The HTTP gateway translates the
//! backing service's own payloads into them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{DriverId, MenuItemId, OrderId, RestaurantId, UserId};
use super::status::{OrderStatus, PaymentStatus};

/// One ordered menu item and its quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

/// The server-of-record purchase.
///
/// Only `status` and `driver_id` change after creation, and only through
/// the transitions sanctioned by [`crate::lifecycle`]. `total_amount` is
/// computed by the server at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub restaurant_id: RestaurantId,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Payment reference forwarded by checkout.
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Whether `driver` is the driver this order is assigned to.
    #[must_use]
    pub fn is_assigned_to(&self, driver: DriverId) -> bool {
        self.driver_id == Some(driver)
    }

    /// Total number of units across all items.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Order creation request produced by checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: UserId,
    pub restaurant_id: RestaurantId,
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Partial update of an order's mutable fields.
///
/// `driver` is three-state: `None` leaves the assignment alone,
/// `Some(None)` clears it, `Some(Some(id))` assigns `id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(rename = "driverId", skip_serializing_if = "Option::is_none")]
    pub driver: Option<Option<DriverId>>,
}

impl OrderPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub const fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            driver: None,
        }
    }

    /// Patch that only assigns (or with `None`, unassigns) a driver.
    #[must_use]
    pub const fn assign(driver: Option<DriverId>) -> Self {
        Self {
            status: None,
            driver: Some(driver),
        }
    }

    /// A patch that changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.driver.is_none()
    }
}

/// A delivery driver, relevant here only as an assignment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub driver_id: DriverId,
    /// Account the driver signs in with.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub available: bool,
}

/// A restaurant customers can order from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub restaurant_id: RestaurantId,
    pub name: String,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub rating: Option<Decimal>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A dish on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub menu_item_id: MenuItemId,
    pub restaurant_id: RestaurantId,
    pub name: String,
    /// Missing when the restaurant has not priced the dish yet.
    #[serde(default)]
    pub price: Option<Decimal>,
}
