//! Payloads of the ordering service's REST API.
//!
//! The service does not speak the core records directly: records carry `id`
//! rather than `orderId`/`driverId`, related records are nested as
//! `{"id": ..}` objects, timestamps are zone-less `orderDate` values, and
//! several mutations answer with an envelope or a bare acknowledgement.
//! Everything here is decoded leniently (unknown fields ignored, optional
//! fields defaulted) and converted into the core types at the edge.
//!
//! Some listings omit a relation the caller already knows (the customer in
//! their own history, the driver in their own assignments, the restaurant in
//! its menu); conversions take those as fallbacks.

use chrono::{DateTime, NaiveDateTime, Utc};
use forkful_core::{
    Driver, DriverId, MenuItem, MenuItemId, NewOrder, Order, OrderId, OrderItem, OrderStatus,
    PaymentStatus, Restaurant, RestaurantId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::GatewayError;

/// A nested `{"id": ..}` reference; other fields of the nested object are
/// ignored.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(super) struct Ref<T> {
    pub id: T,
}

/// `POST /api/orders` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateOrderBody<'a> {
    user_id: UserId,
    restaurant_id: RestaurantId,
    items: &'a [OrderItem],
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<&'a str>,
}

impl<'a> From<&'a NewOrder> for CreateOrderBody<'a> {
    fn from(order: &'a NewOrder) -> Self {
        Self {
            user_id: order.customer_id,
            restaurant_id: order.restaurant_id,
            items: &order.items,
            delivery_address: order.delivery_address.as_deref(),
            payment_method: order.payment_method.as_deref(),
            transaction_id: order.transaction_id.as_deref(),
        }
    }
}

/// `POST /api/orders` answer. The full record has to be read back.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderCreated {
    pub order_id: OrderId,
}

/// `PATCH /api/orders/{id}/cancel` answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderCancelled {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// `GET /api/driver/orders` answer.
#[derive(Debug, Deserialize)]
pub(super) struct DriverOrders {
    pub driver: DriverView,
    #[serde(default)]
    pub orders: Vec<OrderView>,
}

/// `PATCH /api/driver/orders/{id}/status` answer.
#[derive(Debug, Deserialize)]
pub(super) struct DriverStatusChanged {
    pub order: OrderView,
    pub driver: DriverView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderItemView {
    quantity: u32,
    #[serde(default)]
    menu_item: Option<Ref<MenuItemId>>,
}

/// An order as any of the service's listings render it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderView {
    pub id: OrderId,
    status: OrderStatus,
    #[serde(default)]
    total_amount: Option<Decimal>,
    #[serde(default)]
    delivery_address: Option<String>,
    #[serde(default)]
    order_date: Option<NaiveDateTime>,
    #[serde(default)]
    payment_status: Option<PaymentStatus>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    restaurant: Option<Ref<RestaurantId>>,
    /// `user` in admin listings, `customer` in driver listings.
    #[serde(default, alias = "customer")]
    user: Option<Ref<UserId>>,
    #[serde(default)]
    driver: Option<Ref<DriverId>>,
    #[serde(default)]
    items: Vec<OrderItemView>,
}

impl OrderView {
    /// Convert to a core record, filling relations the listing left out.
    pub fn into_order(
        self,
        customer: Option<UserId>,
        driver: Option<DriverId>,
    ) -> Result<Order, GatewayError> {
        let id = self.id;
        let missing = |field: &str| GatewayError::Incomplete(format!("order {id}: {field}"));

        let customer_id = self
            .user
            .map(|u| u.id)
            .or(customer)
            .ok_or_else(|| missing("customer"))?;
        let restaurant_id = self
            .restaurant
            .map(|r| r.id)
            .ok_or_else(|| missing("restaurant"))?;
        let total_amount = self.total_amount.ok_or_else(|| missing("totalAmount"))?;

        Ok(Order {
            order_id: id,
            customer_id,
            restaurant_id,
            driver_id: self.driver.map(|d| d.id).or(driver),
            items: self
                .items
                .into_iter()
                .filter_map(|item| {
                    item.menu_item.map(|menu_item| OrderItem {
                        menu_item_id: menu_item.id,
                        quantity: item.quantity,
                    })
                })
                .collect(),
            delivery_address: self.delivery_address,
            payment_method: self.payment_method,
            transaction_id: self.transaction_id,
            payment_status: self.payment_status.unwrap_or_default(),
            status: self.status,
            total_amount,
            created_at: self
                .order_date
                .map_or_else(DateTime::<Utc>::default, |date| date.and_utc()),
        })
    }
}

/// Convert a listing in which every order shares the same fallbacks.
pub(super) fn into_orders(
    views: Vec<OrderView>,
    customer: Option<UserId>,
    driver: Option<DriverId>,
) -> Result<Vec<Order>, GatewayError> {
    views
        .into_iter()
        .map(|view| view.into_order(customer, driver))
        .collect()
}

/// A driver as the profile, assignment and admin listings render it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DriverView {
    pub id: DriverId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    available: Option<bool>,
    #[serde(default)]
    user: Option<Ref<UserId>>,
    /// Only in the admin listing, which omits `available`.
    #[serde(default)]
    active_order_count: Option<u64>,
}

impl DriverView {
    /// Record the sign-in account when the answer omitted it.
    pub fn ensure_user(&mut self, user: UserId) {
        if self.user.is_none() {
            self.user = Some(Ref { id: user });
        }
    }
}

impl From<DriverView> for Driver {
    fn from(view: DriverView) -> Self {
        let available = view
            .available
            .or_else(|| view.active_order_count.map(|active| active == 0))
            .unwrap_or(true);
        Self {
            driver_id: view.id,
            user_id: view.user.map(|u| u.id),
            name: view.name,
            available,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RestaurantView {
    id: RestaurantId,
    name: String,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    rating: Option<Decimal>,
    #[serde(default)]
    address: Option<String>,
}

impl From<RestaurantView> for Restaurant {
    fn from(view: RestaurantView) -> Self {
        Self {
            restaurant_id: view.id,
            name: view.name,
            cuisine: view.cuisine,
            rating: view.rating,
            address: view.address,
        }
    }
}

/// Menu entries leave their restaurant out.
#[derive(Debug, Deserialize)]
pub(super) struct MenuItemView {
    id: MenuItemId,
    name: String,
    #[serde(default)]
    price: Option<Decimal>,
}

impl MenuItemView {
    pub fn into_menu_item(self, restaurant: RestaurantId) -> MenuItem {
        MenuItem {
            menu_item_id: self.id,
            restaurant_id: restaurant,
            name: self.name,
            price: self.price,
        }
    }
}
