//! In-process ordering service.
//!
//! Behaves like the real backing service as far as the client core can
//! observe: it assigns ids, computes totals from its own menu, starts orders
//! at `PENDING`, and re-validates every mutation against
//! [`forkful_core::lifecycle`] regardless of what the client already checked.
//! Driver availability follows the service's side effects: assigning marks a
//! driver busy, and unassigning, cancelling or finishing the driver's last
//! active order frees them again.
//!
//! Tests can take the service offline to exercise network failures, add
//! latency so requests overlap, and read the call counter to assert that no
//! request was made.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use forkful_core::{
    Driver, DriverId, MenuItem, MenuItemId, NewOrder, Order, OrderId, OrderPatch, OrderStatus,
    PaymentStatus, Relation, Restaurant, RestaurantId, Role, UserId, check_assignment,
    check_transition,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{Caller, GatewayError, OrderGateway};

/// Payment method label that defers payment to the doorstep.
const CASH_ON_DELIVERY: &str = "COD";

/// In-memory implementation of [`OrderGateway`].
#[derive(Default)]
pub struct InMemoryOrderGateway {
    store: RwLock<Store>,
    offline: AtomicBool,
    calls: AtomicUsize,
    latency: Duration,
}

#[derive(Default)]
struct Store {
    last_order_id: i64,
    orders: BTreeMap<OrderId, Order>,
    drivers: BTreeMap<DriverId, Driver>,
    restaurants: BTreeMap<RestaurantId, Restaurant>,
    menu: BTreeMap<MenuItemId, MenuItem>,
    admins: BTreeSet<UserId>,
}

impl InMemoryOrderGateway {
    /// An empty service with no restaurants, drivers or admins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A small catalog for demos: one restaurant, two dishes, one admin
    /// (user 2) and one driver (driver 1, signing in as user 3).
    #[must_use]
    pub fn seeded() -> Self {
        let restaurant = RestaurantId::new(1);
        Self::new()
            .with_restaurant(
                Restaurant {
                    restaurant_id: restaurant,
                    name: "Pasta Palace".to_string(),
                    cuisine: Some("Italian".to_string()),
                    rating: Some(Decimal::new(45, 1)),
                    address: Some("12 Olive Street".to_string()),
                },
                vec![
                    MenuItem {
                        menu_item_id: MenuItemId::new(1),
                        restaurant_id: restaurant,
                        name: "Spaghetti Carbonara".to_string(),
                        price: Some(Decimal::new(1250, 2)),
                    },
                    MenuItem {
                        menu_item_id: MenuItemId::new(2),
                        restaurant_id: restaurant,
                        name: "Margherita Pizza".to_string(),
                        price: Some(Decimal::new(1000, 2)),
                    },
                ],
            )
            .with_admin(UserId::new(2))
            .with_driver(Driver {
                driver_id: DriverId::new(1),
                user_id: Some(UserId::new(3)),
                name: Some("Delivery Driver".to_string()),
                available: true,
            })
    }

    /// Register a restaurant and its menu.
    #[must_use]
    pub fn with_restaurant(mut self, restaurant: Restaurant, menu: Vec<MenuItem>) -> Self {
        let store = self.store.get_mut();
        for item in menu {
            store.menu.insert(item.menu_item_id, item);
        }
        store.restaurants.insert(restaurant.restaurant_id, restaurant);
        self
    }

    /// Register a driver.
    #[must_use]
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.store.get_mut().drivers.insert(driver.driver_id, driver);
        self
    }

    /// Grant `user` admin privileges.
    #[must_use]
    pub fn with_admin(mut self, user: UserId) -> Self {
        self.store.get_mut().admins.insert(user);
        self
    }

    /// Delay every call by `latency`, so requests overlap in tests.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Simulate the service being unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls received so far, including refused ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a stored order.
    pub async fn order(&self, order: OrderId) -> Option<Order> {
        self.store.read().await.orders.get(&order).cloned()
    }

    /// Snapshot of a stored driver.
    pub async fn driver(&self, driver: DriverId) -> Option<Driver> {
        self.store.read().await.drivers.get(&driver).cloned()
    }

    async fn enter(&self) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(
                "ordering service is unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Store {
    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, GatewayError> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| GatewayError::NotFound(format!("order {id}")))
    }

    fn require_admin(&self, caller: Caller) -> Result<(), GatewayError> {
        if caller.role == Role::Admin && self.admins.contains(&caller.user_id) {
            Ok(())
        } else {
            Err(GatewayError::Forbidden("admin privileges required".to_string()))
        }
    }

    fn driver_for_user(&self, user: UserId) -> Option<&Driver> {
        self.drivers.values().find(|d| d.user_id == Some(user))
    }

    fn has_active_orders(&self, driver: DriverId) -> bool {
        self.orders
            .values()
            .any(|o| o.is_assigned_to(driver) && !o.status.is_terminal())
    }

    /// Mark a driver available again once nothing active is assigned to them.
    fn release_driver(&mut self, driver: DriverId) {
        if self.has_active_orders(driver) {
            return;
        }
        if let Some(d) = self.drivers.get_mut(&driver) {
            d.available = true;
        }
    }

    fn price_items(&self, order: &NewOrder) -> Result<Decimal, GatewayError> {
        if order.items.is_empty() {
            return Err(GatewayError::BadRequest("order has no items".to_string()));
        }
        let mut total = Decimal::ZERO;
        for line in &order.items {
            let item = self.menu.get(&line.menu_item_id).ok_or_else(|| {
                GatewayError::BadRequest(format!("unknown menu item {}", line.menu_item_id))
            })?;
            if item.restaurant_id != order.restaurant_id {
                return Err(GatewayError::BadRequest(format!(
                    "menu item {} is not served by restaurant {}",
                    line.menu_item_id, order.restaurant_id
                )));
            }
            if line.quantity == 0 {
                return Err(GatewayError::BadRequest(format!(
                    "menu item {} has zero quantity",
                    line.menu_item_id
                )));
            }
            let price = item.price.ok_or_else(|| {
                GatewayError::BadRequest(format!("menu item {} has no price", line.menu_item_id))
            })?;
            total += price * Decimal::from(line.quantity);
        }
        Ok(total)
    }

    fn apply_admin_patch(
        &mut self,
        id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order, GatewayError> {
        let order = self.order_mut(id)?;
        let current = order.status;
        let previous_driver = order.driver_id;

        if let Some(next) = patch.driver {
            check_assignment(Role::Admin, current)?;
            if let Some(driver) = next.filter(|d| !self.drivers.contains_key(d)) {
                return Err(GatewayError::NotFound(format!("driver {driver}")));
            }
        }
        if let Some(target) = patch.status {
            check_transition(Role::Admin, current, target, Relation::Unrelated)?;
        }

        let order = self.order_mut(id)?;
        if let Some(target) = patch.status {
            order.status = target;
        }
        if let Some(next) = patch.driver {
            order.driver_id = next;
        }
        let updated = order.clone();

        if let Some(next) = patch.driver.filter(|next| *next != previous_driver) {
            if let Some(driver) = next.and_then(|d| self.drivers.get_mut(&d)) {
                driver.available = false;
            }
            if let Some(previous) = previous_driver {
                self.release_driver(previous);
            }
        }
        Ok(updated)
    }

    fn apply_driver_status(
        &mut self,
        id: OrderId,
        user: UserId,
        target: OrderStatus,
    ) -> Result<Order, GatewayError> {
        let driver = self
            .driver_for_user(user)
            .map(|d| d.driver_id)
            .ok_or_else(|| GatewayError::Forbidden("driver profile not found".to_string()))?;

        let order = self.order_mut(id)?;
        check_transition(Role::Driver, order.status, target, order.is_assigned_to(driver))?;
        order.status = target;
        let updated = order.clone();

        if target.is_terminal() {
            self.release_driver(driver);
        }
        Ok(updated)
    }

    fn apply_customer_cancel(&mut self, id: OrderId, user: UserId) -> Result<Order, GatewayError> {
        let order = self.order_mut(id)?;
        check_transition(
            Role::Customer,
            order.status,
            OrderStatus::Cancelled,
            order.customer_id == user,
        )?;
        order.status = OrderStatus::Cancelled;
        let released = order.driver_id.take();
        let updated = order.clone();

        if let Some(driver) = released {
            self.release_driver(driver);
        }
        Ok(updated)
    }
}

#[async_trait]
impl OrderGateway for InMemoryOrderGateway {
    #[instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, GatewayError> {
        self.enter().await?;
        let mut store = self.store.write().await;

        if !store.restaurants.contains_key(&order.restaurant_id) {
            return Err(GatewayError::BadRequest(format!(
                "unknown restaurant {}",
                order.restaurant_id
            )));
        }
        let total_amount = store.price_items(&order)?;

        let payment_status = match (&order.payment_method, &order.transaction_id) {
            (Some(method), Some(_)) if method != CASH_ON_DELIVERY => PaymentStatus::Paid,
            _ => PaymentStatus::Pending,
        };

        store.last_order_id += 1;
        let created = Order {
            order_id: OrderId::new(store.last_order_id),
            customer_id: order.customer_id,
            restaurant_id: order.restaurant_id,
            driver_id: None,
            items: order.items,
            delivery_address: order.delivery_address,
            payment_method: order.payment_method,
            transaction_id: order.transaction_id,
            payment_status,
            status: OrderStatus::Pending,
            total_amount,
            created_at: Utc::now(),
        };
        store.orders.insert(created.order_id, created.clone());
        debug!(order_id = %created.order_id, total = %created.total_amount, "Order stored");
        Ok(created)
    }

    async fn list_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        Ok(store
            .orders
            .values()
            .filter(|o| o.customer_id == customer)
            .cloned()
            .collect())
    }

    async fn list_orders_for_admin(&self, caller: Caller) -> Result<Vec<Order>, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        store.require_admin(caller)?;
        Ok(store.orders.values().cloned().collect())
    }

    async fn list_drivers(&self, caller: Caller) -> Result<Vec<Driver>, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        store.require_admin(caller)?;
        Ok(store.drivers.values().cloned().collect())
    }

    async fn list_orders_for_driver(&self, driver: DriverId) -> Result<Vec<Order>, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        if !store.drivers.contains_key(&driver) {
            return Err(GatewayError::NotFound(format!("driver {driver}")));
        }
        Ok(store
            .orders
            .values()
            .filter(|o| o.is_assigned_to(driver))
            .cloned()
            .collect())
    }

    async fn driver_profile(&self, user: UserId) -> Result<Driver, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        store
            .driver_for_user(user)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("driver profile for user {user}")))
    }

    #[instrument(skip(self), fields(order_id = %order, role = %caller.role))]
    async fn update_order(
        &self,
        order: OrderId,
        patch: OrderPatch,
        caller: Caller,
    ) -> Result<Order, GatewayError> {
        self.enter().await?;
        if patch.is_empty() {
            return Err(GatewayError::BadRequest("nothing to update".to_string()));
        }
        let mut store = self.store.write().await;

        match caller.role {
            Role::Admin => {
                store.require_admin(caller)?;
                store.apply_admin_patch(order, patch)
            }
            Role::Driver | Role::Customer if patch.driver.is_some() => {
                Err(forkful_core::TransitionError::AssignmentNotPermitted(caller.role).into())
            }
            Role::Driver => {
                let target = patch
                    .status
                    .ok_or_else(|| GatewayError::BadRequest("status is required".to_string()))?;
                store.apply_driver_status(order, caller.user_id, target)
            }
            Role::Customer => match patch.status {
                Some(OrderStatus::Cancelled) => store.apply_customer_cancel(order, caller.user_id),
                Some(target) => {
                    let from = store.order_mut(order)?.status;
                    Err(forkful_core::TransitionError::NotPermitted {
                        role: Role::Customer,
                        from,
                        to: target,
                    }
                    .into())
                }
                None => Err(GatewayError::BadRequest("status is required".to_string())),
            },
        }
    }

    #[instrument(skip(self), fields(order_id = %order))]
    async fn cancel_order(&self, order: OrderId, caller: UserId) -> Result<Order, GatewayError> {
        self.enter().await?;
        let mut store = self.store.write().await;
        store.apply_customer_cancel(order, caller)
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        Ok(store.restaurants.values().cloned().collect())
    }

    async fn list_menu(&self, restaurant: RestaurantId) -> Result<Vec<MenuItem>, GatewayError> {
        self.enter().await?;
        let store = self.store.read().await;
        if !store.restaurants.contains_key(&restaurant) {
            return Err(GatewayError::NotFound(format!("restaurant {restaurant}")));
        }
        Ok(store
            .menu
            .values()
            .filter(|item| item.restaurant_id == restaurant)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::OrderItem;

    use super::*;

    fn new_order(items: Vec<OrderItem>, method: Option<&str>, txn: Option<&str>) -> NewOrder {
        NewOrder {
            customer_id: UserId::new(10),
            restaurant_id: RestaurantId::new(1),
            items,
            delivery_address: None,
            payment_method: method.map(str::to_string),
            transaction_id: txn.map(str::to_string),
        }
    }

    fn line(id: i64, quantity: u32) -> OrderItem {
        OrderItem {
            menu_item_id: MenuItemId::new(id),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_total_is_priced_from_menu() {
        let service = InMemoryOrderGateway::seeded();
        let order = service
            .create_order(new_order(vec![line(1, 2), line(2, 1)], Some("COD"), None))
            .await
            .unwrap();

        assert_eq!(order.total_amount, Decimal::new(3500, 2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.order_id, OrderId::new(1));
    }

    #[tokio::test]
    async fn test_paid_only_with_transaction_and_online_method() {
        let service = InMemoryOrderGateway::seeded();
        let paid = service
            .create_order(new_order(vec![line(1, 1)], Some("UPI"), Some("TXN1")))
            .await
            .unwrap();
        let cod = service
            .create_order(new_order(vec![line(1, 1)], Some("COD"), Some("COD1")))
            .await
            .unwrap();

        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(cod.payment_status, PaymentStatus::Pending);
        assert_eq!(cod.order_id, OrderId::new(2));
    }

    #[tokio::test]
    async fn test_rejects_bad_lines() {
        let service = InMemoryOrderGateway::seeded();
        for items in [vec![], vec![line(1, 0)], vec![line(99, 1)]] {
            let err = service
                .create_order(new_order(items, None, None))
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn test_offline_counts_calls() {
        let service = InMemoryOrderGateway::seeded();
        service.set_offline(true);
        assert!(matches!(
            service.list_restaurants().await,
            Err(GatewayError::Unavailable(_))
        ));
        service.set_offline(false);
        service.list_restaurants().await.unwrap();
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_customer_cancel_frees_driver() {
        let service = InMemoryOrderGateway::seeded();
        let order = service
            .create_order(new_order(vec![line(1, 1)], Some("COD"), None))
            .await
            .unwrap();
        let admin = Caller::new(UserId::new(2), Role::Admin);
        service
            .update_order(order.order_id, OrderPatch::assign(Some(DriverId::new(1))), admin)
            .await
            .unwrap();
        assert!(!service.driver(DriverId::new(1)).await.unwrap().available);

        let cancelled = service
            .cancel_order(order.order_id, UserId::new(10))
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.driver_id, None);
        assert!(service.driver(DriverId::new(1)).await.unwrap().available);
    }
}
