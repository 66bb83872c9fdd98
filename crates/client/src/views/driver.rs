//! Driver console.

use forkful_core::{
    Driver, DriverId, Order, OrderId, OrderPatch, OrderStatus, Role, allowed_transitions,
    check_transition,
};
use tracing::{debug, instrument};

use super::OrderBoard;
use crate::error::Result;
use crate::gateway::{Caller, OrderGateway};
use crate::session::Session;

/// Orders assigned to the signed-in driver.
///
/// The driver record is resolved from the session's user on first load.
pub struct DriverConsole<G> {
    gateway: G,
    caller: Caller,
    driver: Option<Driver>,
    board: OrderBoard,
}

impl<G: OrderGateway> DriverConsole<G> {
    /// A driver console for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::MissingRole`] unless the session is a
    /// driver.
    pub fn new(gateway: G, session: &Session) -> Result<Self> {
        Ok(Self {
            gateway,
            caller: session.caller(Role::Driver)?,
            driver: None,
            board: OrderBoard::new(),
        })
    }

    /// The resolved driver record, once loaded.
    #[must_use]
    pub const fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    /// Resolve the driver profile if needed, then fetch assigned orders.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::NetworkFailure`] if the profile or the
    /// listing cannot be fetched.
    #[instrument(skip(self), fields(user_id = %self.caller.user_id))]
    pub async fn load(&mut self) -> Result<Vec<Order>> {
        let driver_id = match &self.driver {
            Some(driver) => driver.driver_id,
            None => {
                let driver = self.gateway.driver_profile(self.caller.user_id).await?;
                debug!(driver_id = %driver.driver_id, "Driver profile resolved");
                let id = driver.driver_id;
                self.driver = Some(driver);
                id
            }
        };

        let orders = self.gateway.list_orders_for_driver(driver_id).await?;
        self.board.replace_all(orders);
        Ok(self.board.orders())
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.board.orders()
    }

    fn driver_id(&self) -> Option<DriverId> {
        self.driver.as_ref().map(|d| d.driver_id)
    }

    fn is_mine(&self, order: &Order) -> bool {
        self.driver_id().is_some_and(|id| order.is_assigned_to(id))
    }

    /// Statuses the driver may move `order` to right now.
    #[must_use]
    pub fn controls(&self, order: OrderId) -> Vec<OrderStatus> {
        if self.board.is_pending(order) {
            return Vec::new();
        }
        self.board.get(order).map_or_else(Vec::new, |o| {
            allowed_transitions(Role::Driver, o.status, self.is_mine(&o))
        })
    }

    /// Move an assigned order to `target`.
    ///
    /// # Errors
    ///
    /// - [`crate::AppError::UnknownOrder`] if the order is not on the console
    /// - [`crate::AppError::RequestInFlight`] while another update is pending
    /// - [`crate::AppError::IllegalTransition`] for terminal orders, orders
    ///   not assigned to this driver, or statuses outside the driver's set
    /// - [`crate::AppError::NetworkFailure`] if the request fails
    #[instrument(skip(self), fields(order_id = %order, target = %target))]
    pub async fn set_status(&self, order: OrderId, target: OrderStatus) -> Result<Order> {
        self.board
            .transition(
                order,
                |current| {
                    check_transition(Role::Driver, current.status, target, self.is_mine(current))
                },
                || {
                    self.gateway
                        .update_order(order, OrderPatch::status(target), self.caller)
                },
            )
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use forkful_core::{Email, MenuItemId, NewOrder, OrderItem, RestaurantId, UserId};

    use super::*;
    use crate::AppError;
    use crate::gateway::InMemoryOrderGateway;

    fn driver_session() -> Session {
        Session::new(
            UserId::new(3),
            Email::parse("rider@forkful.test").unwrap(),
            vec!["ROLE_DRIVER".to_string()],
        )
    }

    async fn assigned_order(gateway: &InMemoryOrderGateway) -> Order {
        let order = gateway
            .create_order(NewOrder {
                customer_id: UserId::new(9),
                restaurant_id: RestaurantId::new(1),
                items: vec![OrderItem {
                    menu_item_id: MenuItemId::new(1),
                    quantity: 1,
                }],
                delivery_address: None,
                payment_method: Some("COD".to_string()),
                transaction_id: None,
            })
            .await
            .unwrap();
        gateway
            .update_order(
                order.order_id,
                OrderPatch::assign(Some(DriverId::new(1))),
                Caller::new(UserId::new(2), Role::Admin),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_driver_walks_order_to_delivery() {
        let gateway = Arc::new(InMemoryOrderGateway::seeded());
        let order = assigned_order(&gateway).await;

        let mut console = DriverConsole::new(Arc::clone(&gateway), &driver_session()).unwrap();
        let orders = console.load().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(console.driver().unwrap().driver_id, DriverId::new(1));
        assert_eq!(
            console.controls(order.order_id),
            vec![
                OrderStatus::Preparing,
                OrderStatus::OutForDelivery,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ]
        );

        for step in [
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            let updated = console.set_status(order.order_id, step).await.unwrap();
            assert_eq!(updated.status, step);
        }

        assert!(console.controls(order.order_id).is_empty());
        assert!(gateway.driver(DriverId::new(1)).await.unwrap().available);

        let calls = gateway.calls();
        let err = console
            .set_status(order.order_id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_driver_cannot_confirm() {
        let gateway = Arc::new(InMemoryOrderGateway::seeded());
        let order = assigned_order(&gateway).await;
        let mut console = DriverConsole::new(Arc::clone(&gateway), &driver_session()).unwrap();
        console.load().await.unwrap();

        let err = console
            .set_status(order.order_id, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn test_unknown_driver_profile_fails_load() {
        let gateway = Arc::new(InMemoryOrderGateway::seeded());
        let stranger = Session::new(
            UserId::new(77),
            Email::parse("new@forkful.test").unwrap(),
            vec!["ROLE_DRIVER".to_string()],
        );
        let mut console = DriverConsole::new(Arc::clone(&gateway), &stranger).unwrap();
        assert!(matches!(
            console.load().await,
            Err(AppError::NetworkFailure(_))
        ));
        assert!(console.driver().is_none());
    }
}
