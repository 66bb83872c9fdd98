//! Customer order history.

use forkful_core::{Order, OrderId, OrderStatus, Role, allowed_transitions, check_transition};
use tracing::instrument;

use super::OrderBoard;
use crate::error::Result;
use crate::gateway::{Caller, OrderGateway};
use crate::session::Session;

/// The signed-in customer's own orders.
pub struct CustomerOrders<G> {
    gateway: G,
    caller: Caller,
    board: OrderBoard,
    loaded_at: Option<u64>,
}

impl<G: OrderGateway> CustomerOrders<G> {
    /// A history view for `session`. Any signed-in user may order.
    #[must_use]
    pub fn new(gateway: G, session: &Session) -> Self {
        Self {
            gateway,
            caller: Caller::new(session.user_id, Role::Customer),
            board: OrderBoard::new(),
            loaded_at: None,
        }
    }

    /// Fetch the customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::NetworkFailure`] if the listing fails; the
    /// previously loaded orders are kept.
    #[instrument(skip(self), fields(user_id = %self.caller.user_id))]
    pub async fn load(&mut self) -> Result<Vec<Order>> {
        let orders = self
            .gateway
            .list_orders_for_customer(self.caller.user_id)
            .await?;
        self.board.replace_all(orders);
        Ok(self.board.orders())
    }

    /// Reload if checkout has bumped the session's refresh token since the
    /// last load. Returns whether a reload happened.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub async fn refresh_if_stale(&mut self, refresh_token: u64) -> Result<bool> {
        if self.loaded_at == Some(refresh_token) {
            return Ok(false);
        }
        self.load().await?;
        self.loaded_at = Some(refresh_token);
        Ok(true)
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.board.orders()
    }

    /// Statuses the customer may move `order` to right now.
    #[must_use]
    pub fn controls(&self, order: OrderId) -> Vec<OrderStatus> {
        if self.board.is_pending(order) {
            return Vec::new();
        }
        self.board.get(order).map_or_else(Vec::new, |o| {
            allowed_transitions(Role::Customer, o.status, o.customer_id == self.caller.user_id)
        })
    }

    /// Cancel one of the customer's orders.
    ///
    /// # Errors
    ///
    /// - [`crate::AppError::UnknownOrder`] if the order is not in the history
    /// - [`crate::AppError::RequestInFlight`] while a cancel is pending
    /// - [`crate::AppError::IllegalTransition`] once the order is past
    ///   `CONFIRMED` or not the customer's own
    /// - [`crate::AppError::NetworkFailure`] if the request fails
    #[instrument(skip(self), fields(order_id = %order))]
    pub async fn cancel(&self, order: OrderId) -> Result<Order> {
        let caller = self.caller;
        self.board
            .transition(
                order,
                |current| {
                    check_transition(
                        Role::Customer,
                        current.status,
                        OrderStatus::Cancelled,
                        current.customer_id == caller.user_id,
                    )
                },
                || self.gateway.cancel_order(order, caller.user_id),
            )
            .await
    }
}
