//! Role-scoped views.
//!
//! Each view owns an [`OrderBoard`]: the local projection of the orders it
//! can see. The contract is the same for all three:
//!
//! 1. load the role's subset of orders from the gateway
//! 2. compute the legal controls per order with
//!    [`forkful_core::allowed_transitions`]
//! 3. validate a requested transition locally, then send it
//! 4. overwrite the local record with whatever the gateway returned
//!
//! Only one transition per order may be in flight; while it is, the order's
//! controls are empty.

mod admin;
mod customer;
mod driver;

pub use admin::{AdminConsole, DriverRoster, Feed, LoadFailure};
pub use customer::CustomerOrders;
pub use driver::DriverConsole;

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use forkful_core::{Order, OrderId, TransitionError};
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::gateway::GatewayError;

#[derive(Debug, Default)]
struct BoardState {
    orders: Vec<Order>,
    in_flight: HashSet<OrderId>,
}

/// Orders visible to one view, newest first, plus the in-flight set.
#[derive(Debug, Default)]
pub struct OrderBoard {
    state: Mutex<BoardState>,
}

/// Marks an order as having a request in flight until dropped.
#[derive(Debug)]
pub struct InFlight<'a> {
    board: &'a OrderBoard,
    order: OrderId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.board.lock().in_flight.remove(&self.order);
    }
}

impl OrderBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace every order with a fresh listing.
    pub fn replace_all(&self, mut orders: Vec<Order>) {
        sort_newest_first(&mut orders);
        self.lock().orders = orders;
    }

    /// Overwrite the local copy of `order` with the service's record.
    pub fn reconcile(&self, order: Order) {
        let mut state = self.lock();
        if let Some(slot) = state.orders.iter_mut().find(|o| o.order_id == order.order_id) {
            *slot = order;
        } else {
            state.orders.push(order);
            sort_newest_first(&mut state.orders);
        }
    }

    /// Snapshot of the board.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    #[must_use]
    pub fn get(&self, order: OrderId) -> Option<Order> {
        self.lock()
            .orders
            .iter()
            .find(|o| o.order_id == order)
            .cloned()
    }

    /// Whether a request for `order` is awaiting its answer.
    #[must_use]
    pub fn is_pending(&self, order: OrderId) -> bool {
        self.lock().in_flight.contains(&order)
    }

    /// Claim the in-flight slot for `order`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RequestInFlight`] if the slot is taken.
    pub fn begin(&self, order: OrderId) -> Result<InFlight<'_>> {
        if self.lock().in_flight.insert(order) {
            Ok(InFlight { board: self, order })
        } else {
            Err(AppError::RequestInFlight(order))
        }
    }

    /// Run one transition for `order`: claim the slot, validate locally,
    /// send, reconcile.
    pub(crate) async fn transition<F, Fut>(
        &self,
        order: OrderId,
        validate: impl FnOnce(&Order) -> std::result::Result<(), TransitionError>,
        send: F,
    ) -> Result<Order>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Order, GatewayError>>,
    {
        let current = self.get(order).ok_or(AppError::UnknownOrder(order))?;
        let _in_flight = self.begin(order)?;

        if let Err(rejection) = validate(&current) {
            warn!(order_id = %order, %rejection, "Transition rejected locally");
            return Err(rejection.into());
        }

        let updated = send().await.map_err(|e| {
            if matches!(e, GatewayError::Rejected(_)) {
                warn!(order_id = %order, error = %e, "Transition rejected by service");
            } else {
                error!(order_id = %order, error = %e, "Transition request failed");
            }
            AppError::from(e)
        })?;

        info!(
            order_id = %order,
            status = %updated.status,
            driver_id = ?updated.driver_id,
            "Order updated"
        );
        self.reconcile(updated.clone());
        Ok(updated)
    }
}

fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.order_id.cmp(&a.order_id))
    });
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, TimeZone, Utc};
    use forkful_core::{OrderStatus, PaymentStatus, RestaurantId, UserId};
    use rust_decimal::Decimal;

    use super::*;

    /// A bare order for board tests.
    pub fn order(id: i64, status: OrderStatus, minutes: i64) -> Order {
        Order {
            order_id: OrderId::new(id),
            customer_id: UserId::new(1),
            restaurant_id: RestaurantId::new(1),
            driver_id: None,
            items: Vec::new(),
            delivery_address: None,
            payment_method: None,
            transaction_id: None,
            payment_status: PaymentStatus::Pending,
            status,
            total_amount: Decimal::ZERO,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default()
                + Duration::minutes(minutes),
        }
    }
}
