//! Admin console.
//!
//! Sees every order, confirms or re-opens them, and assigns drivers. The
//! console's three feeds (orders, restaurants, drivers) are fetched
//! concurrently; a failing feed does not discard the others.

use std::fmt;

use forkful_core::{
    Driver, DriverId, Order, OrderId, OrderPatch, OrderStatus, Relation, Restaurant, Role,
    allowed_transitions, check_assignment, check_transition,
};
use tracing::{error, instrument};

use super::OrderBoard;
use crate::error::{AppError, Result};
use crate::gateway::{Caller, GatewayError, OrderGateway};
use crate::session::Session;

/// One of the console's data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Orders,
    Restaurants,
    Drivers,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orders => write!(f, "orders"),
            Self::Restaurants => write!(f, "restaurants"),
            Self::Drivers => write!(f, "drivers"),
        }
    }
}

/// A feed that could not be loaded.
#[derive(Debug)]
pub struct LoadFailure {
    pub feed: Feed,
    pub error: AppError,
}

/// A driver with their current workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRoster {
    pub driver: Driver,
    /// Orders assigned to the driver, in any status.
    pub assigned: usize,
    /// Assigned orders that are not yet delivered or cancelled.
    pub active: usize,
}

/// Every order, plus the restaurants and drivers an admin works with.
pub struct AdminConsole<G> {
    gateway: G,
    caller: Caller,
    board: OrderBoard,
    restaurants: Vec<Restaurant>,
    drivers: Vec<Driver>,
}

impl<G: OrderGateway> AdminConsole<G> {
    /// An admin console for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MissingRole`] unless the session is an admin.
    pub fn new(gateway: G, session: &Session) -> Result<Self> {
        Ok(Self {
            gateway,
            caller: session.caller(Role::Admin)?,
            board: OrderBoard::new(),
            restaurants: Vec::new(),
            drivers: Vec::new(),
        })
    }

    /// Fetch orders, restaurants and drivers concurrently.
    ///
    /// Feeds that load are applied; every feed that fails is returned. An
    /// empty result means everything loaded.
    #[must_use = "failed feeds are only reported through the returned list"]
    #[instrument(skip(self), fields(user_id = %self.caller.user_id))]
    pub async fn load(&mut self) -> Vec<LoadFailure> {
        let (orders, restaurants, drivers) = tokio::join!(
            self.gateway.list_orders_for_admin(self.caller),
            self.gateway.list_restaurants(),
            self.gateway.list_drivers(self.caller),
        );

        let mut failures = Vec::new();
        let mut fail = |feed: Feed, err: GatewayError| {
            let error = AppError::from(err);
            error!(%feed, error = %error, "Admin feed failed to load");
            failures.push(LoadFailure { feed, error });
        };

        match orders {
            Ok(orders) => self.board.replace_all(orders),
            Err(e) => fail(Feed::Orders, e),
        }
        match restaurants {
            Ok(restaurants) => self.restaurants = restaurants,
            Err(e) => fail(Feed::Restaurants, e),
        }
        match drivers {
            Ok(drivers) => self.drivers = drivers,
            Err(e) => fail(Feed::Drivers, e),
        }
        failures
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.board.orders()
    }

    #[must_use]
    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    #[must_use]
    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    /// Drivers with assigned and active order counts from the loaded orders.
    #[must_use]
    pub fn roster(&self) -> Vec<DriverRoster> {
        let orders = self.board.orders();
        self.drivers
            .iter()
            .map(|driver| {
                let mine = orders
                    .iter()
                    .filter(|o| o.is_assigned_to(driver.driver_id));
                let (assigned, active) = mine.fold((0, 0), |(assigned, active), o| {
                    (assigned + 1, active + usize::from(!o.status.is_terminal()))
                });
                DriverRoster {
                    driver: driver.clone(),
                    assigned,
                    active,
                }
            })
            .collect()
    }

    /// Statuses an admin may set on `order` right now.
    #[must_use]
    pub fn controls(&self, order: OrderId) -> Vec<OrderStatus> {
        if self.board.is_pending(order) {
            return Vec::new();
        }
        self.board.get(order).map_or_else(Vec::new, |o| {
            allowed_transitions(Role::Admin, o.status, Relation::Unrelated)
        })
    }

    /// Whether the assignment control is enabled for `order`.
    #[must_use]
    pub fn can_assign(&self, order: OrderId) -> bool {
        !self.board.is_pending(order)
            && self
                .board
                .get(order)
                .is_some_and(|o| check_assignment(Role::Admin, o.status).is_ok())
    }

    /// Move `order` to `target`.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownOrder`], [`AppError::RequestInFlight`],
    /// [`AppError::IllegalTransition`] or [`AppError::NetworkFailure`].
    #[instrument(skip(self), fields(order_id = %order, target = %target))]
    pub async fn set_status(&self, order: OrderId, target: OrderStatus) -> Result<Order> {
        self.board
            .transition(
                order,
                |current| check_transition(Role::Admin, current.status, target, Relation::Unrelated),
                || {
                    self.gateway
                        .update_order(order, OrderPatch::status(target), self.caller)
                },
            )
            .await
    }

    /// Assign `order` to `driver`, or clear the assignment with `None`.
    /// Leaves the status unchanged.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownOrder`], [`AppError::RequestInFlight`],
    /// [`AppError::IllegalTransition`] for delivered or cancelled orders, or
    /// [`AppError::NetworkFailure`].
    #[instrument(skip(self), fields(order_id = %order, driver_id = ?driver))]
    pub async fn assign_driver(&self, order: OrderId, driver: Option<DriverId>) -> Result<Order> {
        self.board
            .transition(
                order,
                |current| check_assignment(Role::Admin, current.status),
                || {
                    self.gateway
                        .update_order(order, OrderPatch::assign(driver), self.caller)
                },
            )
            .await
    }
}
