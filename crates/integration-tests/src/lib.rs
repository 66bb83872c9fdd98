//! Integration tests for Forkful.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p forkful-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Cart, restaurant selection and two-phase checkout
//! - `permission_table` - Every (role, from, to) triple, locally and against
//!   the service
//! - `role_views` - Admin assignment, driver console, reconciliation
//!
//! All tests run against [`InMemoryOrderGateway`]; no external service is
//! needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use forkful_client::checkout::CheckoutOrchestrator;
use forkful_client::config::PaymentConfig;
use forkful_client::gateway::InMemoryOrderGateway;
use forkful_client::payment::SimulatedPayments;
use forkful_client::session::{Session, SessionContext};
use forkful_core::{
    Driver, DriverId, Email, MenuItem, MenuItemId, Restaurant, RestaurantId, Role, UserId,
};
use rust_decimal::Decimal;

pub const RESTAURANT: RestaurantId = RestaurantId::new(1);
pub const OTHER_RESTAURANT: RestaurantId = RestaurantId::new(2);
/// 9.50, the dish the end-to-end scenarios order.
pub const DAL: MenuItemId = MenuItemId::new(1);
pub const NAAN: MenuItemId = MenuItemId::new(2);
pub const SUSHI: MenuItemId = MenuItemId::new(10);

pub const CUSTOMER: UserId = UserId::new(100);
pub const OTHER_CUSTOMER: UserId = UserId::new(101);
pub const ADMIN: UserId = UserId::new(1);
pub const DRIVER_USER: UserId = UserId::new(70);
pub const DRIVER: DriverId = DriverId::new(7);
pub const OTHER_DRIVER_USER: UserId = UserId::new(80);
pub const OTHER_DRIVER: DriverId = DriverId::new(8);

fn restaurant(id: RestaurantId, name: &str) -> Restaurant {
    Restaurant {
        restaurant_id: id,
        name: name.to_string(),
        cuisine: None,
        rating: None,
        address: None,
    }
}

fn dish(id: MenuItemId, restaurant: RestaurantId, name: &str, cents: i64) -> MenuItem {
    MenuItem {
        menu_item_id: id,
        restaurant_id: restaurant,
        name: name.to_string(),
        price: Some(Decimal::new(cents, 2)),
    }
}

/// Ordering service with two restaurants, one admin and two drivers.
#[must_use]
pub fn fixture() -> InMemoryOrderGateway {
    InMemoryOrderGateway::new()
        .with_restaurant(
            restaurant(RESTAURANT, "Tiffin Corner"),
            vec![
                dish(DAL, RESTAURANT, "Dal Tadka", 950),
                dish(NAAN, RESTAURANT, "Butter Naan", 250),
            ],
        )
        .with_restaurant(
            restaurant(OTHER_RESTAURANT, "Sushi Bar"),
            vec![dish(SUSHI, OTHER_RESTAURANT, "Salmon Nigiri", 600)],
        )
        .with_admin(ADMIN)
        .with_driver(Driver {
            driver_id: DRIVER,
            user_id: Some(DRIVER_USER),
            name: Some("Ravi".to_string()),
            available: true,
        })
        .with_driver(Driver {
            driver_id: OTHER_DRIVER,
            user_id: Some(OTHER_DRIVER_USER),
            name: Some("Meera".to_string()),
            available: true,
        })
}

/// [`fixture`] behind an `Arc`, ready to share between views.
#[must_use]
pub fn service() -> Arc<InMemoryOrderGateway> {
    Arc::new(fixture())
}

/// A session holding `role` for `user`.
///
/// # Panics
///
/// Never: the generated email is always well formed.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn session(user: UserId, role: Role) -> Session {
    Session::new(
        user,
        Email::parse(&format!("user{user}@forkful.test")).unwrap(),
        [role.authority().to_string()],
    )
}

/// A signed-in customer context with `RESTAURANT` selected.
#[must_use]
pub fn customer_context() -> SessionContext {
    let mut ctx = SessionContext::new();
    ctx.sign_in(session(CUSTOMER, Role::Customer));
    ctx.select_restaurant(Some(RESTAURANT));
    ctx
}

/// Checkout wired to `service` with instant simulated payments.
#[must_use]
pub fn checkout(
    service: &Arc<InMemoryOrderGateway>,
) -> CheckoutOrchestrator<Arc<InMemoryOrderGateway>, SimulatedPayments> {
    CheckoutOrchestrator::new(
        Arc::clone(service),
        SimulatedPayments::new(PaymentConfig::default()),
    )
}
