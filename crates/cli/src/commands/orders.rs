//! Order listing and mutation against the HTTP ordering service.
//!
//! # Environment Variables
//!
//! - `FORKFUL_API_BASE_URL` - Base URL of the ordering service
//! - `FORKFUL_API_TOKEN` - Optional bearer token

use forkful_client::config::ClientConfig;
use forkful_client::gateway::HttpOrderGateway;
use forkful_client::session::Session;
use forkful_client::views::{AdminConsole, CustomerOrders, DriverConsole};
use forkful_client::AppError;
use forkful_core::{DriverId, Order, OrderId, OrderStatus, Role, check_transition, format_amount};
use tracing::{info, warn};

use super::CommandError;

fn gateway() -> Result<HttpOrderGateway, CommandError> {
    let config = ClientConfig::from_env()?;
    Ok(HttpOrderGateway::new(&config.api)?)
}

fn describe(order: &Order, controls: &[OrderStatus]) {
    let controls: Vec<&str> = controls.iter().copied().map(OrderStatus::as_str).collect();
    info!(
        order_id = %order.order_id,
        status = order.status.label(),
        items = order.item_count(),
        total = %format_amount(order.total_amount),
        driver_id = ?order.driver_id,
        created_at = %order.created_at,
        controls = ?controls,
        "Order"
    );
}

/// List the orders visible to `role`, with the legal transitions per order.
///
/// # Errors
///
/// Returns an error if configuration is missing or the service call fails.
pub async fn list(session: &Session, role: Role) -> Result<(), CommandError> {
    let gateway = gateway()?;

    match role {
        Role::Customer => {
            let mut view = CustomerOrders::new(gateway, session);
            for order in view.load().await? {
                describe(&order, &view.controls(order.order_id));
            }
        }
        Role::Admin => {
            let mut console = AdminConsole::new(gateway, session)?;
            for failure in console.load().await {
                warn!(feed = %failure.feed, "{}", failure.error.user_message());
            }
            for order in console.orders() {
                describe(&order, &console.controls(order.order_id));
            }
            for entry in console.roster() {
                info!(
                    driver_id = %entry.driver.driver_id,
                    name = entry.driver.name.as_deref().unwrap_or("-"),
                    available = entry.driver.available,
                    assigned = entry.assigned,
                    active = entry.active,
                    "Driver"
                );
            }
        }
        Role::Driver => {
            let mut console = DriverConsole::new(gateway, session)?;
            for order in console.load().await? {
                describe(&order, &console.controls(order.order_id));
            }
        }
    }
    Ok(())
}

/// Request a status change through the view for `role`.
///
/// # Errors
///
/// Returns an error if the order is not visible, the transition is illegal,
/// or the service call fails.
pub async fn transition(
    session: &Session,
    role: Role,
    order: OrderId,
    target: OrderStatus,
) -> Result<(), CommandError> {
    let gateway = gateway()?;

    let updated = match role {
        Role::Customer => {
            let mut view = CustomerOrders::new(gateway, session);
            view.load().await?;
            let current = view
                .orders()
                .into_iter()
                .find(|o| o.order_id == order)
                .ok_or(AppError::UnknownOrder(order))?;
            // Customers only ever cancel; anything else is refused here.
            check_transition(Role::Customer, current.status, target, true)
                .map_err(AppError::from)?;
            view.cancel(order).await?
        }
        Role::Admin => {
            let mut console = AdminConsole::new(gateway, session)?;
            for failure in console.load().await {
                warn!(feed = %failure.feed, "{}", failure.error.user_message());
            }
            console.set_status(order, target).await?
        }
        Role::Driver => {
            let mut console = DriverConsole::new(gateway, session)?;
            console.load().await?;
            console.set_status(order, target).await?
        }
    };

    describe(&updated, &[]);
    Ok(())
}

/// Assign `driver` to `order`, or clear the assignment.
///
/// # Errors
///
/// Returns an error if the session is not an admin, the order is terminal,
/// or the service call fails.
pub async fn assign(
    session: &Session,
    order: OrderId,
    driver: Option<DriverId>,
) -> Result<(), CommandError> {
    let mut console = AdminConsole::new(gateway()?, session)?;
    for failure in console.load().await {
        warn!(feed = %failure.feed, "{}", failure.error.user_message());
    }
    let updated = console.assign_driver(order, driver).await?;
    describe(&updated, &[]);
    Ok(())
}
