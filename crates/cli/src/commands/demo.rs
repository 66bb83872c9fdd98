//! End-to-end demo against the in-memory ordering service.
//!
//! Walks one order through its whole life: a customer browses and checks
//! out cash on delivery, an admin confirms it and assigns the seeded driver,
//! and the driver delivers it.

use std::sync::Arc;

use forkful_client::checkout::CheckoutOrchestrator;
use forkful_client::config::PaymentConfig;
use forkful_client::gateway::{InMemoryOrderGateway, OrderGateway};
use forkful_client::payment::{PaymentIntent, SimulatedPayments};
use forkful_client::session::SessionContext;
use forkful_client::views::{AdminConsole, CustomerOrders, DriverConsole};
use forkful_client::AppError;
use forkful_core::{DriverId, OrderStatus, Role, UserId, format_amount};
use tracing::{info, warn};

use super::{CommandError, session};

const CUSTOMER: i64 = 10;
const ADMIN: i64 = 2;
const DRIVER_USER: i64 = 3;
const DRIVER: i64 = 1;

/// Run the demo.
///
/// # Errors
///
/// Returns an error if any step is refused.
pub async fn run() -> Result<(), CommandError> {
    let gateway = Arc::new(InMemoryOrderGateway::seeded());
    let payments = SimulatedPayments::new(PaymentConfig::default());

    // Customer: browse and fill the cart
    let mut ctx = SessionContext::new();
    ctx.sign_in(session(
        UserId::new(CUSTOMER),
        "diner@forkful.test",
        Role::Customer,
    )?);

    let restaurants = gateway
        .list_restaurants()
        .await
        .map_err(AppError::from)?;
    let Some(restaurant) = restaurants.first() else {
        warn!("No restaurants to order from");
        return Ok(());
    };
    info!(restaurant = %restaurant.name, "Browsing restaurant");
    ctx.select_restaurant(Some(restaurant.restaurant_id));

    let menu = gateway
        .list_menu(restaurant.restaurant_id)
        .await
        .map_err(AppError::from)?;
    for item in &menu {
        ctx.add_to_cart(item)?;
    }
    if let (Some(first), Some(cart)) = (menu.first(), ctx.cart_mut()) {
        cart.set_quantity(first.menu_item_id, 2);
    }
    if let Some(cart) = ctx.cart() {
        info!(
            items = cart.item_count(),
            total = %format_amount(cart.total()),
            "Cart ready"
        );
        if let Ok(link) = payments.qr_payload(cart.total()) {
            info!(%link, "QR payment link");
        }
    }

    // Customer: checkout
    let checkout = CheckoutOrchestrator::new(Arc::clone(&gateway), payments);
    let cancel = ctx.payment_cancellation();
    let order = checkout
        .checkout(
            &mut ctx,
            Some("221B Baker Street"),
            &PaymentIntent::CashOnDelivery,
            &cancel,
        )
        .await?;
    info!(
        order_id = %order.order_id,
        status = %order.status,
        total = %format_amount(order.total_amount),
        "Order placed"
    );

    // Admin: confirm and assign
    let admin = session(UserId::new(ADMIN), "ops@forkful.test", Role::Admin)?;
    let mut console = AdminConsole::new(Arc::clone(&gateway), &admin)?;
    for failure in console.load().await {
        warn!(feed = %failure.feed, "{}", failure.error.user_message());
    }
    console
        .set_status(order.order_id, OrderStatus::Confirmed)
        .await?;
    console
        .assign_driver(order.order_id, Some(DriverId::new(DRIVER)))
        .await?;
    for entry in console.roster() {
        info!(
            driver_id = %entry.driver.driver_id,
            assigned = entry.assigned,
            active = entry.active,
            "Driver workload"
        );
    }

    // Driver: deliver
    let rider = session(UserId::new(DRIVER_USER), "rider@forkful.test", Role::Driver)?;
    let mut driver = DriverConsole::new(Arc::clone(&gateway), &rider)?;
    driver.load().await?;
    for step in [
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        driver.set_status(order.order_id, step).await?;
    }

    // Customer: history reflects the delivery
    let Some(customer) = ctx.session() else {
        return Ok(());
    };
    let mut history = CustomerOrders::new(Arc::clone(&gateway), customer);
    history.refresh_if_stale(ctx.refresh_token()).await?;
    for order in history.orders() {
        info!(
            order_id = %order.order_id,
            status = %order.status,
            controls = history.controls(order.order_id).len(),
            "History"
        );
    }

    ctx.sign_out();
    Ok(())
}
