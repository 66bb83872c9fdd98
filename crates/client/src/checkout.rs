//! Checkout orchestrator.
//!
//! Turns the session's cart into an order in three steps:
//!
//! 1. **Prepare**: preconditions are checked in order, each failing without
//!    touching the network, and the cart is snapshotted into a
//!    [`PendingCheckout`].
//! 2. **Pay**: the [`PaymentConfirmer`] produces a receipt. Failure or
//!    cancellation leaves the cart untouched and nothing is sent to the
//!    ordering service. Sign-out cancels this step.
//! 3. **Commit**: the create request carries the snapshot and the receipt's
//!    method and transaction id. If this fails the receipt is handed back
//!    inside [`AppError::OrderCreateFailedAfterPayment`] for manual
//!    follow-up. On success the cart is emptied, but only if it still holds
//!    what was ordered.
//!
//! [`CheckoutOrchestrator::checkout_shared`] runs the steps against a
//! context behind a `tokio::sync::Mutex`, holding the lock only around
//! prepare and commit so sign-out can run while payment is outstanding.
//! Commit refuses to place the order once the session has changed.

use forkful_core::{NewOrder, Order, RestaurantId, UserId};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cart::Cart;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::gateway::OrderGateway;
use crate::payment::{
    PaymentConfirmer, PaymentError, PaymentIntent, PaymentMethod, PaymentReceipt,
};
use crate::session::SessionContext;

/// Validated snapshot of what is about to be ordered.
#[derive(Debug, Clone)]
pub struct PendingCheckout {
    generation: u64,
    customer: UserId,
    restaurant: RestaurantId,
    cart: Cart,
    delivery_address: Option<String>,
    signed_out: CancellationToken,
}

impl PendingCheckout {
    /// Check the preconditions in order and snapshot the cart.
    ///
    /// # Errors
    ///
    /// [`AppError::Unauthenticated`], [`AppError::NoRestaurantSelected`],
    /// [`AppError::EmptyCart`] or [`AppError::UnpricedItem`], first failing
    /// check wins.
    pub fn prepare(ctx: &SessionContext, delivery_address: Option<&str>) -> Result<Self> {
        let session = ctx.require_session()?;
        let restaurant = ctx
            .selected_restaurant()
            .ok_or(AppError::NoRestaurantSelected)?;
        let cart = ctx
            .cart()
            .filter(|cart| !cart.is_empty())
            .ok_or(AppError::EmptyCart)?;
        if let Some(item_id) = cart.first_unpriced() {
            return Err(AppError::UnpricedItem { item_id });
        }

        Ok(Self {
            generation: ctx.generation(),
            customer: session.user_id,
            restaurant,
            cart: cart.clone(),
            delivery_address: normalize_address(delivery_address),
            signed_out: ctx.payment_cancellation(),
        })
    }

    /// Amount the payment step must confirm.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.cart.total()
    }

    /// Whether `ctx` is still the sign-in this checkout was prepared under.
    #[must_use]
    pub const fn is_current(&self, ctx: &SessionContext) -> bool {
        ctx.generation() == self.generation
    }

    fn request(&self, method: PaymentMethod, transaction_id: Option<String>) -> NewOrder {
        NewOrder {
            customer_id: self.customer,
            restaurant_id: self.restaurant,
            items: self.cart.order_items(),
            delivery_address: self.delivery_address.clone(),
            payment_method: Some(method.label().to_string()),
            transaction_id,
        }
    }

    /// Success path shared by every entry point.
    fn finish(&self, ctx: &mut SessionContext, order: Order) -> Order {
        if self.is_current(ctx) && ctx.cart() == Some(&self.cart) {
            ctx.clear_cart();
        } else {
            debug!(order_id = %order.order_id, "Cart changed during checkout, keeping it");
        }
        ctx.bump_refresh();
        info!(
            order_id = %order.order_id,
            total = %order.total_amount,
            items = order.item_count(),
            "Order placed"
        );
        add_breadcrumb(
            "checkout",
            "Order placed",
            &[("order_id", order.order_id.to_string())],
        );
        order
    }
}

/// Runs checkout against an ordering service and a payment step.
pub struct CheckoutOrchestrator<G, P> {
    gateway: G,
    payments: P,
}

impl<G: OrderGateway, P: PaymentConfirmer> CheckoutOrchestrator<G, P> {
    pub const fn new(gateway: G, payments: P) -> Self {
        Self { gateway, payments }
    }

    /// Pay, then place the order, with exclusive use of the context.
    ///
    /// `cancel` aborts the payment step. On success the cart is emptied and
    /// the history refresh token bumped.
    ///
    /// # Errors
    ///
    /// - the preconditions of [`PendingCheckout::prepare`]
    /// - [`AppError::PaymentNotConfirmed`] if payment fails or is cancelled
    /// - [`AppError::OrderCreateFailedAfterPayment`] if the order could not be
    ///   created after a successful payment
    #[instrument(skip_all, fields(method = %intent.method()))]
    pub async fn checkout(
        &self,
        ctx: &mut SessionContext,
        delivery_address: Option<&str>,
        intent: &PaymentIntent,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let pending = PendingCheckout::prepare(ctx, delivery_address)?;
        let receipt = self.pay(&pending, intent, cancel).await?;
        let order = self.place(&pending, receipt).await?;
        Ok(pending.finish(ctx, order))
    }

    /// Pay, then place the order, against a context other tasks share.
    ///
    /// The lock is not held while payment is outstanding, so
    /// [`SessionContext::sign_out`] can run meanwhile and cancels it.
    ///
    /// # Errors
    ///
    /// Those of [`checkout`](Self::checkout), plus those of
    /// [`commit`](Self::commit).
    #[instrument(skip_all, fields(method = %intent.method()))]
    pub async fn checkout_shared(
        &self,
        ctx: &Mutex<SessionContext>,
        delivery_address: Option<&str>,
        intent: &PaymentIntent,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let pending = PendingCheckout::prepare(&*ctx.lock().await, delivery_address)?;
        let receipt = self.pay(&pending, intent, cancel).await?;
        self.commit(ctx, &pending, receipt).await
    }

    /// Run the payment step for a prepared checkout.
    ///
    /// Ends early when `cancel` fires or the session the checkout was
    /// prepared under signs out.
    ///
    /// # Errors
    ///
    /// [`AppError::PaymentNotConfirmed`].
    pub async fn pay(
        &self,
        pending: &PendingCheckout,
        intent: &PaymentIntent,
        cancel: &CancellationToken,
    ) -> Result<PaymentReceipt> {
        let receipt = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PaymentError::Cancelled),
            () = pending.signed_out.cancelled() => Err(PaymentError::Cancelled),
            result = self.payments.confirm(pending.total(), intent) => result,
        }?;
        Ok(receipt)
    }

    /// Place a paid checkout, provided the session has not changed since it
    /// was prepared.
    ///
    /// # Errors
    ///
    /// - [`AppError::SessionEnded`] if the context signed out or in since
    ///   prepare; nothing is sent
    /// - [`AppError::OrderCreateFailedAfterPayment`] if the create request
    ///   fails
    pub async fn commit(
        &self,
        ctx: &Mutex<SessionContext>,
        pending: &PendingCheckout,
        receipt: PaymentReceipt,
    ) -> Result<Order> {
        if !pending.is_current(&*ctx.lock().await) {
            warn!(
                transaction_id = %receipt.transaction_id,
                "Session changed after payment, order not placed"
            );
            return Err(AppError::SessionEnded { receipt });
        }
        let order = self.place(pending, receipt).await?;
        Ok(pending.finish(&mut *ctx.lock().await, order))
    }

    async fn place(&self, pending: &PendingCheckout, receipt: PaymentReceipt) -> Result<Order> {
        let request = pending.request(receipt.method, Some(receipt.transaction_id.clone()));
        self.gateway.create_order(request).await.map_err(|source| {
            error!(
                transaction_id = %receipt.transaction_id,
                error = %source,
                "Order creation failed after payment"
            );
            AppError::OrderCreateFailedAfterPayment { receipt, source }
        })
    }

    /// Place the order with a payment method label and no payment step.
    ///
    /// # Errors
    ///
    /// The preconditions of [`PendingCheckout::prepare`], then
    /// [`AppError::NetworkFailure`] if the create request fails.
    #[instrument(skip_all, fields(method = %method))]
    pub async fn submit(
        &self,
        ctx: &mut SessionContext,
        delivery_address: Option<&str>,
        method: PaymentMethod,
    ) -> Result<Order> {
        let pending = PendingCheckout::prepare(ctx, delivery_address)?;

        let order = self
            .gateway
            .create_order(pending.request(method, None))
            .await
            .map_err(|e| {
                error!(error = %e, "Order creation failed");
                AppError::from(e)
            })?;

        Ok(pending.finish(ctx, order))
    }
}

fn normalize_address(address: Option<&str>) -> Option<String> {
    address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(ToString::to_string)
}
