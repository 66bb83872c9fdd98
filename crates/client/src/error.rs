//! Unified error handling with Sentry integration.
//!
//! Checkout and every view operation return [`AppError`]. Nothing here is
//! fatal and nothing is retried: the caller shows [`AppError::user_message`]
//! and, for failures worth investigating, calls [`AppError::report`] first.

use forkful_core::{MenuItemId, OrderId, Role, TransitionError};
use thiserror::Error;

use crate::cart::CartError;
use crate::gateway::GatewayError;
use crate::payment::{PaymentError, PaymentReceipt};

/// Application-level error type for the ordering client.
#[derive(Debug, Error)]
pub enum AppError {
    /// No signed-in session.
    #[error("Not signed in")]
    Unauthenticated,

    /// The signed-in user does not hold the role a console requires.
    #[error("Signed-in user is not a {0}")]
    MissingRole(Role),

    /// Checkout attempted before choosing a restaurant.
    #[error("No restaurant selected")]
    NoRestaurantSelected,

    /// Checkout attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line has no price and cannot be ordered.
    #[error("Menu item {item_id} has no price")]
    UnpricedItem { item_id: MenuItemId },

    /// Item from a restaurant other than the selected one.
    #[error("Cart error: {0}")]
    ForeignItem(#[from] CartError),

    /// The requested transition is not in the caller's allowed set.
    #[error("Illegal transition: {0}")]
    IllegalTransition(#[from] TransitionError),

    /// The payment step failed or was cancelled; no order was created.
    #[error("Payment not confirmed: {0}")]
    PaymentNotConfirmed(#[from] PaymentError),

    /// Payment went through but the order could not be created.
    #[error("Payment {} confirmed but order creation failed: {source}", .receipt.transaction_id)]
    OrderCreateFailedAfterPayment {
        receipt: PaymentReceipt,
        #[source]
        source: GatewayError,
    },

    /// The session signed out or changed hands between payment and order
    /// creation; no order was created.
    #[error("Session ended after payment {} was confirmed", .receipt.transaction_id)]
    SessionEnded { receipt: PaymentReceipt },

    /// The ordering service could not complete the request.
    #[error("Network failure: {0}")]
    NetworkFailure(GatewayError),

    /// A transition for this order is still awaiting its answer.
    #[error("Order {0} already has a request in flight")]
    RequestInFlight(OrderId),

    /// The order is not part of the loaded view.
    #[error("Order {0} is not in this view")]
    UnknownOrder(OrderId),
}

impl From<GatewayError> for AppError {
    /// Service-side rejections of a transition surface the same way as
    /// local ones.
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(rejection) => Self::IllegalTransition(rejection),
            other => Self::NetworkFailure(other),
        }
    }
}

impl AppError {
    /// Failures that need a human to look at them.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::OrderCreateFailedAfterPayment { .. } => true,
            Self::SessionEnded { receipt } => !receipt.method.is_deferred(),
            Self::NetworkFailure(err) => err.is_infrastructure(),
            _ => false,
        }
    }

    /// Capture reportable errors to Sentry. Returns whether an event was sent.
    pub fn report(&self) -> bool {
        if !self.is_reportable() {
            return false;
        }
        let event_id = sentry::capture_error(self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "Order coordination error"
        );
        true
    }

    /// Message safe to show the user. Transport detail is never exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please sign in to continue".to_string(),
            Self::MissingRole(role) => format!("This page is only available to {role}s"),
            Self::NoRestaurantSelected => "Choose a restaurant first".to_string(),
            Self::EmptyCart => "Your cart is empty".to_string(),
            Self::UnpricedItem { .. } => {
                "An item in your cart is currently unavailable. Remove it to continue".to_string()
            }
            Self::ForeignItem(_) => {
                "That item is from a different restaurant than your cart".to_string()
            }
            Self::IllegalTransition(_) => "That status change is not allowed".to_string(),
            Self::PaymentNotConfirmed(PaymentError::Cancelled) => {
                "Payment cancelled. Your cart has been kept".to_string()
            }
            Self::PaymentNotConfirmed(err) => err.to_string(),
            Self::OrderCreateFailedAfterPayment { receipt, .. }
                if receipt.method.is_deferred() =>
            {
                "We could not place the order. Nothing was charged, please try again".to_string()
            }
            Self::OrderCreateFailedAfterPayment { receipt, .. } => format!(
                "Your payment went through but we could not place the order. \
                 Contact support with transaction {}",
                receipt.transaction_id
            ),
            Self::SessionEnded { receipt } if receipt.method.is_deferred() => {
                "You were signed out before the order was placed. Nothing was charged".to_string()
            }
            Self::SessionEnded { receipt } => format!(
                "You were signed out after paying, so no order was placed. \
                 Contact support with transaction {}",
                receipt.transaction_id
            ),
            Self::NetworkFailure(GatewayError::NotFound(_)) => "Not found".to_string(),
            Self::NetworkFailure(GatewayError::Forbidden(_)) => {
                "You do not have access to this".to_string()
            }
            Self::NetworkFailure(_) => {
                "Could not reach the ordering service. Please try again".to_string()
            }
            Self::RequestInFlight(_) => "Please wait for the current update to finish".to_string(),
            Self::UnknownOrder(_) => "Order not found. Refresh and try again".to_string(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Called at sign-in so errors are associated with the user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context at sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record an order action as a Sentry breadcrumb.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };
    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }
    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::OrderStatus;
    use rust_decimal::Decimal;

    use super::*;
    use crate::payment::PaymentMethod;

    fn receipt() -> PaymentReceipt {
        PaymentReceipt {
            method: PaymentMethod::PayId,
            transaction_id: "TXN1700000000000ABCDEFGHI".to_string(),
            amount: Decimal::new(1900, 2),
        }
    }

    #[test]
    fn test_rejections_from_service_are_illegal_transitions() {
        let err: AppError = GatewayError::Rejected(TransitionError::Terminal(
            OrderStatus::Delivered,
        ))
        .into();
        assert!(matches!(err, AppError::IllegalTransition(_)));

        let err: AppError = GatewayError::Unavailable("down".to_string()).into();
        assert!(matches!(err, AppError::NetworkFailure(_)));
    }

    #[test]
    fn test_user_message_hides_transport_detail() {
        let err = AppError::NetworkFailure(GatewayError::Status {
            status: 500,
            message: "NullPointerException at OrderService.java:88".to_string(),
        });
        assert!(!err.user_message().contains("OrderService"));
    }

    #[test]
    fn test_partial_failure_message_carries_transaction() {
        let err = AppError::OrderCreateFailedAfterPayment {
            receipt: receipt(),
            source: GatewayError::Unavailable("down".to_string()),
        };
        assert!(err.user_message().contains("TXN1700000000000ABCDEFGHI"));
        assert!(err.is_reportable());
    }

    #[test]
    fn test_only_infrastructure_failures_are_reportable() {
        assert!(!AppError::EmptyCart.is_reportable());
        assert!(
            !AppError::IllegalTransition(TransitionError::AssignmentNotPermitted(Role::Driver))
                .is_reportable()
        );
        assert!(!AppError::NetworkFailure(GatewayError::Forbidden("x".to_string())).is_reportable());
        assert!(AppError::NetworkFailure(GatewayError::Unavailable("x".to_string())).is_reportable());
    }

    #[test]
    fn test_cash_on_delivery_failure_says_nothing_was_charged() {
        let receipt = PaymentReceipt {
            method: PaymentMethod::CashOnDelivery,
            transaction_id: "COD1700000000000".to_string(),
            amount: Decimal::new(1900, 2),
        };
        let err = AppError::OrderCreateFailedAfterPayment {
            receipt,
            source: GatewayError::Unavailable("down".to_string()),
        };
        let message = err.user_message();
        assert!(message.contains("Nothing was charged"));
        assert!(!message.contains("payment went through"));
        assert!(!message.contains("COD1700000000000"));
    }

    #[test]
    fn test_session_ended_after_payment() {
        let err = AppError::SessionEnded { receipt: receipt() };
        assert!(err.user_message().contains("TXN1700000000000ABCDEFGHI"));
        assert!(err.is_reportable());

        let cash = AppError::SessionEnded {
            receipt: PaymentReceipt {
                method: PaymentMethod::CashOnDelivery,
                transaction_id: "COD1".to_string(),
                amount: Decimal::ONE,
            },
        };
        assert!(cash.user_message().contains("Nothing was charged"));
        assert!(!cash.is_reportable());
    }
}
