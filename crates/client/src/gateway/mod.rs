//! Order Gateway: the boundary contract to the ordering service.
//!
//! # Architecture
//!
//! - [`OrderGateway`] is the only way the client core talks to the backing
//!   service; everything above it is transport-agnostic
//! - The service is the source of truth: every mutation returns the
//!   authoritative record and views overwrite their local copy with it
//! - The service re-validates role and transition legality independently of
//!   the client
//! - No call is retried; a failure is surfaced to the caller as-is
//!
//! # Implementations
//!
//! - [`HttpOrderGateway`] - JSON over HTTP, with cached catalog listings
//! - [`InMemoryOrderGateway`] - In-process backing service for tests and demos

mod http;
mod memory;
mod wire;

pub use http::HttpOrderGateway;
pub use memory::InMemoryOrderGateway;

use async_trait::async_trait;
use forkful_core::{
    Driver, DriverId, MenuItem, NewOrder, Order, OrderId, OrderPatch, Restaurant, RestaurantId,
    Role, TransitionError, UserId,
};
use thiserror::Error;

/// Who is asking, and in which capacity.
///
/// A user may hold several roles; the caller pins the one the request is made
/// under so the service can route and authorize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Errors that can occur when talking to the ordering service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the privileges for this endpoint.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The service refused the mutation as an illegal transition.
    #[error("Rejected: {0}")]
    Rejected(#[from] TransitionError),

    /// The request was malformed or referenced unknown records.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The service could not be reached or is refusing work.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A successful answer lacked a field the client needs.
    #[error("Incomplete response: {0}")]
    Incomplete(String),
}

impl GatewayError {
    /// Errors caused by infrastructure rather than by the request itself.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) | Self::Unavailable(_) | Self::Incomplete(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::Forbidden(_) | Self::Rejected(_) | Self::BadRequest(_) => {
                false
            }
        }
    }
}

/// Call contract of the ordering service.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Create an order. The service computes `total_amount` and starts it
    /// at `PENDING`.
    async fn create_order(&self, order: NewOrder) -> Result<Order, GatewayError>;

    /// Orders placed by `customer`.
    async fn list_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, GatewayError>;

    /// Every order. Requires an admin caller.
    async fn list_orders_for_admin(&self, caller: Caller) -> Result<Vec<Order>, GatewayError>;

    /// Every driver. Requires an admin caller.
    async fn list_drivers(&self, caller: Caller) -> Result<Vec<Driver>, GatewayError>;

    /// Orders assigned to `driver`.
    async fn list_orders_for_driver(&self, driver: DriverId) -> Result<Vec<Order>, GatewayError>;

    /// The driver record a signed-in user acts as.
    async fn driver_profile(&self, user: UserId) -> Result<Driver, GatewayError>;

    /// Apply a status and/or assignment change and return the resulting
    /// record.
    async fn update_order(
        &self,
        order: OrderId,
        patch: OrderPatch,
        caller: Caller,
    ) -> Result<Order, GatewayError>;

    /// Customer cancellation of their own order.
    async fn cancel_order(&self, order: OrderId, caller: UserId) -> Result<Order, GatewayError>;

    /// Restaurants open for ordering.
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, GatewayError>;

    /// A restaurant's menu.
    async fn list_menu(&self, restaurant: RestaurantId) -> Result<Vec<MenuItem>, GatewayError>;
}

#[async_trait]
impl<G: OrderGateway + ?Sized> OrderGateway for std::sync::Arc<G> {
    async fn create_order(&self, order: NewOrder) -> Result<Order, GatewayError> {
        (**self).create_order(order).await
    }

    async fn list_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, GatewayError> {
        (**self).list_orders_for_customer(customer).await
    }

    async fn list_orders_for_admin(&self, caller: Caller) -> Result<Vec<Order>, GatewayError> {
        (**self).list_orders_for_admin(caller).await
    }

    async fn list_drivers(&self, caller: Caller) -> Result<Vec<Driver>, GatewayError> {
        (**self).list_drivers(caller).await
    }

    async fn list_orders_for_driver(&self, driver: DriverId) -> Result<Vec<Order>, GatewayError> {
        (**self).list_orders_for_driver(driver).await
    }

    async fn driver_profile(&self, user: UserId) -> Result<Driver, GatewayError> {
        (**self).driver_profile(user).await
    }

    async fn update_order(
        &self,
        order: OrderId,
        patch: OrderPatch,
        caller: Caller,
    ) -> Result<Order, GatewayError> {
        (**self).update_order(order, patch, caller).await
    }

    async fn cancel_order(&self, order: OrderId, caller: UserId) -> Result<Order, GatewayError> {
        (**self).cancel_order(order, caller).await
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, GatewayError> {
        (**self).list_restaurants().await
    }

    async fn list_menu(&self, restaurant: RestaurantId) -> Result<Vec<MenuItem>, GatewayError> {
        (**self).list_menu(restaurant).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(GatewayError::Unavailable("down".to_string()).is_infrastructure());
        assert!(
            GatewayError::Status {
                status: 502,
                message: "bad gateway".to_string()
            }
            .is_infrastructure()
        );
        assert!(GatewayError::Incomplete("order 4: restaurant".to_string()).is_infrastructure());
        assert!(!GatewayError::NotFound("order 9".to_string()).is_infrastructure());
        assert!(!GatewayError::Forbidden("admin only".to_string()).is_infrastructure());
    }

    #[tokio::test]
    async fn test_gateway_behind_trait_object() {
        let gateway: std::sync::Arc<dyn OrderGateway> =
            std::sync::Arc::new(InMemoryOrderGateway::seeded());
        let restaurants = gateway.list_restaurants().await.unwrap();
        assert_eq!(restaurants.len(), 1);
        let menu = gateway
            .list_menu(restaurants[0].restaurant_id)
            .await
            .unwrap();
        assert_eq!(menu.len(), 2);
    }
}
