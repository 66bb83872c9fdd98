//! JSON-over-HTTP implementation of the Order Gateway.
//!
//! # Endpoints
//!
//! | Operation                  | Request                                          | Answer |
//! |----------------------------|--------------------------------------------------|--------|
//! | create order               | `POST /api/orders`                               | `{orderId, paymentStatus, ..}` |
//! | customer history           | `GET /api/orders/user/{userId}`                  | order list |
//! | customer cancel            | `PATCH /api/orders/{orderId}/cancel?userId=`     | `{orderId, status}` |
//! | admin orders               | `GET /api/admin/orders?userId=`                  | order list |
//! | admin drivers              | `GET /api/admin/drivers?userId=`                 | driver list with order counts |
//! | admin status / assignment  | `PATCH /api/admin/orders/{orderId}?userId=`      | order |
//! | driver profile             | `GET /api/driver/profile?userId=`                | driver |
//! | driver orders              | `GET /api/driver/orders?userId=`                 | `{driver, orders}` |
//! | driver status              | `PATCH /api/driver/orders/{orderId}/status?userId=` | `{order, driver}` |
//! | catalog                    | `GET /api/restaurants`, `/api/restaurants/{id}/menu` | entity lists |
//!
//! Payload shapes live in `wire`. Create and cancel only acknowledge, so the
//! authoritative record is read back from the customer's history.
//!
//! Driver endpoints are keyed by the driver's user account, not the driver
//! id; the mapping is learned from profile and roster answers.
//!
//! Error bodies are `{"error": "..."}`. Restaurant and menu listings are
//! cached with `moka`; orders are never cached since the service is the
//! source of truth for their status.

use std::sync::Arc;

use async_trait::async_trait;
use forkful_core::{
    Driver, DriverId, MenuItem, NewOrder, Order, OrderId, OrderPatch, OrderStatus, Restaurant,
    RestaurantId, Role, UserId,
};
use moka::future::Cache;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};
use url::Url;

use super::wire::{
    self, CreateOrderBody, DriverOrders, DriverStatusChanged, DriverView, MenuItemView,
    OrderCancelled, OrderCreated, OrderView, RestaurantView,
};
use super::{Caller, GatewayError, OrderGateway};
use crate::config::ApiConfig;

/// Maximum characters of an error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 200;

/// Cache key for catalog listings.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CatalogKey {
    Restaurants,
    Menu(RestaurantId),
}

/// Cached catalog values.
#[derive(Debug, Clone)]
enum CatalogValue {
    Restaurants(Arc<Vec<Restaurant>>),
    Menu(Arc<Vec<MenuItem>>),
}

/// HTTP client for the ordering service.
#[derive(Clone)]
pub struct HttpOrderGateway {
    inner: Arc<HttpOrderGatewayInner>,
}

struct HttpOrderGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
    catalog: Cache<CatalogKey, CatalogValue>,
    /// Sign-in account of each driver seen so far.
    driver_accounts: Cache<DriverId, UserId>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: OrderStatus,
}

impl HttpOrderGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let catalog = Cache::builder()
            .max_capacity(256)
            .time_to_live(config.catalog_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpOrderGatewayInner {
                client,
                base_url: config.base_url.clone(),
                token: config.token.clone(),
                catalog,
                driver_accounts: Cache::new(1024),
            }),
        })
    }

    fn url(&self, path: &str, user: Option<UserId>) -> Result<Url, GatewayError> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| GatewayError::BadRequest(format!("invalid endpoint {path}: {e}")))?;
        if let Some(user) = user {
            url.query_pairs_mut()
                .append_pair("userId", &user.to_string());
        }
        Ok(url)
    }

    /// Send a request and decode the JSON answer, mapping error statuses.
    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        user: Option<UserId>,
        body: Option<&B>,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self
            .inner
            .client
            .request(method.clone(), self.url(path, user)?);
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                %method,
                path,
                status = %status,
                body = %text.chars().take(MAX_ERROR_BODY).collect::<String>(),
                "Ordering service returned non-success status"
            );
            return Err(map_error_status(status, &text));
        }

        debug!(%method, path, status = %status, "Ordering service call succeeded");
        Ok(serde_json::from_str(&text)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        user: Option<UserId>,
    ) -> Result<T, GatewayError> {
        self.send::<T, ()>(Method::GET, path, user, None).await
    }

    /// Read one order back from its customer's history.
    async fn read_back(&self, customer: UserId, order: OrderId) -> Result<Order, GatewayError> {
        self.list_orders_for_customer(customer)
            .await?
            .into_iter()
            .find(|o| o.order_id == order)
            .ok_or_else(|| {
                GatewayError::Incomplete(format!("order {order} missing from customer history"))
            })
    }

    /// Remember which account a driver signs in with, and convert.
    async fn learn_driver(&self, view: DriverView) -> Driver {
        let driver = Driver::from(view);
        if let Some(user) = driver.user_id {
            self.inner
                .driver_accounts
                .insert(driver.driver_id, user)
                .await;
        }
        driver
    }
}

/// Translate a non-success response into a typed error.
fn map_error_status(status: StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| body.chars().take(MAX_ERROR_BODY).collect::<String>(),
        |b| b.error,
    );

    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Forbidden(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            GatewayError::BadRequest(message)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            GatewayError::Unavailable(message)
        }
        other => GatewayError::Status {
            status: other.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    #[instrument(skip(self, order), fields(customer_id = %order.customer_id, restaurant_id = %order.restaurant_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, GatewayError> {
        let created: OrderCreated = self
            .send(
                Method::POST,
                "api/orders",
                None,
                Some(&CreateOrderBody::from(&order)),
            )
            .await?;
        debug!(order_id = %created.order_id, "Order created, reading it back");

        let mut placed = self.read_back(order.customer_id, created.order_id).await?;
        if placed.transaction_id.is_none() {
            placed.transaction_id = order.transaction_id;
        }
        if placed.payment_method.is_none() {
            placed.payment_method = order.payment_method;
        }
        Ok(placed)
    }

    #[instrument(skip(self))]
    async fn list_orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, GatewayError> {
        let views: Vec<OrderView> = self
            .get(&format!("api/orders/user/{customer}"), None)
            .await?;
        wire::into_orders(views, Some(customer), None)
    }

    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    async fn list_orders_for_admin(&self, caller: Caller) -> Result<Vec<Order>, GatewayError> {
        let views: Vec<OrderView> = self.get("api/admin/orders", Some(caller.user_id)).await?;
        wire::into_orders(views, None, None)
    }

    #[instrument(skip(self), fields(user_id = %caller.user_id))]
    async fn list_drivers(&self, caller: Caller) -> Result<Vec<Driver>, GatewayError> {
        let views: Vec<DriverView> = self.get("api/admin/drivers", Some(caller.user_id)).await?;
        let mut drivers = Vec::with_capacity(views.len());
        for view in views {
            drivers.push(self.learn_driver(view).await);
        }
        Ok(drivers)
    }

    #[instrument(skip(self))]
    async fn list_orders_for_driver(&self, driver: DriverId) -> Result<Vec<Order>, GatewayError> {
        let user = self
            .inner
            .driver_accounts
            .get(&driver)
            .await
            .ok_or_else(|| GatewayError::NotFound(format!("no known account for driver {driver}")))?;

        let body: DriverOrders = self.get("api/driver/orders", Some(user)).await?;
        if body.driver.id != driver {
            return Err(GatewayError::Forbidden(format!(
                "account {user} acts as driver {}, not {driver}",
                body.driver.id
            )));
        }
        wire::into_orders(body.orders, None, Some(driver))
    }

    #[instrument(skip(self))]
    async fn driver_profile(&self, user: UserId) -> Result<Driver, GatewayError> {
        let mut view: DriverView = self.get("api/driver/profile", Some(user)).await?;
        // Fetched by account, so the account is known even when omitted.
        view.ensure_user(user);
        Ok(self.learn_driver(view).await)
    }

    #[instrument(skip(self), fields(order_id = %order, role = %caller.role))]
    async fn update_order(
        &self,
        order: OrderId,
        patch: OrderPatch,
        caller: Caller,
    ) -> Result<Order, GatewayError> {
        let user = Some(caller.user_id);
        match caller.role {
            Role::Admin => {
                let view: OrderView = self
                    .send(
                        Method::PATCH,
                        &format!("api/admin/orders/{order}"),
                        user,
                        Some(&patch),
                    )
                    .await?;
                view.into_order(None, None)
            }
            Role::Driver => {
                let status = patch
                    .status
                    .ok_or_else(|| GatewayError::BadRequest("status is required".to_string()))?;
                let body: DriverStatusChanged = self
                    .send(
                        Method::PATCH,
                        &format!("api/driver/orders/{order}/status"),
                        user,
                        Some(&StatusBody { status }),
                    )
                    .await?;
                let driver = body.driver.id;
                body.order.into_order(None, Some(driver))
            }
            Role::Customer => self.cancel_order(order, caller.user_id).await,
        }
    }

    #[instrument(skip(self), fields(order_id = %order))]
    async fn cancel_order(&self, order: OrderId, caller: UserId) -> Result<Order, GatewayError> {
        let ack: OrderCancelled = self
            .send::<_, ()>(
                Method::PATCH,
                &format!("api/orders/{order}/cancel"),
                Some(caller),
                None,
            )
            .await?;
        debug!(order_id = %ack.order_id, status = %ack.status, "Cancellation acknowledged");
        self.read_back(caller, ack.order_id).await
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, GatewayError> {
        if let Some(CatalogValue::Restaurants(cached)) =
            self.inner.catalog.get(&CatalogKey::Restaurants).await
        {
            debug!("Cache hit for restaurants");
            return Ok(cached.as_ref().clone());
        }

        let views: Vec<RestaurantView> = self.get("api/restaurants", None).await?;
        let restaurants: Vec<Restaurant> = views.into_iter().map(Restaurant::from).collect();
        self.inner
            .catalog
            .insert(
                CatalogKey::Restaurants,
                CatalogValue::Restaurants(Arc::new(restaurants.clone())),
            )
            .await;
        Ok(restaurants)
    }

    async fn list_menu(&self, restaurant: RestaurantId) -> Result<Vec<MenuItem>, GatewayError> {
        let key = CatalogKey::Menu(restaurant);
        if let Some(CatalogValue::Menu(cached)) = self.inner.catalog.get(&key).await {
            debug!(restaurant_id = %restaurant, "Cache hit for menu");
            return Ok(cached.as_ref().clone());
        }

        let views: Vec<MenuItemView> = self
            .get(&format!("api/restaurants/{restaurant}/menu"), None)
            .await?;
        let menu: Vec<MenuItem> = views
            .into_iter()
            .map(|view| view.into_menu_item(restaurant))
            .collect();
        self.inner
            .catalog
            .insert(key, CatalogValue::Menu(Arc::new(menu.clone())))
            .await;
        Ok(menu)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_message_is_extracted() {
        let err = map_error_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":"status change not allowed"}"#,
        );
        assert!(matches!(err, GatewayError::BadRequest(m) if m == "status change not allowed"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_error_status(StatusCode::FORBIDDEN, "{}"),
            GatewayError::Forbidden(_)
        ));
        assert!(matches!(
            map_error_status(StatusCode::NOT_FOUND, "order not found"),
            GatewayError::NotFound(m) if m == "order not found"
        ));
        assert!(matches!(
            map_error_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            GatewayError::Unavailable(_)
        ));
        assert!(matches!(
            map_error_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            GatewayError::Status { status: 500, .. }
        ));
    }

    fn gateway() -> HttpOrderGateway {
        let config = ApiConfig {
            base_url: Url::parse("http://localhost:8080/").unwrap(),
            token: None,
            timeout: std::time::Duration::from_secs(5),
            catalog_ttl: std::time::Duration::from_secs(60),
        };
        HttpOrderGateway::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_urls_carry_caller() {
        let gateway = gateway();

        let url = gateway.url("api/orders/user/3", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/orders/user/3");

        let url = gateway
            .url("api/admin/orders", Some(UserId::new(2)))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/admin/orders?userId=2");
    }

    #[tokio::test]
    async fn test_driver_orders_need_a_known_account() {
        let gateway = gateway();
        let err = gateway
            .list_orders_for_driver(DriverId::new(7))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_roster_teaches_driver_accounts() {
        let gateway = gateway();
        let view: DriverView =
            serde_json::from_str(r#"{"id": 7, "name": "Ravi", "user": {"id": 70}}"#).unwrap();
        let driver = gateway.learn_driver(view).await;
        assert_eq!(driver.driver_id, DriverId::new(7));
        assert_eq!(
            gateway.inner.driver_accounts.get(&DriverId::new(7)).await,
            Some(UserId::new(70))
        );
    }
}
