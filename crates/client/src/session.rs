//! Session / identity context.
//!
//! [`SessionContext`] is created once per client and carries everything that
//! belongs to the signed-in user: the identity handed over by the external
//! auth flow, the selected restaurant, the cart, the history refresh token,
//! and the cancellation root for any payment step in progress. Sign-out tears
//! all of it down.

use std::collections::BTreeSet;

use chrono::Utc;
use forkful_core::{Email, MenuItem, RestaurantId, Role, UserId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cart::Cart;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::gateway::Caller;

/// Identity issued by the external auth flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: Email,
    /// Raw role strings, e.g. `ROLE_ADMIN`.
    pub roles: BTreeSet<String>,
}

impl Session {
    #[must_use]
    pub fn new(user_id: UserId, email: Email, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            user_id,
            email,
            roles: roles.into_iter().collect(),
        }
    }

    /// Whether the session may act as `role`.
    ///
    /// Every signed-in user may act as a customer; admin and driver require
    /// the matching role string. Unrecognized role strings are ignored.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        role == Role::Customer
            || self
                .roles
                .iter()
                .any(|raw| raw.parse::<Role>().is_ok_and(|parsed| parsed == role))
    }

    /// The caller identity for acting as `role`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MissingRole`] if the session does not hold `role`.
    pub fn caller(&self, role: Role) -> Result<Caller> {
        if self.has_role(role) {
            Ok(Caller::new(self.user_id, role))
        } else {
            Err(AppError::MissingRole(role))
        }
    }
}

/// Per-user client state, from sign-in to sign-out.
#[derive(Debug, Default)]
pub struct SessionContext {
    session: Option<Session>,
    selected_restaurant: Option<RestaurantId>,
    cart: Option<Cart>,
    refresh_token: u64,
    payments: CancellationToken,
    /// Advanced on every sign-in and sign-out.
    generation: u64,
}

impl SessionContext {
    /// A signed-out context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new identity. Any previous session is torn down first.
    pub fn sign_in(&mut self, session: Session) {
        if self.session.is_some() {
            self.sign_out();
        }
        set_sentry_user(&session.user_id, Some(session.email.as_str()));
        info!(user_id = %session.user_id, roles = ?session.roles, "Signed in");
        self.session = Some(session);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drop the identity and everything owned by it.
    ///
    /// Cancels any payment step still waiting for confirmation.
    pub fn sign_out(&mut self) {
        self.payments.cancel();
        self.payments = CancellationToken::new();
        self.cart = None;
        self.selected_restaurant = None;
        self.generation = self.generation.wrapping_add(1);
        if let Some(session) = self.session.take() {
            info!(user_id = %session.user_id, "Signed out");
        }
        clear_sentry_user();
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthenticated`] when signed out.
    pub fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(AppError::Unauthenticated)
    }

    #[must_use]
    pub const fn selected_restaurant(&self) -> Option<RestaurantId> {
        self.selected_restaurant
    }

    /// Select (or deselect) the restaurant being ordered from.
    ///
    /// Choosing a different restaurant than the one the cart belongs to
    /// empties the cart; choosing the same one again leaves it alone.
    pub fn select_restaurant(&mut self, restaurant: Option<RestaurantId>) {
        let same = self
            .cart
            .as_ref()
            .map(Cart::restaurant_id)
            .zip(restaurant)
            .is_some_and(|(owner, next)| owner == next);

        if !same {
            if self.cart.as_ref().is_some_and(|cart| !cart.is_empty()) {
                debug!(?restaurant, "Restaurant changed, clearing cart");
            }
            self.cart = restaurant.map(Cart::new);
        }
        self.selected_restaurant = restaurant;
    }

    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    pub const fn cart_mut(&mut self) -> Option<&mut Cart> {
        self.cart.as_mut()
    }

    /// Add one unit of `item` to the cart of the selected restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoRestaurantSelected`] before a restaurant is
    /// chosen and [`AppError::ForeignItem`] for another restaurant's dish.
    pub fn add_to_cart(&mut self, item: &MenuItem) -> Result<()> {
        let cart = self.cart.as_mut().ok_or(AppError::NoRestaurantSelected)?;
        cart.add(item)?;
        Ok(())
    }

    /// Empty the cart, keeping the restaurant selection.
    pub fn clear_cart(&mut self) {
        if let Some(cart) = self.cart.as_mut() {
            cart.clear();
        }
    }

    /// Token views compare against to know when order history is stale.
    #[must_use]
    pub const fn refresh_token(&self) -> u64 {
        self.refresh_token
    }

    /// Advance the refresh token. Strictly increasing even if the clock is
    /// not.
    pub fn bump_refresh(&mut self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        self.refresh_token = now.max(self.refresh_token.saturating_add(1));
        self.refresh_token
    }

    /// Identifies the current sign-in. Work started under one generation
    /// must not be committed under another.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// A token for one payment step. Cancelled by the caller to abort the
    /// step, and by [`sign_out`](Self::sign_out).
    #[must_use]
    pub fn payment_cancellation(&self) -> CancellationToken {
        self.payments.child_token()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::MenuItemId;
    use rust_decimal::Decimal;

    use super::*;

    fn session(roles: &[&str]) -> Session {
        Session::new(
            UserId::new(5),
            Email::parse("ana@example.com").unwrap(),
            roles.iter().map(ToString::to_string),
        )
    }

    fn dish(id: i64, restaurant: i64) -> MenuItem {
        MenuItem {
            menu_item_id: MenuItemId::new(id),
            restaurant_id: RestaurantId::new(restaurant),
            name: format!("dish {id}"),
            price: Some(Decimal::new(950, 2)),
        }
    }

    #[test]
    fn test_roles_are_parsed_from_authorities() {
        let s = session(&["ROLE_ADMIN", "something_else"]);
        assert!(s.has_role(Role::Admin));
        assert!(s.has_role(Role::Customer));
        assert!(!s.has_role(Role::Driver));
        assert!(matches!(
            s.caller(Role::Driver),
            Err(AppError::MissingRole(Role::Driver))
        ));
        assert_eq!(s.caller(Role::Admin).unwrap().role, Role::Admin);
    }

    #[test]
    fn test_switching_restaurant_clears_cart() {
        let mut ctx = SessionContext::new();
        ctx.select_restaurant(Some(RestaurantId::new(1)));
        ctx.add_to_cart(&dish(1, 1)).unwrap();

        ctx.select_restaurant(Some(RestaurantId::new(1)));
        assert_eq!(ctx.cart().unwrap().item_count(), 1);

        ctx.select_restaurant(Some(RestaurantId::new(2)));
        assert!(ctx.cart().unwrap().is_empty());
        assert_eq!(ctx.cart().unwrap().restaurant_id(), RestaurantId::new(2));

        ctx.add_to_cart(&dish(3, 2)).unwrap();
        ctx.select_restaurant(None);
        assert!(ctx.cart().is_none());
    }

    #[test]
    fn test_add_requires_selection() {
        let mut ctx = SessionContext::new();
        assert!(matches!(
            ctx.add_to_cart(&dish(1, 1)),
            Err(AppError::NoRestaurantSelected)
        ));
    }

    #[test]
    fn test_refresh_token_is_strictly_increasing() {
        let mut ctx = SessionContext::new();
        let first = ctx.bump_refresh();
        let second = ctx.bump_refresh();
        assert!(second > first);
        assert_eq!(ctx.refresh_token(), second);
    }

    #[test]
    fn test_sign_out_tears_down_state() {
        let mut ctx = SessionContext::new();
        ctx.sign_in(session(&[]));
        ctx.select_restaurant(Some(RestaurantId::new(1)));
        ctx.add_to_cart(&dish(1, 1)).unwrap();
        let payment = ctx.payment_cancellation();

        ctx.sign_out();

        assert!(payment.is_cancelled());
        assert!(ctx.session().is_none());
        assert!(ctx.cart().is_none());
        assert!(ctx.selected_restaurant().is_none());
        assert!(!ctx.payment_cancellation().is_cancelled());
        assert!(matches!(
            ctx.require_session(),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_generation_changes_with_every_sign_in() {
        let mut ctx = SessionContext::new();
        ctx.sign_in(session(&[]));
        let first = ctx.generation();

        ctx.select_restaurant(Some(RestaurantId::new(1)));
        ctx.add_to_cart(&dish(1, 1)).unwrap();
        assert_eq!(ctx.generation(), first, "cart edits keep the generation");

        ctx.sign_in(session(&[]));
        let second = ctx.generation();
        assert_ne!(second, first, "same user signing in again is a new session");

        ctx.sign_out();
        assert_ne!(ctx.generation(), second);
    }
}
