//! Cart aggregate.
//!
//! Holds the lines of the customer's in-progress order against a single
//! restaurant. Pure local state: no network calls, no locking. The session
//! context owns the cart and replaces it whenever a different restaurant is
//! selected.

use forkful_core::{MenuItem, MenuItemId, OrderItem, RestaurantId, line_total};
use rust_decimal::Decimal;
use thiserror::Error;

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: MenuItemId,
    pub name: String,
    /// Missing when the dish has no price; counted as zero for display and
    /// rejected at checkout.
    pub unit_price: Option<Decimal>,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// `unit_price * quantity`, with a missing price as zero.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.unit_price, self.quantity)
    }
}

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The item is on another restaurant's menu.
    #[error("{item} belongs to restaurant {item_restaurant}, not {cart_restaurant}")]
    ForeignItem {
        item: MenuItemId,
        item_restaurant: RestaurantId,
        cart_restaurant: RestaurantId,
    },
}

/// Lines for one restaurant, keyed by menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    restaurant_id: RestaurantId,
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart for `restaurant_id`.
    #[must_use]
    pub const fn new(restaurant_id: RestaurantId) -> Self {
        Self {
            restaurant_id,
            lines: Vec::new(),
        }
    }

    /// The restaurant every line belongs to.
    #[must_use]
    pub const fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, item_id: MenuItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.item_id == item_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit of `item`.
    ///
    /// An item already in the cart has its quantity bumped by one; otherwise a
    /// new line with quantity 1 is appended.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ForeignItem`] if `item` is on another restaurant's
    /// menu; the cart is left unchanged.
    pub fn add(&mut self, item: &MenuItem) -> Result<(), CartError> {
        if item.restaurant_id != self.restaurant_id {
            return Err(CartError::ForeignItem {
                item: item.menu_item_id,
                item_restaurant: item.restaurant_id,
                cart_restaurant: self.restaurant_id,
            });
        }

        if let Some(line) = self.line_mut(item.menu_item_id) {
            line.quantity = line.quantity.saturating_add(1);
        } else {
            self.lines.push(CartLine {
                item_id: item.menu_item_id,
                name: item.name.clone(),
                unit_price: item.price,
                quantity: 1,
            });
        }
        Ok(())
    }

    /// Set a line's quantity to `max(1, quantity)`. No-op if absent.
    ///
    /// Takes a signed value so raw form input (including `0` or negatives
    /// from a stepper) can be passed straight through.
    pub fn set_quantity(&mut self, item_id: MenuItemId, quantity: i64) {
        if let Some(line) = self.line_mut(item_id) {
            line.quantity = u32::try_from(quantity.max(1)).unwrap_or(u32::MAX);
        }
    }

    /// Drop a line. No-op if absent.
    pub fn remove(&mut self, item_id: MenuItemId) {
        self.lines.retain(|line| line.item_id != item_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of `unit_price * quantity`; unpriced lines count as zero.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Number of units across all lines, for the cart badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// First line without a price, if any.
    #[must_use]
    pub fn first_unpriced(&self) -> Option<MenuItemId> {
        self.lines
            .iter()
            .find(|line| line.unit_price.is_none())
            .map(|line| line.item_id)
    }

    /// Lines in the shape the order-create request expects.
    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|line| OrderItem {
                menu_item_id: line.item_id,
                quantity: line.quantity,
            })
            .collect()
    }

    fn line_mut(&mut self, item_id: MenuItemId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.item_id == item_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dish(id: i64, restaurant: i64, price: Option<Decimal>) -> MenuItem {
        MenuItem {
            menu_item_id: MenuItemId::new(id),
            restaurant_id: RestaurantId::new(restaurant),
            name: format!("dish {id}"),
            price,
        }
    }

    #[test]
    fn test_add_same_item_twice_bumps_quantity() {
        let mut cart = Cart::new(RestaurantId::new(1));
        let item = dish(1, 1, Some(Decimal::new(950, 2)));

        cart.add(&item).unwrap();
        cart.add(&item).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.line(MenuItemId::new(1)).unwrap().quantity, 2);
        assert_eq!(cart.total(), Decimal::new(1900, 2));
    }

    #[test]
    fn test_add_rejects_foreign_item() {
        let mut cart = Cart::new(RestaurantId::new(1));
        let err = cart.add(&dish(5, 2, Some(Decimal::ONE))).unwrap_err();
        assert!(matches!(err, CartError::ForeignItem { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_clamps_to_one() {
        let mut cart = Cart::new(RestaurantId::new(1));
        cart.add(&dish(1, 1, Some(Decimal::ONE))).unwrap();

        for (requested, stored) in [(0, 1), (1, 1), (4, 4), (-3, 1), (i64::MAX, u32::MAX)] {
            cart.set_quantity(MenuItemId::new(1), requested);
            assert_eq!(cart.line(MenuItemId::new(1)).unwrap().quantity, stored);
        }
    }

    #[test]
    fn test_set_quantity_on_missing_item_is_noop() {
        let mut cart = Cart::new(RestaurantId::new(1));
        cart.add(&dish(1, 1, Some(Decimal::ONE))).unwrap();
        let before = cart.clone();

        cart.set_quantity(MenuItemId::new(99), 7);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new(RestaurantId::new(1));
        cart.add(&dish(1, 1, Some(Decimal::ONE))).unwrap();
        cart.add(&dish(2, 1, Some(Decimal::TWO))).unwrap();

        cart.remove(MenuItemId::new(1));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total(), Decimal::TWO);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }

    #[test]
    fn test_unpriced_lines_count_as_zero() {
        let mut cart = Cart::new(RestaurantId::new(1));
        cart.add(&dish(1, 1, None)).unwrap();
        cart.add(&dish(2, 1, Some(Decimal::new(3, 0)))).unwrap();

        assert_eq!(cart.total(), Decimal::new(3, 0));
        assert_eq!(cart.first_unpriced(), Some(MenuItemId::new(1)));
        assert_eq!(cart.item_count(), 2);
    }
}
