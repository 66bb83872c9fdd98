//! Money helpers using decimal arithmetic.
//!
//! Menu prices and order totals are plain [`Decimal`] amounts in the
//! restaurant's currency. A menu item may arrive without a price; callers
//! decide whether that counts as zero (display) or is an error (checkout).

use rust_decimal::{Decimal, RoundingStrategy};

/// Total for one line: `unit_price * quantity`, with a missing price as zero.
#[must_use]
pub fn line_total(unit_price: Option<Decimal>, quantity: u32) -> Decimal {
    unit_price.unwrap_or(Decimal::ZERO) * Decimal::from(quantity)
}

/// Format an amount with two decimal places (e.g. `19.00`), rounding half away
/// from zero.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
