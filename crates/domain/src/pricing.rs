//! Line pricing.
//!
//! Prices are computed once, when an order is placed, and frozen into its
//! line items. Nothing here reads live catalog data.

use crate::money::{DiscountPercent, Money};

/// Unit price after discount, rounded down to whole cents.
///
/// `None` when the price is too large to discount without overflow.
pub fn discounted_unit_price(unit_price: Money, discount: DiscountPercent) -> Option<Money> {
    let keep = 100 - i64::from(discount.value());
    unit_price
        .cents()
        .checked_mul(keep)
        .map(|scaled| Money::from_cents(scaled.div_euclid(100)))
}

/// Price of `quantity` units: the rounded discounted unit price times the
/// quantity. `None` when the result does not fit in [`Money`].
pub fn line_price(unit_price: Money, discount: DiscountPercent, quantity: u32) -> Option<Money> {
    discounted_unit_price(unit_price, discount)?.checked_mul(quantity)
}
