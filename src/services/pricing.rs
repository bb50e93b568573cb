use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

/// Flat tax rate applied to every order subtotal.
pub const TAX_RATE: Decimal = dec!(0.08);
/// Orders strictly above this subtotal ship free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = dec!(100);
/// Flat shipping charge below the free-shipping threshold.
pub const FLAT_SHIPPING: Decimal = dec!(10);

/// Price breakdown for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Computes tax, shipping and total for a subtotal.
///
/// Pure and total over all non-negative subtotals:
/// tax = subtotal x 0.08, shipping = 0 above 100.00 else 10.00,
/// total = subtotal + tax + shipping.
pub fn price_order(subtotal: Decimal) -> PricingBreakdown {
    let tax = subtotal * TAX_RATE;
    let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING
    };
    PricingBreakdown {
        subtotal,
        tax,
        shipping,
        total: subtotal + tax + shipping,
    }
}

/// Converts a decimal total into the smallest currency unit for the
/// payment gateway, rounding half-up on total x 100.
pub fn amount_in_cents(total: Decimal) -> i64 {
    (total * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .try_into()
        .unwrap_or(i64::MAX)
}
