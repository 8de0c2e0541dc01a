//! Money arithmetic.
//!
//! Prices are stored as `f64` but every calculation goes through `Decimal` and is rounded
//! half-up (midpoint away from zero) to cents before it is converted back.

use rust_decimal::prelude::*;

const DECIMAL_PLACES: u32 = 2;

/// Convert an `f64` amount into `Decimal`. Non-finite input becomes zero.
#[inline]
#[must_use]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert back to `f64`, rounded to cents half-up.
#[inline]
#[must_use]
pub fn to_f64(value: Decimal) -> f64 {
    round_cents(value).to_f64().unwrap_or_default()
}

/// Round to cents, half-up.
#[inline]
#[must_use]
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `unit_price * quantity`, rounded to cents.
#[must_use]
pub fn line_total(unit_price: f64, quantity: i32) -> f64 {
    to_f64(to_decimal(unit_price) * Decimal::from(quantity))
}

/// Breakdown of a discounted price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountedPrice {
    /// Price before the discount
    pub original: f64,
    /// Amount taken off
    pub discount: f64,
    /// Price the student pays
    pub final_amount: f64,
}

/// `round(original * (1 - percentage / 100), 2)`, half-up.
///
/// The discount is derived as `original - final` so the three parts always add up.
#[must_use]
pub fn apply_percentage(original: f64, percentage: f64) -> DiscountedPrice {
    let original_dec = round_cents(to_decimal(original));
    let factor = Decimal::ONE - to_decimal(percentage) / Decimal::ONE_HUNDRED;
    let final_dec = round_cents(original_dec * factor).max(Decimal::ZERO);

    DiscountedPrice {
        original: to_f64(original_dec),
        discount: to_f64(original_dec - final_dec),
        final_amount: to_f64(final_dec),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_twenty_percent_off() {
        let price = apply_percentage(45.0, 20.0);
        assert_eq!(price.final_amount, 36.0);
        assert_eq!(price.discount, 9.0);
        assert_eq!(price.original, 45.0);
    }

    #[test]
    fn test_rounds_half_up() {
        // 10.05 * 0.5 = 5.025 -> 5.03 (banker's rounding would give 5.02)
        let price = apply_percentage(10.05, 50.0);
        assert_eq!(price.final_amount, 5.03);
        assert_eq!(price.discount, 5.02);
    }

    #[test]
    fn test_zero_and_full_discount() {
        assert_eq!(apply_percentage(30.0, 0.0).final_amount, 30.0);
        assert_eq!(apply_percentage(30.0, 100.0).final_amount, 0.0);
    }

    #[test]
    fn test_round_trip_recovers_original_price() {
        for (price, pct) in [(45.0, 20.0), (33.33, 15.0), (120.0, 35.0), (9.99, 10.0)] {
            let discounted = apply_percentage(price, pct);
            let recovered = discounted.final_amount / (1.0 - pct / 100.0);
            assert!(
                (recovered - price).abs() < 0.01,
                "{price} at {pct}% recovered as {recovered}"
            );
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(25.5, 3), 76.5);
        assert_eq!(line_total(0.1, 3), 0.3);
    }

    #[test]
    fn test_non_finite_becomes_zero() {
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
    }
}
