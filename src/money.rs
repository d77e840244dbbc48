use rust_decimal::{Decimal, RoundingStrategy};

/// Round a currency amount to 2 decimal places, half-up.
///
/// Totals are always recomputed server-side from catalog prices; this is the
/// single rounding point, so repeated computation cannot drift by cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Line subtotal: price x quantity, rounded to cents.
pub fn line_subtotal(price: Decimal, quantity: i32) -> Decimal {
    round_money(price * Decimal::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rounds_half_up_at_two_places() {
        assert_eq!(round_money(dec("1.005")), dec("1.01"));
        assert_eq!(round_money(dec("1.004")), dec("1.00"));
        assert_eq!(round_money(dec("2.675")), dec("2.68"));
    }

    #[test]
    fn subtotal_is_price_times_quantity() {
        assert_eq!(line_subtotal(dec("2.00"), 3), dec("6.00"));
        assert_eq!(line_subtotal(dec("0.33"), 3), dec("0.99"));
    }

    #[test]
    fn negative_amounts_round_away_from_zero() {
        assert_eq!(round_money(dec("-1.005")), dec("-1.01"));
    }
}
