//! Checkout pricing.

/// Unit price after the product-level discount, in minor units.
///
/// Percentage discounts round down; fixed discounts floor at zero. Unknown
/// or incomplete discount terms leave the price untouched.
pub fn effective_price(
    price: i64,
    discount_enabled: bool,
    discount_type: Option<&str>,
    discount_value: Option<i64>,
) -> i64 {
    if !discount_enabled {
        return price;
    }
    match (discount_type, discount_value) {
        (Some("percentage"), Some(value)) => {
            let value = value.clamp(0, 100);
            price - price * value / 100
        }
        (Some("fixed"), Some(value)) => (price - value.max(0)).max(0),
        _ => price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_discount_keeps_the_price() {
        assert_eq!(effective_price(1000, false, Some("percentage"), Some(50)), 1000);
    }

    #[test]
    fn percentage_discount() {
        assert_eq!(effective_price(1000, true, Some("percentage"), Some(25)), 750);
        // Rounds down on uneven splits.
        assert_eq!(effective_price(999, true, Some("percentage"), Some(10)), 900);
    }

    #[test]
    fn percentage_is_clamped() {
        assert_eq!(effective_price(1000, true, Some("percentage"), Some(150)), 0);
        assert_eq!(effective_price(1000, true, Some("percentage"), Some(-10)), 1000);
    }

    #[test]
    fn fixed_discount_floors_at_zero() {
        assert_eq!(effective_price(1000, true, Some("fixed"), Some(400)), 600);
        assert_eq!(effective_price(1000, true, Some("fixed"), Some(1400)), 0);
    }

    #[test]
    fn incomplete_terms_are_ignored() {
        assert_eq!(effective_price(1000, true, None, Some(50)), 1000);
        assert_eq!(effective_price(1000, true, Some("percentage"), None), 1000);
        assert_eq!(effective_price(1000, true, Some("bogo"), Some(1)), 1000);
    }
}
