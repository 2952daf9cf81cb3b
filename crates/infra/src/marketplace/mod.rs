//! Marketplace platform adapters.

pub mod amazon;
pub mod ebay;

pub use amazon::AmazonClient;
pub use ebay::EbayClient;

/// Parse a decimal money string ("49.99") into integer cents.
pub(crate) fn parse_money_cents(value: &str) -> Option<i64> {
    let amount: f64 = value.trim().parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    Some((amount * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::parse_money_cents;

    #[test]
    fn money_parsing_handles_common_shapes() {
        assert_eq!(parse_money_cents("49.99"), Some(4_999));
        assert_eq!(parse_money_cents("0"), Some(0));
        assert_eq!(parse_money_cents(" 12.5 "), Some(1_250));
        assert_eq!(parse_money_cents("-1"), None);
        assert_eq!(parse_money_cents("abc"), None);
    }
}
