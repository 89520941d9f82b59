//! Tolerant numeric parsing for loosely-typed source fields.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use super::patterns::{NON_NUMERIC, UNIT_SUFFIX};

/// Parse a number after stripping everything except digits, `.` and `-`.
///
/// `"100.50 Pcs"` → `100.50`, `"1,000.00/Nos"` → `1000.00`. Anything that still
/// does not parse yields zero.
pub fn parse_loose(s: &str) -> Decimal {
    let cleaned = NON_NUMERIC.replace_all(s, "");
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&cleaned).unwrap_or_default()
}

/// [`parse_loose`] over an optional field.
pub fn parse_field(s: Option<&str>) -> Decimal {
    s.map(parse_loose).unwrap_or_default()
}

/// Round half away from zero to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit of measure trailing a quantity or rate (`"10 Nos"`, `"100/Pcs"`).
pub fn unit_of(s: &str) -> Option<String> {
    UNIT_SUFFIX
        .captures(s.trim())
        .map(|caps| caps[1].trim_end_matches('.').to_string())
        .filter(|unit| !unit.is_empty())
}

/// Discount value for a gross amount and percentage, if one applies.
pub fn discount_for(gross: Decimal, percent: Decimal) -> Option<Decimal> {
    if percent > Decimal::ZERO {
        gross
            .checked_mul(percent)
            .map(|v| round2(v / Decimal::ONE_HUNDRED))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_loose() {
        assert_eq!(parse_loose("100.50 Pcs"), dec("100.50"));
        assert_eq!(parse_loose("1,000.00/Nos"), dec("1000.00"));
        assert_eq!(parse_loose(" 10 Nos"), dec("10"));
        assert_eq!(parse_loose("-1180.00"), dec("-1180.00"));
        assert_eq!(parse_loose("₹ 250"), dec("250"));
    }

    #[test]
    fn test_parse_loose_defaults_to_zero() {
        assert_eq!(parse_loose(""), Decimal::ZERO);
        assert_eq!(parse_loose("Nos"), Decimal::ZERO);
        assert_eq!(parse_loose("1.2.3"), Decimal::ZERO);
        assert_eq!(parse_loose("-"), Decimal::ZERO);
        assert_eq!(parse_field(None), Decimal::ZERO);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(dec("10.005")), dec("10.01"));
        assert_eq!(round2(dec("10.004")), dec("10.00"));
        assert_eq!(round2(dec("33.333333")), dec("33.33"));
    }

    #[test]
    fn test_discount_for() {
        assert_eq!(discount_for(dec("1000"), dec("10")), Some(dec("100.00")));
        assert_eq!(discount_for(dec("999"), dec("2.5")), Some(dec("24.98")));
        assert_eq!(discount_for(dec("1000"), Decimal::ZERO), None);
        assert_eq!(discount_for(dec("1000"), dec("-5")), None);
    }

    #[test]
    fn test_unit_of() {
        assert_eq!(unit_of("10 Nos"), Some("Nos".to_string()));
        assert_eq!(unit_of("100.50 Pcs"), Some("Pcs".to_string()));
        assert_eq!(unit_of("100.00/Box"), Some("Box".to_string()));
        assert_eq!(unit_of("2 kg."), Some("kg".to_string()));
        assert_eq!(unit_of("10"), None);
        assert_eq!(unit_of(""), None);
    }
}
