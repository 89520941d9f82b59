//! Classification of ledger entries into tax heads and round-off.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::patterns::LEDGER_RATE;
use crate::error::RecordError;
use crate::models::voucher::TaxBreakdown;

/// Bucket a ledger entry contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerHead {
    Cgst,
    Sgst,
    Igst,
    RoundOff,
}

/// One row of the classification table: any of `needles` found in the
/// lowercased ledger name selects `head`.
#[derive(Debug, Clone, Copy)]
pub struct LedgerRule {
    pub needles: &'static [&'static str],
    pub head: LedgerHead,
}

/// Rules are tried in order; the first match wins.
pub const LEDGER_RULES: &[LedgerRule] = &[
    LedgerRule { needles: &["cgst"], head: LedgerHead::Cgst },
    LedgerRule { needles: &["sgst", "utgst"], head: LedgerHead::Sgst },
    LedgerRule { needles: &["igst"], head: LedgerHead::Igst },
    LedgerRule { needles: &["round", "rounding"], head: LedgerHead::RoundOff },
];

/// Classify a ledger name against [`LEDGER_RULES`].
pub fn classify_ledger(name: &str) -> Option<LedgerHead> {
    classify_with(LEDGER_RULES, name)
}

/// Classify a ledger name against a custom rule table.
pub fn classify_with(rules: &[LedgerRule], name: &str) -> Option<LedgerHead> {
    let lower = name.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| lower.contains(needle)))
        .map(|rule| rule.head)
}

/// Rate written into a ledger name as `@<number>%`.
pub fn rate_in_name(name: &str) -> Option<Decimal> {
    LEDGER_RATE
        .captures(name)
        .and_then(|caps| Decimal::from_str(&caps[1]).ok())
}

/// Running totals of classified ledger entries for one voucher.
#[derive(Debug, Clone, Default)]
pub struct LedgerTally {
    pub tax: TaxBreakdown,
    pub round_off: Decimal,
}

impl LedgerTally {
    /// Add a ledger entry. Returns the head it was booked under, if any.
    ///
    /// Tax heads accumulate absolute amounts and keep the first rate seen;
    /// round-off keeps the sign.
    pub fn record(
        &mut self,
        ledger_name: &str,
        amount: Decimal,
    ) -> Result<Option<LedgerHead>, RecordError> {
        let Some(head) = classify_ledger(ledger_name) else {
            return Ok(None);
        };

        let (total, rate_slot) = match head {
            LedgerHead::Cgst => (&mut self.tax.cgst_amount, &mut self.tax.cgst_rate),
            LedgerHead::Sgst => (&mut self.tax.sgst_amount, &mut self.tax.sgst_rate),
            LedgerHead::Igst => (&mut self.tax.igst_amount, &mut self.tax.igst_rate),
            LedgerHead::RoundOff => {
                self.round_off = self
                    .round_off
                    .checked_add(amount)
                    .ok_or(RecordError::Overflow("round-off"))?;
                return Ok(Some(head));
            }
        };

        *total = total
            .checked_add(amount.abs())
            .ok_or(RecordError::Overflow("tax amount"))?;
        if rate_slot.is_none() {
            *rate_slot = rate_in_name(ledger_name);
        }
        Ok(Some(head))
    }

    /// Finish the tally, computing `total_tax`.
    pub fn finish(mut self) -> Result<(TaxBreakdown, Decimal), RecordError> {
        self.tax.total_tax = self
            .tax
            .cgst_amount
            .checked_add(self.tax.sgst_amount)
            .and_then(|sum| sum.checked_add(self.tax.igst_amount))
            .ok_or(RecordError::Overflow("total tax"))?;
        Ok((self.tax, self.round_off))
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
    fn test_classify_ledger() {
        assert_eq!(classify_ledger("Output CGST @9%"), Some(LedgerHead::Cgst));
        assert_eq!(classify_ledger("OUTPUT SGST"), Some(LedgerHead::Sgst));
        assert_eq!(classify_ledger("UTGST Payable"), Some(LedgerHead::Sgst));
        assert_eq!(classify_ledger("igst 18%"), Some(LedgerHead::Igst));
        assert_eq!(classify_ledger("Round Off"), Some(LedgerHead::RoundOff));
        assert_eq!(classify_ledger("Rounding Adjustment"), Some(LedgerHead::RoundOff));
        assert_eq!(classify_ledger("Sales Account"), None);
        assert_eq!(classify_ledger(""), None);
    }

    #[test]
    fn test_custom_rule_table() {
        const CESS: &[LedgerRule] = &[LedgerRule { needles: &["cess"], head: LedgerHead::Igst }];
        assert_eq!(classify_with(CESS, "GST Cess"), Some(LedgerHead::Igst));
        assert_eq!(classify_with(CESS, "CGST"), None);
    }

    #[test]
    fn test_rate_in_name() {
        assert_eq!(rate_in_name("CGST @9%"), Some(dec("9")));
        assert_eq!(rate_in_name("IGST @ 18 %"), Some(dec("18")));
        assert_eq!(rate_in_name("SGST @2.5%"), Some(dec("2.5")));
        assert_eq!(rate_in_name("CGST 9%"), None);
    }

    #[test]
    fn test_tally_sums_duplicates_and_keeps_first_rate() {
        let mut tally = LedgerTally::default();
        tally.record("CGST @9%", dec("-27")).unwrap();
        tally.record("CGST @6%", dec("12")).unwrap();
        tally.record("SGST @9%", dec("-27")).unwrap();
        tally.record("Sales", dec("300")).unwrap();

        let (tax, round_off) = tally.finish().unwrap();
        assert_eq!(tax.cgst_amount, dec("39"));
        assert_eq!(tax.cgst_rate, Some(dec("9")));
        assert_eq!(tax.sgst_amount, dec("27"));
        assert_eq!(tax.igst_amount, Decimal::ZERO);
        assert_eq!(tax.total_tax, dec("66"));
        assert_eq!(round_off, Decimal::ZERO);
    }

    #[test]
    fn test_rate_captured_from_later_entry_when_first_has_none() {
        let mut tally = LedgerTally::default();
        tally.record("IGST", dec("10")).unwrap();
        tally.record("IGST @18%", dec("18")).unwrap();

        let (tax, _) = tally.finish().unwrap();
        assert_eq!(tax.igst_rate, Some(dec("18")));
    }

    #[test]
    fn test_round_off_keeps_sign() {
        let mut tally = LedgerTally::default();
        tally.record("Round Off", dec("-0.40")).unwrap();
        tally.record("Rounding", dec("0.10")).unwrap();

        let (tax, round_off) = tally.finish().unwrap();
        assert_eq!(round_off, dec("-0.30"));
        assert_eq!(tax.total_tax, Decimal::ZERO);
    }
}
