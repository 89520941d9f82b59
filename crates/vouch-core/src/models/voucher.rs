//! Normalized voucher model reconstructed from exported accounting data.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One reconstructed financial transaction (e.g. a sales invoice).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    /// Stable identifier derived from the source document.
    pub id: String,

    /// Voucher number as printed on the document.
    pub voucher_number: String,

    /// Date in display format (e.g. `01-Apr-2024`).
    pub date: String,

    /// Counter-party ledger name.
    pub party_name: String,

    /// Voucher type name (e.g. `Tax Invoice`).
    pub voucher_type: String,

    /// Voucher total, always non-negative.
    pub amount: Decimal,

    /// External reference.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,

    /// Free-text narration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub narration: String,

    /// Inventory lines. Empty for service-only vouchers.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// GST breakdown.
    pub tax: TaxBreakdown,

    /// Rounding adjustment. Keeps the sign from the source.
    pub round_off: Decimal,

    /// Sum of line discounts.
    pub total_discount: Decimal,

    /// Sum of line amounts.
    pub taxable_amount: Decimal,
}

/// A single inventory line on a voucher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stock item name.
    pub name: String,

    pub quantity: Decimal,

    /// Unit of measure (e.g. `Nos`, `Pcs`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,

    pub rate: Decimal,

    /// Line amount (non-negative).
    pub amount: Decimal,

    /// HSN/SAC classification code.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hsn_code: String,

    /// Discount value, present only when a discount percentage applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,

    /// Discount percentage.
    pub discount_percent: Decimal,
}

impl LineItem {
    /// Gross value before discount, `None` on overflow.
    pub fn gross_amount(&self) -> Option<Decimal> {
        self.rate.checked_mul(self.quantity)
    }
}

/// GST amounts and rates classified from ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub igst_amount: Decimal,

    /// Rates are the first ones seen, never averaged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgst_rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgst_rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub igst_rate: Option<Decimal>,

    /// `cgst_amount + sgst_amount + igst_amount`.
    pub total_tax: Decimal,
}

impl TaxBreakdown {
    /// Intrastate supply (CGST + SGST) as opposed to interstate (IGST).
    pub fn is_intrastate(&self) -> bool {
        self.igst_amount.is_zero() && !(self.cgst_amount + self.sgst_amount).is_zero()
    }
}

/// Aggregates over a set of vouchers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub voucher_count: usize,
    pub total_amount: Decimal,
    pub taxable_amount: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub igst_amount: Decimal,
    pub total_tax: Decimal,
    pub total_discount: Decimal,
    pub round_off: Decimal,
}

impl SalesSummary {
    /// Summarize the given vouchers.
    ///
    /// A voucher whose amounts would overflow the running totals is left out.
    pub fn from_vouchers<'a>(vouchers: impl IntoIterator<Item = &'a Voucher>) -> Self {
        let mut summary = Self::default();
        for voucher in vouchers {
            match summary.checked_add(voucher) {
                Some(next) => summary = next,
                None => warn!("Voucher {} left out of summary: totals overflow", voucher.id),
            }
        }
        summary
    }

    fn checked_add(&self, v: &Voucher) -> Option<Self> {
        Some(Self {
            voucher_count: self.voucher_count + 1,
            total_amount: self.total_amount.checked_add(v.amount)?,
            taxable_amount: self.taxable_amount.checked_add(v.taxable_amount)?,
            cgst_amount: self.cgst_amount.checked_add(v.tax.cgst_amount)?,
            sgst_amount: self.sgst_amount.checked_add(v.tax.sgst_amount)?,
            igst_amount: self.igst_amount.checked_add(v.tax.igst_amount)?,
            total_tax: self.total_tax.checked_add(v.tax.total_tax)?,
            total_discount: self.total_discount.checked_add(v.total_discount)?,
            round_off: self.round_off.checked_add(v.round_off)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn voucher(amount: i64, cgst: i64, igst: i64) -> Voucher {
        let mut v = Voucher {
            amount: Decimal::from(amount),
            taxable_amount: Decimal::from(amount - cgst * 2 - igst),
            ..Voucher::default()
        };
        v.tax.cgst_amount = Decimal::from(cgst);
        v.tax.sgst_amount = Decimal::from(cgst);
        v.tax.igst_amount = Decimal::from(igst);
        v.tax.total_tax = Decimal::from(cgst * 2 + igst);
        v
    }

    #[test]
    fn test_intrastate_detection() {
        assert!(voucher(118, 9, 0).tax.is_intrastate());
        assert!(!voucher(118, 0, 18).tax.is_intrastate());
        assert!(!TaxBreakdown::default().is_intrastate());
    }

    #[test]
    fn test_summary_totals() {
        let vouchers = vec![voucher(118, 9, 0), voucher(236, 0, 36)];
        let summary = SalesSummary::from_vouchers(&vouchers);

        assert_eq!(summary.voucher_count, 2);
        assert_eq!(summary.total_amount, Decimal::from(354));
        assert_eq!(summary.taxable_amount, Decimal::from(300));
        assert_eq!(summary.total_tax, Decimal::from(54));
        assert_eq!(summary.igst_amount, Decimal::from(36));
    }

    #[test]
    fn test_overflowing_voucher_left_out_of_summary() {
        let mut big = voucher(0, 0, 0);
        big.amount = Decimal::MAX - Decimal::from(118);
        let vouchers = vec![voucher(118, 9, 0), big.clone(), big];

        let summary = SalesSummary::from_vouchers(&vouchers);
        assert_eq!(summary.voucher_count, 2);
        assert_eq!(summary.total_amount, Decimal::MAX);
        assert_eq!(summary.cgst_amount, Decimal::from(9));
    }

    #[test]
    fn test_line_gross() {
        let item = LineItem {
            rate: Decimal::new(1005, 1),
            quantity: Decimal::from(2),
            ..LineItem::default()
        };
        assert_eq!(item.gross_amount(), Some(Decimal::from(201)));

        let huge = LineItem {
            rate: Decimal::MAX,
            quantity: Decimal::from(2),
            ..LineItem::default()
        };
        assert_eq!(huge.gross_amount(), None);
    }
}
