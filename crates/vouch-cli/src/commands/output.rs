//! Rendering of vouchers for the terminal and for files.

use rust_decimal::Decimal;
use serde::Serialize;

use vouch_core::{SalesSummary, Voucher};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per voucher
    Csv,
    /// Plain text listing
    Text,
}

/// Flat CSV row for one voucher.
#[derive(Serialize)]
struct VoucherRow<'a> {
    id: &'a str,
    voucher_number: &'a str,
    date: &'a str,
    party_name: &'a str,
    voucher_type: &'a str,
    reference: &'a str,
    items: usize,
    taxable_amount: Decimal,
    total_discount: Decimal,
    cgst_amount: Decimal,
    sgst_amount: Decimal,
    igst_amount: Decimal,
    total_tax: Decimal,
    round_off: Decimal,
    amount: Decimal,
}

impl<'a> From<&'a Voucher> for VoucherRow<'a> {
    fn from(v: &'a Voucher) -> Self {
        Self {
            id: &v.id,
            voucher_number: &v.voucher_number,
            date: &v.date,
            party_name: &v.party_name,
            voucher_type: &v.voucher_type,
            reference: &v.reference,
            items: v.items.len(),
            taxable_amount: v.taxable_amount,
            total_discount: v.total_discount,
            cgst_amount: v.tax.cgst_amount,
            sgst_amount: v.tax.sgst_amount,
            igst_amount: v.tax.igst_amount,
            total_tax: v.tax.total_tax,
            round_off: v.round_off,
            amount: v.amount,
        }
    }
}

pub fn format_vouchers(vouchers: &[Voucher], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(vouchers)?),
        OutputFormat::Csv => format_csv(vouchers),
        OutputFormat::Text => Ok(format_text(vouchers)),
    }
}

fn format_csv(vouchers: &[Voucher]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for voucher in vouchers {
        wtr.serialize(VoucherRow::from(voucher))?;
    }
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(vouchers: &[Voucher]) -> String {
    let mut output = String::new();

    for voucher in vouchers {
        output.push_str(&format!(
            "{}  {}  {}  {}\n",
            voucher.voucher_number, voucher.date, voucher.party_name, voucher.amount
        ));
        for item in &voucher.items {
            output.push_str(&format!(
                "    {} x{} {} @ {} = {}\n",
                item.name, item.quantity, item.unit, item.rate, item.amount
            ));
        }
        if voucher.tax.is_intrastate() {
            output.push_str(&format!(
                "    CGST {}  SGST {}\n",
                voucher.tax.cgst_amount, voucher.tax.sgst_amount
            ));
        } else if !voucher.tax.igst_amount.is_zero() {
            output.push_str(&format!("    IGST {}\n", voucher.tax.igst_amount));
        }
    }

    output
}

pub fn format_summary(summary: &SalesSummary) -> String {
    let mut output = String::new();
    output.push_str(&format!("Vouchers: {}\n", summary.voucher_count));
    output.push_str(&format!("  Taxable:   {}\n", summary.taxable_amount));
    output.push_str(&format!("  Discount:  {}\n", summary.total_discount));
    output.push_str(&format!("  CGST:      {}\n", summary.cgst_amount));
    output.push_str(&format!("  SGST:      {}\n", summary.sgst_amount));
    output.push_str(&format!("  IGST:      {}\n", summary.igst_amount));
    output.push_str(&format!("  Round-off: {}\n", summary.round_off));
    output.push_str(&format!("  Total:     {}\n", summary.total_amount));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn voucher() -> Voucher {
        let mut v = Voucher {
            id: "r-1".to_string(),
            voucher_number: "INV-1".to_string(),
            date: "02-Apr-2024".to_string(),
            party_name: "Acme Traders".to_string(),
            voucher_type: "Tax Invoice".to_string(),
            amount: Decimal::from_str("118.00").unwrap(),
            taxable_amount: Decimal::from(100),
            ..Voucher::default()
        };
        v.tax.cgst_amount = Decimal::from(9);
        v.tax.sgst_amount = Decimal::from(9);
        v.tax.total_tax = Decimal::from(18);
        v
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let csv = format_vouchers(&[voucher()], OutputFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,voucher_number,date"));
        assert!(lines.next().unwrap().starts_with("r-1,INV-1,02-Apr-2024,Acme Traders"));
    }

    #[test]
    fn test_text_shows_tax_heads() {
        let text = format_vouchers(&[voucher()], OutputFormat::Text).unwrap();
        assert!(text.contains("INV-1"));
        assert!(text.contains("CGST 9  SGST 9"));
    }
}
