//! Voucher reconstruction from a parsed export document.

use std::collections::BTreeSet;
use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::document::{parse_sanitized, Document, Node};
use crate::error::{ParseError, RecordError};
use crate::models::voucher::{LineItem, Voucher};

use super::rules::{discount_for, display_date, parse_field, parse_loose, unit_of, LedgerTally};

/// Element holding one exported voucher.
pub const VOUCHER_NODE: &str = "VOUCHER";

/// Inventory line blocks.
pub const INVENTORY_NODES: &[&str] = &["ALLINVENTORYENTRIES.LIST", "INVENTORYENTRIES.LIST"];

/// Ledger posting blocks.
pub const LEDGER_NODES: &[&str] = &["ALLLEDGERENTRIES.LIST", "LEDGERENTRIES.LIST"];

/// Voucher type kept when no policy is configured.
pub const DEFAULT_VOUCHER_TYPE: &str = "Tax Invoice";

/// Outcome of reconstructing one document.
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    /// Vouchers in document order.
    pub vouchers: Vec<Voucher>,
    /// Records without any identifying data.
    pub skipped_noise: usize,
    /// Records of a type outside the allowed set.
    pub skipped_type: usize,
    /// Records that failed reconstruction.
    pub skipped_faulty: usize,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

enum Outcome {
    Kept(Voucher),
    Noise,
    OtherType(String),
}

/// Rebuilds [`Voucher`]s from loosely-structured export documents.
#[derive(Debug, Clone)]
pub struct VoucherEngine {
    allowed_types: BTreeSet<String>,
}

impl VoucherEngine {
    /// Create an engine that keeps only `Tax Invoice` vouchers.
    pub fn new() -> Self {
        Self::with_allowed_types([DEFAULT_VOUCHER_TYPE])
    }

    /// Create an engine with a custom voucher type policy.
    pub fn with_allowed_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether vouchers of this type are kept (exact, case-sensitive).
    pub fn allows(&self, voucher_type: &str) -> bool {
        self.allowed_types.contains(voucher_type)
    }

    pub fn allowed_types(&self) -> impl Iterator<Item = &str> {
        self.allowed_types.iter().map(String::as_str)
    }

    /// Reconstruct every acceptable voucher in the document.
    pub fn reconstruct(&self, doc: &Document) -> Vec<Voucher> {
        self.reconstruct_with_report(doc).vouchers
    }

    /// Sanitize, parse and reconstruct raw text.
    pub fn reconstruct_text(&self, raw: &str) -> Result<Reconstruction, ParseError> {
        let doc = parse_sanitized(raw)?;
        Ok(self.reconstruct_with_report(&doc))
    }

    /// Reconstruct with counts of skipped records.
    ///
    /// A record that cannot be reconstructed is skipped; it never aborts the
    /// rest of the batch.
    pub fn reconstruct_with_report(&self, doc: &Document) -> Reconstruction {
        let start = Instant::now();
        let mut report = Reconstruction::default();

        let records = doc.find_all(&[VOUCHER_NODE]);
        for (index, node) in records.iter().enumerate() {
            match self.reconstruct_record(node, index + 1) {
                Ok(Outcome::Kept(voucher)) => report.vouchers.push(voucher),
                Ok(Outcome::Noise) => report.skipped_noise += 1,
                Ok(Outcome::OtherType(voucher_type)) => {
                    debug!("Skipping voucher {} of type {:?}", index + 1, voucher_type);
                    report.skipped_type += 1;
                }
                Err(e) => {
                    warn!("Skipping voucher {}: {}", index + 1, e);
                    report.skipped_faulty += 1;
                }
            }
        }

        report.processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Reconstructed {} of {} vouchers ({} noise, {} other types, {} faulty)",
            report.vouchers.len(),
            records.len(),
            report.skipped_noise,
            report.skipped_type,
            report.skipped_faulty
        );

        report
    }

    fn reconstruct_record(&self, node: &Node, position: usize) -> Result<Outcome, RecordError> {
        let text = |name: &str| node.child_text(name).unwrap_or_default().to_string();

        let raw_date = text("DATE");
        let voucher_number = text("VOUCHERNUMBER");
        let party_name = node
            .first_text(&["PARTYLEDGERNAME", "PARTYNAME"])
            .unwrap_or_default()
            .to_string();
        let voucher_type = node
            .child_text("VOUCHERTYPENAME")
            .filter(|t| !t.is_empty())
            .or_else(|| node.attr("VCHTYPE"))
            .unwrap_or_default()
            .trim()
            .to_string();

        let ledgers = node.descendants_named(LEDGER_NODES);

        // An overflowing amount is not zero, so it never makes a record noise.
        let unidentified = raw_date.is_empty() && voucher_number.is_empty() && party_name.is_empty();
        if unidentified && resolve_amount(node, &ledgers).is_ok_and(|a| a.is_zero()) {
            return Ok(Outcome::Noise);
        }

        if !self.allows(&voucher_type) {
            return Ok(Outcome::OtherType(voucher_type));
        }

        let amount = resolve_amount(node, &ledgers)?;

        let items = node
            .descendants_named(INVENTORY_NODES)
            .into_iter()
            .filter_map(|entry| line_item(entry).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        let mut tally = LedgerTally::default();
        for ledger in &ledgers {
            let name = ledger.child_text("LEDGERNAME").unwrap_or_default();
            tally.record(name, parse_field(ledger.child_text("AMOUNT")))?;
        }
        let (tax, round_off) = tally.finish()?;

        let taxable_amount = checked_sum(items.iter().map(|i| i.amount), "taxable amount")?;
        let total_discount = checked_sum(
            items.iter().filter_map(|i| i.discount_amount),
            "total discount",
        )?;

        Ok(Outcome::Kept(Voucher {
            id: voucher_id(node, position),
            voucher_number,
            date: display_date(&raw_date),
            party_name,
            voucher_type,
            amount,
            reference: text("REFERENCE"),
            narration: text("NARRATION"),
            items,
            tax,
            round_off,
            total_discount,
            taxable_amount,
        }))
    }
}

impl Default for VoucherEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit voucher amount, else the sum of absolute ledger amounts.
fn resolve_amount(node: &Node, ledgers: &[&Node]) -> Result<Decimal, RecordError> {
    let explicit = parse_field(node.child_text("AMOUNT")).abs();
    if !explicit.is_zero() {
        return Ok(explicit);
    }

    checked_sum(
        ledgers
            .iter()
            .map(|ledger| parse_field(ledger.child_text("AMOUNT")).abs()),
        "ledger amount",
    )
}

fn line_item(entry: &Node) -> Result<Option<LineItem>, RecordError> {
    let Some(name) = entry
        .first_text(&["STOCKITEMNAME"])
        .map(str::to_string)
    else {
        return Ok(None);
    };

    let rate_text = entry.child_text("RATE").unwrap_or_default();
    let qty_text = entry.first_text(&["BILLEDQTY", "ACTUALQTY"]).unwrap_or_default();

    let mut item = LineItem {
        name,
        quantity: parse_loose(qty_text),
        unit: unit_of(qty_text)
            .or_else(|| rate_text.split_once('/').and_then(|(_, u)| unit_of(u)))
            .unwrap_or_default(),
        rate: parse_loose(rate_text),
        hsn_code: entry
            .first_text(&["GSTHSNCODE", "HSNCODE"])
            .unwrap_or_default()
            .to_string(),
        discount_percent: parse_field(entry.child_text("DISCOUNT")).max(Decimal::ZERO),
        ..LineItem::default()
    };

    let gross = item
        .gross_amount()
        .ok_or(RecordError::Overflow("gross amount"))?;
    item.discount_amount = discount_for(gross, item.discount_percent);

    let stated = parse_field(entry.child_text("AMOUNT")).abs();
    item.amount = if stated.is_zero() {
        (gross - item.discount_amount.unwrap_or_default()).max(Decimal::ZERO)
    } else {
        stated
    };

    Ok(Some(item))
}

fn voucher_id(node: &Node, position: usize) -> String {
    node.attr("REMOTEID")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| node.first_text(&["GUID", "MASTERID"]))
        .map(str::to_string)
        .unwrap_or_else(|| format!("voucher-{position}"))
}

fn checked_sum(
    mut values: impl Iterator<Item = Decimal>,
    what: &'static str,
) -> Result<Decimal, RecordError> {
    values.try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v).ok_or(RecordError::Overflow(what))
    })
}
