//! Common regex patterns for voucher field extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Rate embedded in a ledger name: "Output CGST @9%", "IGST @ 18 %"
    pub static ref LEDGER_RATE: Regex = Regex::new(
        r"@\s*(\d+(?:\.\d+)?)\s*%"
    ).unwrap();

    // Everything that is not part of a plain decimal number
    pub static ref NON_NUMERIC: Regex = Regex::new(
        r"[^0-9.\-]"
    ).unwrap();

    // Unit suffix of a quantity ("10 Nos") or rate ("100.00/Pcs")
    pub static ref UNIT_SUFFIX: Regex = Regex::new(
        r"(?:^|[\d\s/])([A-Za-z][A-Za-z.]*)\s*$"
    ).unwrap();

    // Compact source date: 20240401
    pub static ref COMPACT_DATE: Regex = Regex::new(
        r"^(\d{4})(\d{2})(\d{2})$"
    ).unwrap();

    // ISO date: 2024-04-01
    pub static ref ISO_DATE: Regex = Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})$"
    ).unwrap();
}
