//! Rule-based field reconstruction for exported vouchers.

pub mod dates;
pub mod ledger;
pub mod numbers;
pub mod patterns;

pub use dates::{compact_date, display_date, parse_source_date};
pub use ledger::{classify_ledger, rate_in_name, LedgerHead, LedgerRule, LedgerTally, LEDGER_RULES};
pub use numbers::{discount_for, parse_field, parse_loose, round2, unit_of};
