//! Voucher reconstruction module.

mod engine;
pub mod rules;

pub use engine::{
    Reconstruction, VoucherEngine, DEFAULT_VOUCHER_TYPE, INVENTORY_NODES, LEDGER_NODES,
    VOUCHER_NODE,
};
