//! Core library for accounting voucher extraction and paginated caching.
//!
//! This crate provides:
//! - Sanitizing and parsing of raw XML export documents
//! - Voucher reconstruction (line items, discounts, GST heads, round-off)
//! - A slot-based pagination cache and a small scalar cache, both with TTLs
//! - Background prefetch of neighbouring pages
//! - A service tying a document source to the caches

pub mod cache;
pub mod document;
pub mod error;
pub mod models;
pub mod prefetch;
pub mod service;
pub mod source;
pub mod voucher;

pub use error::{ParseError, Result, TransportError, ValidationError, VouchError};
pub use models::config::VouchConfig;
pub use models::voucher::{LineItem, SalesSummary, TaxBreakdown, Voucher};
pub use cache::{PageResult, PaginationCache, QueryWindow, ScalarCache};
pub use document::{parse, parse_sanitized, sanitize, Document, Node};
pub use prefetch::{FetchedPage, PrefetchScheduler};
pub use service::{fetch_page, VoucherService};
pub use source::{build_export_request, DocumentSource, SourceRequest};
pub use voucher::{Reconstruction, VoucherEngine};
