//! Error types for the vouch-core library.

use thiserror::Error;

/// Main error type for the vouch library.
#[derive(Error, Debug)]
pub enum VouchError {
    /// A query parameter was missing or malformed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The accounting system could not be reached.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The source returned a document that is not well-formed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The export request could not be rendered.
    #[error("request error: {0}")]
    Request(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised before any network activity when a query is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No company was selected.
    #[error("no company selected")]
    MissingCompany,

    /// A date was not in `YYYYMMDD` (or `YYYY-MM-DD`) form.
    #[error("invalid {field} date: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    /// The date range ends before it starts.
    #[error("date range is reversed: {from} > {to}")]
    ReversedRange { from: String, to: String },

    /// Page size must be at least one.
    #[error("page size must be positive")]
    ZeroPageSize,

    /// Pages are numbered from one.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors from the channel that delivers raw documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused or host unreachable.
    #[error("could not reach source: {0}")]
    Unreachable(String),

    /// The request did not complete in time.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The source answered with a non-success status.
    #[error("source returned status {0}")]
    Status(u16),

    /// The request was rejected at the boundary.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// The sanitized document is not well-formed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source returned unparseable data at byte {position}: {message}")]
pub struct ParseError {
    /// Byte offset into the sanitized text.
    pub position: u64,
    /// Description of the structural problem.
    pub message: String,
}

impl ParseError {
    pub fn new(position: u64, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Faults confined to a single voucher record. Never escapes the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A numeric reconstruction overflowed.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

/// Result type for the vouch library.
pub type Result<T> = std::result::Result<T, VouchError>;
