//! Raw document handling: sanitizing and structural parsing.

mod sanitize;
mod tree;

pub use sanitize::{is_disallowed_control, sanitize};
pub use tree::{parse, Document, Node};

use crate::error::ParseError;

/// Sanitize raw text and parse it into a [`Document`].
pub fn parse_sanitized(raw: &str) -> Result<Document, ParseError> {
    let clean = sanitize(raw);
    parse(&clean)
}
