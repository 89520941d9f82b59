//! Removal of control characters that XML 1.0 does not allow.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref CHAR_REFERENCE: Regex = Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").unwrap();
}

/// Whether a code point is a C0 control outside {tab, LF, CR}, or DEL.
pub fn is_disallowed_control(code: u32) -> bool {
    matches!(code, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F)
}

/// Strip encoded and raw control characters from a raw document.
///
/// Returns the input borrowed when nothing had to be removed. Removal repeats
/// until the text stops changing, so `sanitize(sanitize(x)) == sanitize(x)`
/// holds even when a removal splices a new reference together.
pub fn sanitize(raw: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(raw);

    loop {
        let next = {
            let without_refs = strip_references(&current);
            let cleaned = strip_raw_controls(&without_refs);
            // Removal only shrinks the text.
            (cleaned.len() != current.len()).then(|| cleaned.into_owned())
        };

        match next {
            Some(cleaned) => current = Cow::Owned(cleaned),
            None => return current,
        }
    }
}

fn strip_references(text: &str) -> Cow<'_, str> {
    if !text.contains("&#") {
        return Cow::Borrowed(text);
    }

    CHAR_REFERENCE.replace_all(text, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };

        match code {
            Some(c) if is_disallowed_control(c) => String::new(),
            _ => caps[0].to_string(),
        }
    })
}

fn strip_raw_controls(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| is_disallowed_control(c as u32)) {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.chars()
            .filter(|c| !is_disallowed_control(*c as u32))
            .collect(),
    )
}
