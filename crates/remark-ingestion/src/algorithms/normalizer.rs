//! # Content Normalizer
//!
//! Turns a [`RemarkArg`] into canonical UTF-8 text.
//!
//! Each argument shape has exactly one strategy:
//!
//! | Shape | Strategy |
//! |-------|----------|
//! | `Text` | hex-decode when `0x`-prefixed and the bytes are text, else as-is |
//! | `Bytes` | UTF-8 decode |
//! | `Wrapped(Hex)` / `Wrapped(Raw)` | materialize, then UTF-8 decode |
//! | `Rendered` | accepted only if it is not a generic placeholder |
//!
//! Decoding never partially succeeds: the result is a whole string or
//! `None`. Malformed remarks are background noise, so failures are logged
//! at debug level only.

use tracing::debug;

use crate::domain::{ByteCapability, RemarkArg};

/// Renderings client libraries produce for values they cannot display.
const PLACEHOLDER_RENDERINGS: [&str; 6] = [
    "undefined",
    "null",
    "[object Object]",
    "[object Uint8Array]",
    "<opaque>",
    "0x",
];

/// Normalize a remark argument to UTF-8 text.
pub fn normalize(arg: &RemarkArg) -> Option<String> {
    let text = match arg {
        RemarkArg::Text(s) => decode_text(s),
        RemarkArg::Bytes(bytes) => decode_bytes(bytes),
        RemarkArg::Wrapped(ByteCapability::Hex(h)) => decode_hex(h),
        RemarkArg::Wrapped(ByteCapability::Raw(bytes)) => decode_bytes(bytes),
        RemarkArg::Rendered(s) if is_placeholder(s) => None,
        RemarkArg::Rendered(s) => decode_text(s),
    };

    if text.is_none() {
        debug!(shape = shape_name(arg), "Remark argument could not be normalized");
    }
    text
}

/// Short shape label for diagnostics.
pub fn shape_name(arg: &RemarkArg) -> &'static str {
    match arg {
        RemarkArg::Text(_) => "text",
        RemarkArg::Bytes(_) => "bytes",
        RemarkArg::Wrapped(ByteCapability::Hex(_)) => "wrapped-hex",
        RemarkArg::Wrapped(ByteCapability::Raw(_)) => "wrapped-raw",
        RemarkArg::Rendered(_) => "rendered",
    }
}

fn decode_text(s: &str) -> Option<String> {
    match strip_hex_prefix(s) {
        Some("") => None,
        // Hex whose bytes are not text is taken literally.
        Some(digits) if is_hex(digits) => decode_hex(s).or_else(|| plausible(s.to_string())),
        _ => plausible(s.to_string()),
    }
}

fn decode_bytes(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    decode_text(text)
}

fn decode_hex(s: &str) -> Option<String> {
    let digits = strip_hex_prefix(s).unwrap_or(s);
    let bytes = hex::decode(digits).ok()?;
    String::from_utf8(bytes).ok().and_then(plausible)
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn is_hex(digits: &str) -> bool {
    digits.len() % 2 == 0 && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_placeholder(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty()
        || PLACEHOLDER_RENDERINGS.contains(&trimmed)
        || (trimmed.starts_with("[object ") && trimmed.ends_with(']'))
}

/// Reject empty text and text carrying control characters other than
/// whitespace.
fn plausible(text: String) -> Option<String> {
    let has_garbage = text.chars().any(|c| c.is_control() && !c.is_whitespace());
    if text.trim().is_empty() || has_garbage {
        None
    } else {
        Some(text)
    }
}
