//! Backend error mapping.
//!
//! Client libraries report failures as free text. This is the single place
//! that text is inspected; everything downstream matches on
//! [`TransportError`] variants.
//!
//! `ChainClient` implementations call these before returning an error;
//! `MockChainNode` does so for its scripted failures.

use crate::domain::TransportError;

/// Symptoms of the client library's own internal faults.
const INTERNAL_FAULT_PATTERNS: [&str; 5] = [
    "cannot read properties of undefined",
    "cannot read properties of null",
    "is not a function",
    "undefined is not an object",
    "null pointer",
];

/// Teardown noise seen while a client reconnects.
const CONNECTION_CLOSED_PATTERNS: [&str; 5] = [
    "normal closure",
    "abnormal closure",
    "1006",
    "not connected",
    "disconnected",
];

const TIMEOUT_PATTERNS: [&str; 2] = ["timeout", "timed out"];

/// Translate a backend error description into a typed error.
pub fn map_backend_message(message: &str) -> TransportError {
    let lower = message.to_ascii_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(&INTERNAL_FAULT_PATTERNS) {
        TransportError::BackendInternal(message.to_string())
    } else if matches(&CONNECTION_CLOSED_PATTERNS) {
        TransportError::ConnectionClosed(message.to_string())
    } else if matches(&TIMEOUT_PATTERNS) {
        TransportError::Timeout(0)
    } else {
        TransportError::Unavailable(message.to_string())
    }
}

/// Map a JSON-RPC error object to a typed error.
pub fn map_rpc_error(code: i64, message: &str) -> TransportError {
    match map_backend_message(message) {
        TransportError::Unavailable(_) => TransportError::Rpc {
            code,
            message: message.to_string(),
        },
        mapped => mapped,
    }
}
