//! # Domain Errors
//!
//! Error types for remark ingestion.
//!
//! Only [`IngestionError`] ever reaches a caller, wrapped in a
//! [`ClassifiedError`]. Decode failures and envelope mismatches are not
//! errors at all from the pipeline's point of view: they are `None`.

use std::fmt;
use thiserror::Error;

/// Errors raised by a chain transport.
///
/// Backends translate whatever their client library throws into one of
/// these variants at the adapter boundary, so nothing downstream ever
/// inspects free-text error descriptions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The backend's own internals failed (null/undefined dereference
    /// symptoms surfacing from the client library).
    #[error("Backend internal fault: {0}")]
    BackendInternal(String),

    /// Connection torn down, typically while the client reconnects.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The node could not be reached.
    #[error("Node unavailable: {0}")]
    Unavailable(String),

    /// The node answered with an error.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code reported by the node
        code: i64,
        /// Error message reported by the node
        message: String,
    },

    /// A request did not complete in time.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The node refused to open a new-head subscription.
    #[error("Subscription rejected: {0}")]
    SubscriptionRejected(String),

    /// A live subscription ended and could not be re-established.
    #[error("Subscription lost after {attempts} resubscribe attempts")]
    SubscriptionLost {
        /// Resubscribe attempts made before giving up
        attempts: u32,
    },

    /// The requested block is unknown to the node.
    #[error("Block not found: {0}")]
    BlockNotFound(String),
}

/// Errors raised by the emergency store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The store could not be reached.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A different record already exists under the same emergency id.
    #[error("Conflicting record for emergency {0}")]
    Conflict(String),

    /// The write itself failed.
    #[error("Storage write failed: {0}")]
    WriteFailed(String),
}

/// Failure to establish any transport backend at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    /// The connector could not produce a client for the endpoint.
    #[error("Could not connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint from the transport configuration
        endpoint: String,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// Streaming (after retries) and polling both failed.
    #[error("No transport backend available after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Total establishment attempts across backends
        attempts: u32,
        /// Error from the final attempt
        last_error: TransportError,
    },

    /// The transport configuration is unusable.
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// `stop` was called while the start was still establishing a backend.
    #[error("Start cancelled by stop")]
    Cancelled,
}

/// Any error that can reach a caller's `on_error` callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestionError {
    /// Transport failure during a session.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Persistence failure for a single record.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Startup failure.
    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),
}

/// Outcome of error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transport noise; swallowed at debug level, never surfaced.
    Ignorable,
    /// Single-record failure; surfaced, subscription stays up.
    Transient,
    /// No backend at startup; surfaced, session does not start.
    Fatal,
}

impl ErrorClass {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Ignorable => "ignorable",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error together with its classification, as delivered to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// Classification outcome.
    pub class: ErrorClass,
    /// The error itself.
    pub error: IngestionError,
    /// Block being processed when the error occurred, if any.
    pub block_number: Option<u64>,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_number {
            Some(n) => write!(f, "[{}] block #{}: {}", self.class, n, self.error),
            None => write!(f, "[{}] {}", self.class, self.error),
        }
    }
}

/// Why an envelope could not be turned into a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The text does not start with the envelope prefix.
    #[error("Text is not an emergency envelope")]
    Mismatch,

    /// The prefix matched but a field is missing or invalid.
    #[error("Invalid emergency envelope: {0}")]
    Invalid(String),
}
