//! # Error Classifier
//!
//! Sorts errors into the three handling classes:
//!
//! - `Ignorable`: transport noise (backend internal faults, teardown during
//!   reconnection). Logged at debug, never surfaced.
//! - `Transient`: anything that goes wrong for a single notification or a
//!   single record. Surfaced; the subscription keeps running.
//! - `Fatal`: no backend could be established at startup.
//!
//! Classification works on typed variants only. Free-text heuristics live
//! in the transport adapters.

use crate::domain::{ClassifiedError, ErrorClass, IngestionError, TransportError};

/// Classify an error.
pub fn classify(error: &IngestionError) -> ErrorClass {
    match error {
        IngestionError::Transport(
            TransportError::BackendInternal(_) | TransportError::ConnectionClosed(_),
        ) => ErrorClass::Ignorable,
        IngestionError::Transport(_) | IngestionError::Storage(_) => ErrorClass::Transient,
        IngestionError::Setup(_) => ErrorClass::Fatal,
    }
}

/// Classify and wrap an error for delivery.
pub fn classified(error: impl Into<IngestionError>, block_number: Option<u64>) -> ClassifiedError {
    let error = error.into();
    ClassifiedError {
        class: classify(&error),
        error,
        block_number,
    }
}
