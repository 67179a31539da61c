//! # Algorithms
//!
//! Pure pipeline stages: decoding, envelope parsing, deduplication,
//! history, silence tracking and error classification.

pub mod classifier;
pub mod dedup;
pub mod envelope;
pub mod health;
pub mod history;
pub mod normalizer;

pub use classifier::{classified, classify};
pub use dedup::Deduplicator;
pub use envelope::{encode, parse, parse_detailed, ENVELOPE_PREFIX};
pub use health::{HealthAdvisory, HealthMonitor};
pub use history::RingHistory;
pub use normalizer::{normalize, shape_name};
