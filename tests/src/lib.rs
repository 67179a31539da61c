//! # Summit Test Suite
//!
//! Unified test crate driving the remark ingestion service end to end
//! against the scriptable `MockChainNode`.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Counting/gated stores, envelope and event builders
//! └── integration/
//!     ├── e2e_ingestion.rs      # Remark → emergency scenarios
//!     ├── transport_fallback.rs # Retry, polling fallback, stream loss
//!     └── lifecycle.rs          # start/stop, write-after-stop, health
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p summit-tests
//! cargo test -p summit-tests integration::transport_fallback::
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
