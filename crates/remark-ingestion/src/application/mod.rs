//! # Application Module
//!
//! The orchestrator service, its listener sessions and the
//! per-notification pipeline.

mod pipeline;
mod session;
pub mod service;

pub use service::RemarkIngestionService;
