//! End-to-end scenarios driving `RemarkIngestionService` against `MockChainNode`.

pub mod e2e_ingestion;
pub mod lifecycle;
pub mod transport_fallback;
