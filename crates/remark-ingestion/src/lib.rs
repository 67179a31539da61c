//! # Remark Ingestion
//!
//! Turns on-chain `System.remark` traffic into emergency records for the
//! Summit wallet.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Pipeline
//!
//! ```text
//! transport ──► normalize ──► parse envelope ──► dedup ──► persist ──► observer
//!     │                                                                  ▲
//!     └──────────── health monitor / history (side channel) ─────────────┘
//! ```
//!
//! | Stage | Behavior on bad input |
//! |-------|-----------------------|
//! | Normalizer | `None`, debug log |
//! | Envelope parser | `None`; validation failures at debug |
//! | Deduplicator | second sighting skipped |
//! | Store | error surfaced as transient, session keeps running |
//!
//! Transport noise (backend internal faults, reconnect teardown) is
//! classified ignorable and never reaches the caller. Only failing to
//! establish any backend at startup is fatal.
//!
//! ## Module Structure
//!
//! ```text
//! remark-ingestion/
//! ├── domain/          # Entities, payload, value objects, errors
//! ├── algorithms/      # Normalizer, envelope, dedup, history, health, classifier
//! ├── ports/           # API + observer (inbound), chain/store/transport (outbound)
//! ├── adapters/        # Streaming/polling transports, connector, store, observer
//! ├── application/     # RemarkIngestionService, sessions, pipeline
//! └── config.rs        # IngestionConfig, TransportConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    ChannelObserver, InMemoryEmergencyStore, IngestionNotice, PollingTransport, StaticConnector,
    StreamingTransport,
};
pub use algorithms::{
    classify, encode, normalize, parse, parse_detailed, Deduplicator, HealthAdvisory,
    HealthMonitor, RingHistory, ENVELOPE_PREFIX,
};
pub use application::RemarkIngestionService;
pub use config::{ExtrinsicScanMode, IngestionConfig, RetryPolicy, TransportConfig, TransportKind};
pub use domain::{
    BackendKind, BlockBody, BlockHash, BlockHeader, BlockNotification, BlockchainRef,
    ByteCapability, ChainEventRecord, ClassifiedError, EmergencyPayload, EmergencyRecord,
    EmergencyType, EnvelopeError, ErrorClass, IngestionError, Location, NormalizedRemark,
    ProcessedEventKey, RawEvent, RawExtrinsic, RemarkArg, SessionState, SetupError, Severity,
    StorageError, TransportError,
};
pub use ports::{
    ChainClient, ChainConnector, ChainTransport, EmergencyStore, IngestionObserver, MockChainNode,
    NoopObserver, RemarkIngestionApi, SubscriptionHandle, TransportMessage,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
