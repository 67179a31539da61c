//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: transports, connector, store and the
//! channel observer.

mod connector;
mod memory_store;
mod observer;
pub mod transport;

pub use connector::StaticConnector;
pub use memory_store::InMemoryEmergencyStore;
pub use observer::{ChannelObserver, IngestionNotice};
pub use transport::{
    map_backend_message, map_rpc_error, retry_with_backoff, PollingTransport, StreamingTransport,
};
