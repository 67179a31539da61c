//! Static connector: resolves clients from a fixed endpoint table.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::TransportConfig;
use crate::domain::TransportError;
use crate::ports::{ChainClient, ChainConnector};

/// Connector over pre-built clients.
///
/// Clients are looked up by endpoint; a default client, if set, serves
/// every other endpoint.
#[derive(Default)]
pub struct StaticConnector {
    clients: HashMap<String, Arc<dyn ChainClient>>,
    default: Option<Arc<dyn ChainClient>>,
}

impl StaticConnector {
    /// Connector with no clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that serves `client` for any endpoint.
    pub fn single(client: Arc<dyn ChainClient>) -> Self {
        Self {
            clients: HashMap::new(),
            default: Some(client),
        }
    }

    /// Register `client` for `endpoint`.
    pub fn with_endpoint(
        mut self,
        endpoint: impl Into<String>,
        client: Arc<dyn ChainClient>,
    ) -> Self {
        self.clients.insert(endpoint.into(), client);
        self
    }
}

#[async_trait]
impl ChainConnector for StaticConnector {
    async fn connect(
        &self,
        config: &TransportConfig,
    ) -> Result<Arc<dyn ChainClient>, TransportError> {
        let client = self
            .clients
            .get(&config.endpoint)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| {
                TransportError::Unavailable(format!("no client for endpoint {}", config.endpoint))
            })?;
        debug!(endpoint = %config.endpoint, client = client.endpoint(), "Resolved chain client");
        Ok(client)
    }
}
