//! # Remark Ingestion Service
//!
//! Caller-owned orchestrator of listener sessions.
//!
//! ## State machine
//!
//! ```text
//! Idle --start ok--> Listening --stop--> Stopped
//! Idle --start failed--> Idle
//! Starting --stop--> Stopped
//! ```
//!
//! `stop` does not wait out a start that is still retrying: it raises the
//! cancel flag first, the start abandons establishment at once, and only
//! then does `stop` take the lifecycle lock.
//!
//! `Listening` carries an orthogonal degraded flag raised by the health
//! monitor; it never changes the state.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use summit_telemetry::INGESTION_ERRORS;

use super::session::Session;
use crate::algorithms::classified;
use crate::config::{IngestionConfig, TransportConfig};
use crate::domain::{BackendKind, ChainEventRecord, SessionState, SetupError};
use crate::ports::{ChainConnector, EmergencyStore, IngestionObserver, RemarkIngestionApi};

/// Remark ingestion service - owns at most one active session.
pub struct RemarkIngestionService {
    /// Resolves chain clients.
    connector: Arc<dyn ChainConnector>,
    /// Emergency persistence.
    store: Arc<dyn EmergencyStore>,
    /// Configuration.
    config: IngestionConfig,
    /// Current or most recent session.
    session: RwLock<Option<Arc<Session>>>,
    /// Lifecycle state.
    state: RwLock<SessionState>,
    /// Serializes start and stop.
    lifecycle: Mutex<()>,
    /// Raised by `stop` to abandon an in-flight start.
    cancel: watch::Sender<bool>,
}

impl RemarkIngestionService {
    /// Create an idle service.
    pub fn new(
        connector: Arc<dyn ChainConnector>,
        store: Arc<dyn EmergencyStore>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            connector,
            store,
            config,
            session: RwLock::new(None),
            state: RwLock::new(SessionState::Idle),
            lifecycle: Mutex::new(()),
            cancel: watch::channel(false).0,
        }
    }

    /// Whether the health monitor has flagged the session as silent.
    pub fn is_degraded(&self) -> bool {
        self.active_session().is_some_and(|s| s.is_degraded())
    }

    /// Backend feeding the active session.
    pub fn active_backend(&self) -> Option<BackendKind> {
        self.active_session().map(|s| s.backend())
    }

    /// Service configuration.
    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    fn active_session(&self) -> Option<Arc<Session>> {
        self.session.read().clone().filter(|s| s.is_active())
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    fn fail_setup(
        &self,
        observer: &dyn IngestionObserver,
        err: SetupError,
        fallback: SessionState,
    ) -> SetupError {
        let report = classified(err.clone(), None);
        INGESTION_ERRORS.with_label_values(&[report.class.as_str()]).inc();
        error!(class = %report.class, "Failed to start listener: {}", err);
        observer.on_error(&report);
        self.set_state(fallback);
        err
    }
}

#[async_trait]
impl RemarkIngestionApi for RemarkIngestionService {
    async fn start(
        &self,
        transport: TransportConfig,
        filter_account: Option<String>,
        observer: Arc<dyn IngestionObserver>,
    ) -> Result<(), SetupError> {
        let _lifecycle = self.lifecycle.lock().await;
        self.cancel.send_replace(false);

        if let Some(current) = self.active_session() {
            if current.matches(&transport, &filter_account) {
                debug!(endpoint = %transport.endpoint, "Already listening with this configuration");
                return Ok(());
            }
            info!(endpoint = %transport.endpoint, "Replacing listener session");
            current.close();
            self.set_state(SessionState::Stopped);
        }
        let fallback = *self.state.read();

        if let Err(e) = self.config.validate().and_then(|_| transport.validate()) {
            return Err(self.fail_setup(observer.as_ref(), e, fallback));
        }

        self.set_state(SessionState::Starting);
        match Session::open(
            self.connector.as_ref(),
            self.store.clone(),
            observer.clone(),
            &self.config,
            transport,
            filter_account,
            self.cancel.subscribe(),
        )
        .await
        {
            Ok(session) => {
                *self.session.write() = Some(Arc::new(session));
                self.set_state(SessionState::Listening);
                Ok(())
            }
            Err(SetupError::Cancelled) => {
                self.set_state(SessionState::Stopped);
                Err(SetupError::Cancelled)
            }
            Err(e) => Err(self.fail_setup(observer.as_ref(), e, fallback)),
        }
    }

    async fn stop(&self) {
        self.cancel.send_replace(true);
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(session) = self.active_session() {
            session.close();
            self.set_state(SessionState::Stopped);
            info!("Listener stopped");
        }
    }

    fn is_listening(&self) -> bool {
        *self.state.read() == SessionState::Listening && self.active_session().is_some()
    }

    fn get_history(&self) -> Vec<ChainEventRecord> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.history())
            .unwrap_or_default()
    }

    fn state(&self) -> SessionState {
        *self.state.read()
    }
}
