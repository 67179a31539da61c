//! # Listener Session
//!
//! One established transport plus the tasks serving it:
//!
//! - the subscription feed (owned by the transport, cancelled via handle)
//! - the dispatcher, spawning one pipeline task per notification
//! - the health task, ticking the silence monitor
//!
//! Closing a session cancels all three. Pipeline tasks already running are
//! not killed; they see the cleared active flag before any side effect.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use summit_telemetry::{SUBSCRIBE_ATTEMPTS, TRANSPORT_FALLBACKS};

use super::pipeline::Pipeline;
use crate::adapters::{retry_with_backoff, PollingTransport, StreamingTransport};
use crate::config::{IngestionConfig, TransportConfig, TransportKind};
use crate::domain::{BackendKind, ChainEventRecord, SetupError};
use crate::ports::{
    ChainClient, ChainConnector, ChainTransport, EmergencyStore, IngestionObserver,
    NotificationSink, SubscriptionHandle, TransportMessage,
};

pub(crate) struct Session {
    transport_config: TransportConfig,
    filter_account: Option<String>,
    backend: BackendKind,
    pipeline: Arc<Pipeline>,
    subscription: SubscriptionHandle,
    dispatcher: JoinHandle<()>,
    health_task: JoinHandle<()>,
}

impl Session {
    /// Connect, establish a backend and start serving notifications.
    ///
    /// Establishment is abandoned with [`SetupError::Cancelled`] as soon as
    /// `cancel` turns true, including mid-backoff.
    pub(crate) async fn open(
        connector: &dyn ChainConnector,
        store: Arc<dyn EmergencyStore>,
        observer: Arc<dyn IngestionObserver>,
        config: &IngestionConfig,
        transport_config: TransportConfig,
        filter_account: Option<String>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Self, SetupError> {
        let client = connector
            .connect(&transport_config)
            .await
            .map_err(|source| SetupError::Connect {
                endpoint: transport_config.endpoint.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(config.notification_buffer);
        // A dropped future drops any handle it holds, which cancels the feed.
        let (transport, subscription) = tokio::select! {
            established = establish(client, &transport_config, tx) => established?,
            Ok(_) = cancel.wait_for(|stop| *stop) => {
                info!(
                    endpoint = %transport_config.endpoint,
                    "Start cancelled while establishing transport"
                );
                return Err(SetupError::Cancelled);
            }
        };
        let backend = transport.kind();

        let pipeline = Arc::new(Pipeline::new(
            config,
            transport,
            store,
            observer,
            filter_account.clone(),
        ));
        let dispatcher = tokio::spawn(dispatch(rx, pipeline.clone()));
        let health_task = tokio::spawn(monitor_health(
            pipeline.clone(),
            config.health_check_interval(),
        ));

        info!(
            endpoint = %transport_config.endpoint,
            backend = ?backend,
            filter = ?filter_account,
            "Listening for remarks"
        );

        Ok(Self {
            transport_config,
            filter_account,
            backend,
            pipeline,
            subscription,
            dispatcher,
            health_task,
        })
    }

    /// Whether this session was opened with the same parameters.
    pub(crate) fn matches(
        &self,
        transport_config: &TransportConfig,
        filter_account: &Option<String>,
    ) -> bool {
        self.transport_config == *transport_config && self.filter_account == *filter_account
    }

    /// Stop the session. Idempotent.
    pub(crate) fn close(&self) {
        // Flag first so in-flight work stops before its next side effect.
        self.pipeline.deactivate();
        self.subscription.cancel();
        self.dispatcher.abort();
        self.health_task.abort();
    }

    pub(crate) fn is_active(&self) -> bool {
        self.pipeline.is_active()
    }

    pub(crate) fn backend(&self) -> BackendKind {
        self.backend
    }

    pub(crate) fn history(&self) -> Vec<ChainEventRecord> {
        self.pipeline.history()
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.pipeline.is_degraded()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Streaming with retry, then polling. Fails only if polling fails too.
async fn establish(
    client: Arc<dyn ChainClient>,
    config: &TransportConfig,
    sink: NotificationSink,
) -> Result<(Arc<dyn ChainTransport>, SubscriptionHandle), SetupError> {
    let mut attempts = 0;

    if config.kind == TransportKind::Streaming {
        let streaming: Arc<dyn ChainTransport> =
            Arc::new(StreamingTransport::new(client.clone(), config.retry.clone()));

        let result = retry_with_backoff(&config.retry, |attempt| {
            let streaming = streaming.clone();
            let sink = sink.clone();
            async move {
                let result = streaming.subscribe(sink).await;
                match &result {
                    Ok(_) => SUBSCRIBE_ATTEMPTS.with_label_values(&["success"]).inc(),
                    Err(e) => {
                        SUBSCRIBE_ATTEMPTS.with_label_values(&["failed"]).inc();
                        warn!(attempt, error = %e, "Head subscription failed");
                    }
                }
                result
            }
        })
        .await;

        match result {
            Ok(handle) => return Ok((streaming, handle)),
            Err((made, error)) => {
                attempts = made;
                TRANSPORT_FALLBACKS.inc();
                warn!(attempts, %error, "Streaming unavailable, falling back to polling");
            }
        }
    }

    let polling: Arc<dyn ChainTransport> = Arc::new(PollingTransport::new(
        client,
        config.poll_interval(),
        config.max_catch_up_blocks,
    ));
    match polling.subscribe(sink).await {
        Ok(handle) => {
            SUBSCRIBE_ATTEMPTS.with_label_values(&["success"]).inc();
            Ok((polling, handle))
        }
        Err(last_error) => {
            SUBSCRIBE_ATTEMPTS.with_label_values(&["failed"]).inc();
            Err(SetupError::Exhausted {
                attempts: attempts + 1,
                last_error,
            })
        }
    }
}

/// Fire-and-continue: each notification gets its own task so slow
/// persistence never holds up receipt of the next one.
async fn dispatch(mut rx: mpsc::Receiver<TransportMessage>, pipeline: Arc<Pipeline>) {
    while let Some(message) = rx.recv().await {
        if !pipeline.is_active() {
            break;
        }
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.handle(message).await });
    }
    debug!("Dispatcher finished");
}

async fn monitor_health(pipeline: Arc<Pipeline>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        pipeline.check_health();
    }
}
