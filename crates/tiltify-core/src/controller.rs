//! Connection controller
//!
//! Owns the poll engine lifecycle for one configured campaign:
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──valid──► Connected
//!      ▲                          │                     │
//!      └────────invalid───────────┘                     │
//!      └──────────────────disconnect()──────────────────┘
//! ```
//!
//! All collaborators are passed in at construction. Nothing is global.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ConnectionConfig, EngineConfig};
use crate::context::load_campaign_context;
use crate::engine::PollEngine;
use crate::error::Result;
use crate::model::CampaignContext;
use crate::traits::{DonationSource, DonationSourceFactory, EventSink, StateStore};

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Signals emitted on lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The poll task for `campaign_id` was started
    Connected { campaign_id: String },

    /// The connection ended, or a connect attempt was rejected
    Disconnected { reason: String },
}

struct Running {
    campaign_id: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    state: ConnectionState,
    running: Option<Running>,
}

/// Connection controller
///
/// ## Usage
///
/// ```rust,ignore
/// let (controller, mut signals) =
///     ConnectionController::new(factory, store, sink, EngineConfig::default());
///
/// controller.connect(ConnectionConfig::new(token, "12345")).await?;
/// // ... events arrive on the sink ...
/// controller.disconnect().await;
/// ```
pub struct ConnectionController {
    factory: Arc<dyn DonationSourceFactory>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EventSink>,
    engine: EngineConfig,
    inner: Mutex<Inner>,
    signal_tx: mpsc::Sender<ConnectionEvent>,
}

impl ConnectionController {
    /// Create a disconnected controller
    ///
    /// # Returns
    ///
    /// A tuple of (controller, signal_receiver) where signal_receiver yields
    /// connect/disconnect signals
    pub fn new(
        factory: Arc<dyn DonationSourceFactory>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EventSink>,
        engine: EngineConfig,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (signal_tx, signal_rx) = mpsc::channel(engine.connection_event_capacity.max(1));

        let controller = Self {
            factory,
            store,
            sink,
            engine,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                running: None,
            }),
            signal_tx,
        };

        (controller, signal_rx)
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Campaign of the running connection, if any
    pub async fn campaign_id(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .running
            .as_ref()
            .map(|r| r.campaign_id.clone())
    }

    /// Validate `config` and start polling
    ///
    /// An already running connection is stopped first. On invalid config no
    /// network call is made, the controller returns to Disconnected and a
    /// disconnect signal is emitted.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The poll task was started
    /// - `Err(Error::Config)`: The config was rejected
    pub async fn connect(&self, config: ConnectionConfig) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner, "reconnecting").await;
        self.start_locked(&mut inner, config)
    }

    /// Stop polling
    ///
    /// Idempotent: a second call finds nothing running, stays Disconnected
    /// and emits another disconnect signal.
    pub async fn disconnect(&self) {
        let reason = "disconnect requested";
        let mut inner = self.inner.lock().await;
        if !self.stop_locked(&mut inner, reason).await {
            self.signal(ConnectionEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    /// Disconnect, then connect with `config`
    ///
    /// Delivery state is keyed by campaign id in the store, so it carries
    /// over to the new connection.
    pub async fn reconfigure(&self, config: ConnectionConfig) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner, "reconfigured").await;
        self.start_locked(&mut inner, config)
    }

    fn start_locked(&self, inner: &mut Inner, config: ConnectionConfig) -> Result<()> {
        inner.state = ConnectionState::Connecting;

        let validated = config.validate().and_then(|_| self.engine.validate());
        let source = match validated.and_then(|_| self.factory.create(&config)) {
            Ok(source) => source,
            Err(e) => {
                warn!("Connection rejected: {}", e);
                inner.state = ConnectionState::Disconnected;
                self.signal(ConnectionEvent::Disconnected {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = ConnectionTask {
            campaign_id: config.campaign_id.clone(),
            interval: config.poll_interval(),
            source,
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            engine: self.engine.clone(),
        };
        let handle = tokio::spawn(task.run(shutdown_rx));

        info!(campaign_id = %config.campaign_id, "Connected");
        inner.running = Some(Running {
            campaign_id: config.campaign_id.clone(),
            shutdown: shutdown_tx,
            handle,
        });
        inner.state = ConnectionState::Connected;
        self.signal(ConnectionEvent::Connected {
            campaign_id: config.campaign_id,
        });
        Ok(())
    }

    /// Stop the running task, if any
    ///
    /// Signals only when a task was stopped; returns whether one was.
    async fn stop_locked(&self, inner: &mut Inner, reason: &str) -> bool {
        let Some(running) = inner.running.take() else {
            inner.state = ConnectionState::Disconnected;
            return false;
        };

        // The task may already be gone; a closed channel is fine
        let _ = running.shutdown.send(());
        if let Err(e) = running.handle.await {
            warn!(campaign_id = %running.campaign_id, "Poll task ended abnormally: {}", e);
        }

        info!(campaign_id = %running.campaign_id, "Disconnected: {}", reason);
        inner.state = ConnectionState::Disconnected;
        self.signal(ConnectionEvent::Disconnected {
            reason: reason.to_string(),
        });
        true
    }

    fn signal(&self, event: ConnectionEvent) {
        if self.signal_tx.try_send(event).is_err() {
            warn!("Connection signal channel full or closed, dropping signal");
        }
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        if let Some(running) = self.inner.get_mut().running.take() {
            let _ = running.shutdown.send(());
        }
    }
}

/// Everything the spawned poll task owns
struct ConnectionTask {
    campaign_id: String,
    interval: Duration,
    source: Arc<dyn DonationSource>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EventSink>,
    engine: EngineConfig,
}

impl ConnectionTask {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let Some(context) = self.load_context(&mut shutdown).await else {
            return;
        };

        let engine = PollEngine::new(
            self.campaign_id,
            context,
            self.source,
            self.store,
            self.sink,
            self.interval,
            &self.engine,
        );

        if let Err(e) = engine.run_with_shutdown(shutdown).await {
            warn!(campaign_id = %engine.campaign_id(), "Failed to flush state: {}", e);
        }
    }

    /// Retry the context load every interval until it resolves
    ///
    /// Returns `None` if shutdown arrives first.
    async fn load_context(&self, shutdown: &mut oneshot::Receiver<()>) -> Option<CampaignContext> {
        let timeout = self.engine.request_timeout();
        let source = self.source.as_ref();
        loop {
            tokio::select! {
                biased;
                _ = &mut *shutdown => return None,
                result = load_campaign_context(source, &self.campaign_id, timeout) => {
                    match result {
                        Ok(context) => return Some(context),
                        Err(e) => warn!(
                            campaign_id = %self.campaign_id,
                            "Campaign context not yet ready, polling deferred: {}",
                            e
                        ),
                    }
                }
            }

            tokio::select! {
                biased;
                _ = &mut *shutdown => return None,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
