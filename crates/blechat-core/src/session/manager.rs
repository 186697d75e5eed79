//! Session manager
//!
//! Owns the single mutation point for the chat session. Every user operation
//! and every transport callback goes through the state mutex, and each
//! transition publishes a fresh [`SessionSnapshot`] on a watch channel.
//!
//! Connect and disconnect are additionally serialized by a lifecycle lock so
//! a teardown can never interleave with a half-finished connection.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::conversation::ConversationLog;
use crate::errors::{BlechatError, BlechatResult};
use crate::history::{HistoryStore, MemoryHistoryStore};
use crate::session::snapshot::SessionSnapshot;
use crate::session::state::{SessionState, SessionStatus};
use crate::transport::{InboundEvent, Transport, TransportKind};
use crate::types::{Device, Message, SystemTimeSource, TimeSource};

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Builder for [`SessionManager`]
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn HistoryStore>>,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl SessionBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            store: None,
            time_source: None,
        }
    }

    /// Persist conversations through `store` (in-memory by default)
    pub fn history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stamp messages using `time_source` (system clock by default)
    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    pub fn build(self) -> SessionManager {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryHistoryStore::new()));
        let time_source = self
            .time_source
            .unwrap_or_else(|| Arc::new(SystemTimeSource::new()));

        let state = SessionState::new(ConversationLog::new(store));
        let (snapshots, _) = watch::channel(state.snapshot());

        SessionManager {
            inner: Arc::new(SessionInner {
                transport: self.transport,
                time_source,
                state: Mutex::new(state),
                lifecycle: Mutex::new(()),
                snapshots,
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

struct SessionInner {
    transport: Arc<dyn Transport>,
    time_source: Arc<dyn TimeSource>,
    state: Mutex<SessionState>,
    lifecycle: Mutex<()>,
    snapshots: watch::Sender<SessionSnapshot>,
}

/// Cloneable handle to the chat session
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Session with an in-memory history store and the system clock
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        SessionBuilder::new(transport).build()
    }

    pub fn builder(transport: Arc<dyn Transport>) -> SessionBuilder {
        SessionBuilder::new(transport)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.inner.transport.kind()
    }

    /// Whether an inbound subscription is currently installed
    pub async fn has_active_subscription(&self) -> bool {
        self.inner.state.lock().await.subscription.is_some()
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Run one scan to completion
    ///
    /// Discovered devices are folded into the snapshot as they arrive. Returns
    /// once the transport finishes the scan, either because its duration
    /// elapsed or because [`SessionManager::stop_scan`] was called.
    pub async fn start_scan(&self) -> BlechatResult<()> {
        let epoch = {
            let mut state = self.inner.state.lock().await;
            state.scan_epoch += 1;
            let epoch = state.scan_epoch;
            state.active_scan = Some(epoch);
            // Restarting cancels whatever scan the transport still runs
            self.inner.transport.stop_scan();
            state.devices.reset();
            state.last_error = None;
            state.status = SessionStatus::Scanning;
            self.inner.publish(&state);
            epoch
        };
        info!("Starting scan #{}", epoch);

        let (found_tx, found_rx) = mpsc::unbounded_channel();
        let fold = tokio::spawn(fold_discoveries(Arc::clone(&self.inner), epoch, found_rx));

        let result = self.inner.transport.start_scan(found_tx).await;
        if let Err(e) = fold.await {
            warn!("Discovery task for scan #{} ended abnormally: {}", epoch, e);
        }

        let mut state = self.inner.state.lock().await;
        if state.active_scan != Some(epoch) {
            // Stopped, or superseded by a newer scan
            debug!("Scan #{} settled after it was no longer active", epoch);
            return result;
        }
        state.active_scan = None;

        match &result {
            Ok(()) => {
                info!("Scan #{} finished with {} devices", epoch, state.devices.len());
                if state.status == SessionStatus::Scanning {
                    state.status = state.resting_status();
                }
            }
            Err(e) => {
                error!("Scan #{} failed: {}", epoch, e);
                state.last_error = Some(e.to_string());
                state.status = SessionStatus::Error;
            }
        }
        self.inner.publish(&state);
        result
    }

    /// Stop the running scan, keeping the devices found so far
    pub async fn stop_scan(&self) {
        let mut state = self.inner.state.lock().await;
        let Some(epoch) = state.active_scan.take() else {
            return;
        };
        self.inner.transport.stop_scan();
        info!("Stopped scan #{}", epoch);

        if state.status == SessionStatus::Scanning {
            state.status = state.resting_status();
        }
        self.inner.publish(&state);
    }

    // ------------------------------------------------------------------------
    // Connection Lifecycle
    // ------------------------------------------------------------------------

    /// Connect to a device, replacing any existing connection
    ///
    /// On success the device's persisted history is loaded and the inbound
    /// listener installed before the session reports `Connected`.
    pub async fn connect_to_device(&self, device_id: &str) -> BlechatResult<Device> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        {
            let mut state = self.inner.state.lock().await;
            if let Some(previous) = state.connected_device.clone() {
                info!("Disconnecting from {} before connecting to {}", previous.id, device_id);
                self.inner.teardown(&mut state).await;
            }
            state.status = SessionStatus::Connecting;
            state.last_error = None;
            self.inner.publish(&state);
        }
        info!("Connecting to {}", device_id);

        let device = match self.inner.transport.connect(device_id).await {
            Ok(device) => device,
            Err(e) => {
                error!("Failed to connect to {}: {}", device_id, e);
                let mut state = self.inner.state.lock().await;
                self.inner.fail(&mut state, &e);
                return Err(e);
            }
        };

        let mut state = self.inner.state.lock().await;
        if let Err(e) = state.conversation.load(&device.id).await {
            error!("Failed to load history for {}: {}", device.id, e);
            self.inner.transport.disconnect().await;
            self.inner.fail(&mut state, &e);
            return Err(e);
        }

        state.connection_epoch += 1;
        let epoch = state.connection_epoch;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let subscription = self.inner.transport.subscribe_inbound(inbound_tx);
        tokio::spawn(pump_inbound(
            Arc::clone(&self.inner),
            epoch,
            device.id.clone(),
            inbound_rx,
        ));

        state.subscription = Some(subscription);
        state.connected_device = Some(device.clone());
        state.status = SessionStatus::Connected;
        self.inner.publish(&state);
        info!("Connected to {} ({})", device.name, device.id);

        Ok(device)
    }

    /// Tear down the connection; safe to call when nothing is connected
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let mut state = self.inner.state.lock().await;

        let previous = state.connected_device.as_ref().map(|d| d.id.clone());
        self.inner.teardown(&mut state).await;
        state.status = SessionStatus::Idle;
        self.inner.publish(&state);

        match previous {
            Some(device_id) => info!("Disconnected from {}", device_id),
            None => debug!("Disconnect requested with no active connection"),
        }
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    /// Send a chat message to the connected device
    ///
    /// Blank text, or text sent while nothing is connected, is ignored and
    /// yields `Ok(None)`. The message is appended locally before the write,
    /// so it stays in the log even when the write fails.
    pub async fn send_message(&self, text: &str) -> BlechatResult<Option<Message>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let message = {
            let mut state = self.inner.state.lock().await;
            let Some(device) = state.connected_device.clone() else {
                debug!("Dropping message, no device connected");
                return Ok(None);
            };

            let timestamp = state
                .conversation
                .next_timestamp(&device.id, self.inner.time_source.now());
            let message = Message::local(text, timestamp);
            if let Err(e) = state.conversation.append(&device.id, message.clone()).await {
                state.last_error = Some(e.to_string());
            }
            self.inner.publish(&state);
            message
        };

        if let Err(e) = self.inner.transport.send_message(text).await {
            error!("Failed to send message: {}", e);
            let mut state = self.inner.state.lock().await;
            state.last_error = Some(e.to_string());
            if state.connected_device.is_some() && state.active_scan.is_none() {
                state.status = SessionStatus::Connected;
            }
            self.inner.publish(&state);
            return Err(e);
        }

        debug!("Sent message {}", message.id);
        Ok(Some(message))
    }

    /// Clear the last error without touching anything else
    pub async fn clear_error(&self) {
        let mut state = self.inner.state.lock().await;
        if state.last_error.take().is_some() {
            self.inner.publish(&state);
        }
    }
}

impl SessionInner {
    fn publish(&self, state: &SessionState) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Release the subscription, then the connection
    async fn teardown(&self, state: &mut SessionState) {
        if let Some(mut subscription) = state.subscription.take() {
            subscription.cancel();
        }
        self.transport.disconnect().await;
        state.connected_device = None;
        state.connection_epoch += 1;
    }

    fn fail(&self, state: &mut SessionState, error: &BlechatError) {
        state.status = SessionStatus::Error;
        state.last_error = Some(error.to_string());
        self.publish(state);
    }
}

// ----------------------------------------------------------------------------
// Background Tasks
// ----------------------------------------------------------------------------

/// Fold discovery events from one scan into the device list
async fn fold_discoveries(
    inner: Arc<SessionInner>,
    epoch: u64,
    mut found: mpsc::UnboundedReceiver<Device>,
) {
    while let Some(device) = found.recv().await {
        let mut state = inner.state.lock().await;
        // Stopped or superseded scans keep reporting until the transport notices
        if state.active_scan != Some(epoch) {
            continue;
        }

        let device_id = device.id.clone();
        if state.devices.observe(device) {
            debug!("Discovered {}", device_id);
        }
        inner.publish(&state);
    }
}

/// Deliver inbound events for one connection until it is torn down
async fn pump_inbound(
    inner: Arc<SessionInner>,
    epoch: u64,
    device_id: String,
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
) {
    while let Some(event) = inbound.recv().await {
        let mut state = inner.state.lock().await;
        if state.connection_epoch != epoch {
            break;
        }

        match event {
            InboundEvent::Notification { device_id: from, text } => {
                if from != device_id {
                    debug!("Ignoring notification from {} while connected to {}", from, device_id);
                    continue;
                }
                if text.trim().is_empty() {
                    continue;
                }

                let timestamp = state
                    .conversation
                    .next_timestamp(&device_id, inner.time_source.now());
                let message = Message::remote(text, timestamp);
                if let Err(e) = state.conversation.append(&device_id, message).await {
                    state.last_error = Some(e.to_string());
                }
            }
            InboundEvent::Fault { reason } => {
                warn!("Connection to {} reported: {}", device_id, reason);
                state.last_error = Some(reason);
            }
        }
        inner.publish(&state);
    }
    debug!("Inbound pump for {} stopped", device_id);
}
