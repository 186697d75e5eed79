//! BLE transport implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blechat_core::transport::ListenerSlot;
use blechat_core::{
    AlwaysGranted, BlechatError, BlechatResult, Device, DeviceSender, InboundEvent, InboundSender,
    PermissionGate, Subscription, Transport, TransportKind,
};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{info, warn};

use crate::config::BleTransportConfig;
use crate::connection::BleConnection;
use crate::discovery::{describe_peripheral, lock, BleDiscovery, ScanEnd};

// ----------------------------------------------------------------------------
// BLE Transport
// ----------------------------------------------------------------------------

/// Transport backed by the host's first BLE adapter
pub struct BleTransport {
    config: BleTransportConfig,
    permissions: Arc<dyn PermissionGate>,
    discovery: BleDiscovery,
    /// Established link; only touched from async operations
    connection: AsyncMutex<Option<BleConnection>>,
    /// Mirror of the connected device for synchronous queries
    connected: Mutex<Option<Device>>,
    scan: Mutex<Option<(u64, oneshot::Sender<()>)>>,
    scan_generation: AtomicU64,
    listeners: ListenerSlot<InboundEvent>,
}

impl Default for BleTransport {
    fn default() -> Self {
        Self::new(BleTransportConfig::default())
    }
}

impl BleTransport {
    /// Create a BLE transport on platforms without a runtime permission prompt
    pub fn new(config: BleTransportConfig) -> Self {
        Self::with_permissions(config, Arc::new(AlwaysGranted))
    }

    /// Create a BLE transport that asks `permissions` before scan and connect
    pub fn with_permissions(config: BleTransportConfig, permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            discovery: BleDiscovery::new(config.clone()),
            config,
            permissions,
            connection: AsyncMutex::new(None),
            connected: Mutex::new(None),
            scan: Mutex::new(None),
            scan_generation: AtomicU64::new(0),
            listeners: ListenerSlot::new(),
        }
    }

    pub fn config(&self) -> &BleTransportConfig {
        &self.config
    }

    async fn ensure_access(&self) -> BlechatResult<()> {
        if self.permissions.request_access().await {
            Ok(())
        } else {
            warn!("Bluetooth permission denied");
            Err(BlechatError::PermissionDenied)
        }
    }

    fn finish_scan(&self, generation: u64) {
        let mut scan = lock(&self.scan);
        if matches!(&*scan, Some((current, _)) if *current == generation) {
            *scan = None;
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn start_scan(&self, on_found: DeviceSender) -> BlechatResult<()> {
        self.ensure_access().await?;
        self.stop_scan();
        let generation = self.scan_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, stop_rx) = oneshot::channel();
        *lock(&self.scan) = Some((generation, stop_tx));

        let result = self.discovery.scan(&on_found, stop_rx).await;
        self.finish_scan(generation);

        match result? {
            ScanEnd::Elapsed => info!("Scan window elapsed"),
            ScanEnd::Stopped => info!("Scan stopped"),
        }
        Ok(())
    }

    fn stop_scan(&self) {
        if let Some((_, stop)) = lock(&self.scan).take() {
            let _ = stop.send(());
        }
    }

    async fn connect(&self, device_id: &str) -> BlechatResult<Device> {
        self.ensure_access().await?;
        let peripheral = self.discovery.peripheral(device_id).await?;
        let device = describe_peripheral(&peripheral).await;

        let mut connection = self.connection.lock().await;
        if let Some(previous) = connection.take() {
            warn!(
                "Replacing connection to {} without disconnect",
                previous.device().id
            );
            previous.close().await;
        }

        let established =
            BleConnection::establish(device, peripheral, &self.config, self.listeners.clone())
                .await?;
        let device = established.device().clone();
        *connection = Some(established);
        *lock(&self.connected) = Some(device.clone());
        Ok(device)
    }

    async fn disconnect(&self) {
        self.listeners.clear();
        let previous = self.connection.lock().await.take();
        lock(&self.connected).take();
        if let Some(connection) = previous {
            connection.close().await;
        }
    }

    async fn send_message(&self, text: &str) -> BlechatResult<()> {
        let writer = self
            .connection
            .lock()
            .await
            .as_ref()
            .map(BleConnection::writer)
            .ok_or(BlechatError::NotConnected)?;
        writer.send(text).await
    }

    fn subscribe_inbound(&self, listener: InboundSender) -> Subscription {
        self.listeners.install(listener)
    }

    fn current_connection(&self) -> Option<Device> {
        lock(&self.connected).clone()
    }

    fn is_scanning(&self) -> bool {
        lock(&self.scan).is_some()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ble
    }
}
