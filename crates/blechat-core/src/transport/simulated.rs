//! Simulated transport for interactive testing without hardware
//!
//! Reproduces the transport contract with synthetic devices: discoveries are
//! spaced by the discovery interval, every sent message is echoed back after
//! the echo delay, and a periodic ping notification arrives while connected.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::SimulatorConfig;
use crate::errors::{BlechatError, BlechatResult};
use crate::permissions::{AlwaysGranted, PermissionGate};
use crate::transport::{
    DeviceSender, InboundEvent, InboundSender, ListenerSlot, Subscription, Transport,
    TransportKind,
};
use crate::types::{Device, Timestamp};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ----------------------------------------------------------------------------
// Simulated Transport
// ----------------------------------------------------------------------------

/// Transport backed by synthetic devices
pub struct SimulatedTransport {
    config: SimulatorConfig,
    permissions: Arc<dyn PermissionGate>,
    shared: Arc<Shared>,
}

/// State shared with the echo and heartbeat tasks
struct Shared {
    connected: Mutex<Option<Device>>,
    scan: Mutex<Option<(u64, oneshot::Sender<()>)>>,
    scan_generation: AtomicU64,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    listeners: ListenerSlot<InboundEvent>,
    fail_writes: AtomicBool,
}

impl Shared {
    fn connected_device(&self) -> Option<Device> {
        lock(&self.connected).clone()
    }

    fn is_connected_to(&self, device_id: &str) -> bool {
        lock(&self.connected)
            .as_ref()
            .is_some_and(|device| device.id == device_id)
    }

    fn notify(&self, device_id: &str, text: String) -> bool {
        if !self.is_connected_to(device_id) {
            return false;
        }
        self.listeners.emit(InboundEvent::Notification {
            device_id: device_id.to_string(),
            text,
        })
    }

    fn stop_heartbeat(&self) {
        if let Some(handle) = lock(&self.heartbeat).take() {
            handle.abort();
        }
    }

    /// Clear the scan handle if it still belongs to `generation`
    fn finish_scan(&self, generation: u64) {
        let mut scan = lock(&self.scan);
        if matches!(&*scan, Some((current, _)) if *current == generation) {
            *scan = None;
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl SimulatedTransport {
    /// Create a simulated transport that is always granted access
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_permissions(config, Arc::new(AlwaysGranted))
    }

    /// Create a simulated transport with a custom permission gate
    pub fn with_permissions(config: SimulatorConfig, permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            config,
            permissions,
            shared: Arc::new(Shared {
                connected: Mutex::new(None),
                scan: Mutex::new(None),
                scan_generation: AtomicU64::new(0),
                heartbeat: Mutex::new(None),
                listeners: ListenerSlot::new(),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Make every subsequent write fail until switched off again
    pub fn set_write_failure(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Push a notification from the connected device
    ///
    /// Returns `false` if nothing is connected or no listener is installed.
    pub fn inject_notification(&self, text: impl Into<String>) -> bool {
        match self.shared.connected_device() {
            Some(device) => self.shared.notify(&device.id, text.into()),
            None => false,
        }
    }

    /// Report a failure on the established connection
    pub fn inject_fault(&self, reason: impl Into<String>) -> bool {
        if self.shared.connected_device().is_none() {
            return false;
        }
        self.shared.listeners.emit(InboundEvent::Fault {
            reason: reason.into(),
        })
    }

    fn start_heartbeat(&self, device: &Device) {
        self.shared.stop_heartbeat();
        let Some(period) = self.config.ping_interval() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let device = device.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if !shared.is_connected_to(&device.id) {
                    break;
                }
                let text = format!("{} ping @ {}", device.name, Timestamp::now().clock_time());
                shared.notify(&device.id, text);
            }
        });
        *lock(&self.shared.heartbeat) = Some(handle);
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn start_scan(&self, on_found: DeviceSender) -> BlechatResult<()> {
        if !self.permissions.request_access().await {
            return Err(BlechatError::PermissionDenied);
        }

        self.stop_scan();
        let generation = self.shared.scan_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, mut stop_rx) = oneshot::channel();
        *lock(&self.shared.scan) = Some((generation, stop_tx));

        info!("Simulated scan started");
        let started = Instant::now();
        let deadline = started + self.config.scan_duration();
        let mut seen = HashSet::new();

        for (index, device) in self.config.devices.iter().enumerate() {
            let at = started + self.config.discovery_interval() * index as u32;
            if at >= deadline {
                break;
            }
            tokio::select! {
                _ = sleep_until(at) => {}
                _ = &mut stop_rx => {
                    debug!("Simulated scan stopped early");
                    return Ok(());
                }
            }
            if seen.insert(device.id.clone()) && on_found.send(device.clone()).is_err() {
                debug!("Discovery receiver dropped");
            }
        }

        tokio::select! {
            _ = sleep_until(deadline) => {}
            _ = &mut stop_rx => {
                debug!("Simulated scan stopped early");
                return Ok(());
            }
        }

        self.shared.finish_scan(generation);
        info!("Simulated scan finished, {} devices seen", seen.len());
        Ok(())
    }

    fn stop_scan(&self) {
        if let Some((_, stop)) = lock(&self.shared.scan).take() {
            // The scan may have just finished on its own
            let _ = stop.send(());
        }
    }

    async fn connect(&self, device_id: &str) -> BlechatResult<Device> {
        if !self.permissions.request_access().await {
            return Err(BlechatError::PermissionDenied);
        }

        let device = self
            .config
            .devices
            .iter()
            .find(|device| device.id == device_id)
            .cloned()
            .ok_or_else(|| BlechatError::not_found(device_id))?;

        if self.config.unresponsive_devices.iter().any(|id| id == device_id) {
            let timeout = self.config.connect_timeout();
            sleep(timeout).await;
            warn!("Simulated connection to {} timed out", device_id);
            return Err(BlechatError::timeout(timeout));
        }

        if let Some(previous) = lock(&self.shared.connected).replace(device.clone()) {
            warn!("Replacing simulated connection to {} without disconnect", previous.id);
        }
        self.start_heartbeat(&device);
        info!("Simulated connection established to {}", device.id);
        Ok(device)
    }

    async fn disconnect(&self) {
        self.shared.stop_heartbeat();
        self.shared.listeners.clear();
        if let Some(device) = lock(&self.shared.connected).take() {
            info!("Simulated connection to {} closed", device.id);
        }
    }

    async fn send_message(&self, text: &str) -> BlechatResult<()> {
        let device = self
            .shared
            .connected_device()
            .ok_or(BlechatError::NotConnected)?;

        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(BlechatError::transport("Simulated write failure"));
        }

        debug!("Simulated write of {} bytes to {}", text.len(), device.id);
        let shared = Arc::clone(&self.shared);
        let delay = self.config.echo_delay();
        let reply = format!("Echo: {}", text);
        tokio::spawn(async move {
            sleep(delay).await;
            shared.notify(&device.id, reply);
        });
        Ok(())
    }

    fn subscribe_inbound(&self, listener: InboundSender) -> Subscription {
        self.shared.listeners.install(listener)
    }

    fn current_connection(&self) -> Option<Device> {
        self.shared.connected_device()
    }

    fn is_scanning(&self) -> bool {
        lock(&self.shared.scan).is_some()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Simulated
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        self.shared.stop_heartbeat();
    }
}
