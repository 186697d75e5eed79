//! BLE adapter bootstrap and device scanning

use std::collections::HashMap;
use std::sync::Mutex;

use blechat_core::{BlechatError, BlechatResult, Device, DeviceSender};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use tokio::sync::{oneshot, OnceCell};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::BleTransportConfig;
use crate::error::BleTransportError;

/// Why a scan loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    Elapsed,
    Stopped,
}

// ----------------------------------------------------------------------------
// Discovery Implementation
// ----------------------------------------------------------------------------

/// Owns the adapter and remembers which peripheral each device id refers to
pub struct BleDiscovery {
    config: BleTransportConfig,
    adapter: OnceCell<Adapter>,
    known: Mutex<HashMap<String, PeripheralId>>,
}

impl BleDiscovery {
    pub fn new(config: BleTransportConfig) -> Self {
        Self {
            config,
            adapter: OnceCell::new(),
            known: Mutex::new(HashMap::new()),
        }
    }

    /// First BLE adapter, initialized on first use
    pub async fn adapter(&self) -> BlechatResult<&Adapter> {
        self.adapter
            .get_or_try_init(|| async {
                let manager = Manager::new().await.map_err(BleTransportError::from)?;
                let adapters = manager.adapters().await.map_err(BleTransportError::from)?;
                let adapter = adapters
                    .into_iter()
                    .next()
                    .ok_or(BleTransportError::AdapterNotAvailable)?;
                info!("BLE adapter initialized");
                Ok::<_, BleTransportError>(adapter)
            })
            .await
            .map_err(BlechatError::from)
    }

    /// Scan until the configured duration elapses or `stop` fires
    ///
    /// Each peripheral is reported once when first seen and again whenever
    /// its signal strength changes.
    pub async fn scan(
        &self,
        on_found: &DeviceSender,
        mut stop: oneshot::Receiver<()>,
    ) -> BlechatResult<ScanEnd> {
        let adapter = self.adapter().await?;
        let mut events = adapter
            .events()
            .await
            .map_err(|e| BleTransportError::EventStreamFailed(e.to_string()))?;

        adapter
            .start_scan(ScanFilter {
                services: self.config.scan_services(),
            })
            .await
            .map_err(BleTransportError::from)?;
        info!("Started BLE scan");

        let deadline = Instant::now() + self.config.scan_duration();
        let mut last_rssi: HashMap<String, Option<i16>> = HashMap::new();
        let end = loop {
            tokio::select! {
                _ = sleep_until(deadline) => break ScanEnd::Elapsed,
                _ = &mut stop => break ScanEnd::Stopped,
                event = events.next() => {
                    let id = match event {
                        Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => id,
                        Some(_) => continue,
                        None => {
                            warn!("BLE event stream ended during scan");
                            break ScanEnd::Elapsed;
                        }
                    };

                    let Some(device) = self.describe(adapter, &id).await else {
                        continue;
                    };
                    if last_rssi.get(&device.id) == Some(&device.signal_strength) {
                        continue;
                    }
                    last_rssi.insert(device.id.clone(), device.signal_strength);
                    debug!("Scan reported {}", device);
                    if on_found.send(device).is_err() {
                        debug!("Discovery receiver dropped");
                    }
                }
            }
        };

        if let Err(e) = adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }
        info!("BLE scan ended ({:?}), {} devices seen", end, last_rssi.len());
        Ok(end)
    }

    /// Resolve a device id to a peripheral on the adapter
    pub async fn peripheral(&self, device_id: &str) -> BlechatResult<Peripheral> {
        let adapter = self.adapter().await?;
        let known = lock(&self.known).get(device_id).cloned();
        if let Some(id) = known {
            if let Ok(peripheral) = adapter.peripheral(&id).await {
                return Ok(peripheral);
            }
        }

        // Fall back to everything the adapter has cached
        let peripherals = adapter.peripherals().await.map_err(BleTransportError::from)?;
        peripherals
            .into_iter()
            .find(|peripheral| device_id_of(peripheral) == device_id)
            .ok_or_else(|| BlechatError::not_found(device_id))
    }

    async fn describe(&self, adapter: &Adapter, id: &PeripheralId) -> Option<Device> {
        let peripheral = adapter.peripheral(id).await.ok()?;
        let device = describe_peripheral(&peripheral).await;
        lock(&self.known).insert(device.id.clone(), id.clone());
        Some(device)
    }
}

/// Device record for a peripheral from its advertised properties
pub async fn describe_peripheral(peripheral: &Peripheral) -> Device {
    let (name, rssi) = match peripheral.properties().await.ok().flatten() {
        Some(props) => (props.local_name, props.rssi),
        None => (None, None),
    };
    Device::new(
        device_id_of(peripheral),
        name.unwrap_or_else(|| Device::UNKNOWN_NAME.to_string()),
        rssi,
    )
}

/// Stable identifier for a peripheral
///
/// Uses the Bluetooth address where the platform exposes one, otherwise the
/// platform peripheral id.
pub fn device_id_of(peripheral: &Peripheral) -> String {
    let address = peripheral.address();
    if address.into_inner().iter().any(|byte| *byte != 0) {
        address.to_string()
    } else {
        format!("{:?}", peripheral.id())
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
