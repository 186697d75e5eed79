//! BLE connection management and data transmission

use blechat_core::transport::ListenerSlot;
use blechat_core::{BlechatError, BlechatResult, Device, InboundEvent};
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::stream::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BleTransportConfig;
use crate::error::{from_btleplug, BleTransportError};
use crate::protocol::{decode_notification, encode_message};

// ----------------------------------------------------------------------------
// Connection Management
// ----------------------------------------------------------------------------

/// An established connection with its chat characteristics resolved
pub struct BleConnection {
    device: Device,
    peripheral: Peripheral,
    write_char: Characteristic,
    notify_char: Characteristic,
    max_write_size: usize,
    pump: JoinHandle<()>,
}

impl BleConnection {
    /// Connect, discover services, and start forwarding notifications
    ///
    /// Any failure after the link is up disconnects the peripheral again
    /// before returning.
    pub async fn establish(
        device: Device,
        peripheral: Peripheral,
        config: &BleTransportConfig,
        listeners: ListenerSlot<InboundEvent>,
    ) -> BlechatResult<Self> {
        let connect_timeout = config.connection_timeout();
        match timeout(connect_timeout, peripheral.connect()).await {
            Ok(Ok(())) => info!("Connected to {}", device.id),
            Ok(Err(e)) => {
                error!("Failed to connect to {}: {}", device.id, e);
                return Err(match e {
                    btleplug::Error::DeviceNotFound => BlechatError::not_found(device.id.clone()),
                    other => from_btleplug(other),
                });
            }
            Err(_) => {
                error!("Connection to {} timed out", device.id);
                // The platform may still be trying
                if let Err(e) = peripheral.disconnect().await {
                    debug!("Cancelling timed out connection failed: {}", e);
                }
                return Err(BlechatError::timeout(connect_timeout));
            }
        }

        match Self::attach(device.clone(), peripheral.clone(), config, listeners).await {
            Ok(connection) => Ok(connection),
            Err(e) => {
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    warn!("Failed to disconnect from {}: {}", device.id, disconnect_err);
                }
                Err(e.into())
            }
        }
    }

    async fn attach(
        device: Device,
        peripheral: Peripheral,
        config: &BleTransportConfig,
        listeners: ListenerSlot<InboundEvent>,
    ) -> Result<Self, BleTransportError> {
        peripheral
            .discover_services()
            .await
            .map_err(|e| BleTransportError::ServiceDiscoveryFailed(e.to_string()))?;

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| BleTransportError::CharacteristicNotFound {
                    characteristic: uuid.to_string(),
                })
        };
        let write_char = find(config.write_characteristic)?;
        let notify_char = find(config.notify_characteristic)?;

        peripheral
            .subscribe(&notify_char)
            .await
            .map_err(|e| BleTransportError::SubscriptionFailed(e.to_string()))?;
        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| BleTransportError::SubscriptionFailed(e.to_string()))?;

        let device_id = device.id.clone();
        let notify_uuid = notify_char.uuid;
        let pump = tokio::spawn(async move {
            let mut notifications = notifications;
            while let Some(data) = notifications.next().await {
                if data.uuid != notify_uuid {
                    continue;
                }
                let Some(text) = decode_notification(&data.value) else {
                    continue;
                };
                listeners.emit(InboundEvent::Notification {
                    device_id: device_id.clone(),
                    text,
                });
            }
            warn!("Notification stream for {} ended", device_id);
            listeners.emit(InboundEvent::Fault {
                reason: format!("Connection to {} lost", device_id),
            });
        });

        Ok(Self {
            device,
            peripheral,
            write_char,
            notify_char,
            max_write_size: config.max_write_size,
            pump,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Handle used to write without holding on to the connection
    pub fn writer(&self) -> ConnectionWriter {
        ConnectionWriter {
            device_id: self.device.id.clone(),
            peripheral: self.peripheral.clone(),
            write_char: self.write_char.clone(),
            max_write_size: self.max_write_size,
        }
    }

    /// Stop the notification pump and drop the link; never fails
    pub async fn close(self) {
        self.pump.abort();
        if let Err(e) = self.peripheral.unsubscribe(&self.notify_char).await {
            debug!("Failed to unsubscribe from {}: {}", self.device.id, e);
        }
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("Failed to disconnect from {}: {}", self.device.id, e);
        }
        info!("Disconnected from {}", self.device.id);
    }
}

/// Write side of a connection
pub struct ConnectionWriter {
    device_id: String,
    peripheral: Peripheral,
    write_char: Characteristic,
    max_write_size: usize,
}

impl ConnectionWriter {
    /// Write one message with response
    pub async fn send(&self, text: &str) -> BlechatResult<()> {
        let payload = encode_message(text, self.max_write_size)?;
        self.peripheral
            .write(&self.write_char, &payload, WriteType::WithResponse)
            .await
            .map_err(|e| BleTransportError::WriteFailed(e.to_string()))?;
        debug!("Sent {} bytes to {}", payload.len(), self.device_id);
        Ok(())
    }
}
