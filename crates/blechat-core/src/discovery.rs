//! Discovery deduplication
//!
//! Folds raw discovery events into an ordered set of unique devices. The
//! transports keep their own per-scan dedup window, but this is the
//! authoritative guarantee the session relies on.

use std::collections::HashMap;

use crate::types::Device;

// ----------------------------------------------------------------------------
// Discovered Devices
// ----------------------------------------------------------------------------

/// Ordered set of discovered devices keyed by device id
///
/// First-seen order is preserved. Rediscovering a known id refreshes its
/// name and signal strength in place.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredDevices {
    devices: Vec<Device>,
    index: HashMap<String, usize>,
}

impl DiscoveredDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sequence of discovery events into a fresh set
    pub fn fold<I>(events: I) -> Self
    where
        I: IntoIterator<Item = Device>,
    {
        let mut discovered = Self::new();
        for device in events {
            discovered.observe(device);
        }
        discovered
    }

    /// Record a discovery event, returning `true` if the id is new
    pub fn observe(&mut self, device: Device) -> bool {
        match self.index.get(&device.id) {
            Some(&position) => {
                let known = &mut self.devices[position];
                known.name = device.name;
                known.signal_strength = device.signal_strength;
                false
            }
            None => {
                self.index.insert(device.id.clone(), self.devices.len());
                self.devices.push(device);
                true
            }
        }
    }

    /// Forget every device; called exactly when a new scan begins
    pub fn reset(&mut self) {
        self.devices.clear();
        self.index.clear();
    }

    pub fn get(&self, device_id: &str) -> Option<&Device> {
        self.index.get(device_id).map(|&position| &self.devices[position])
    }

    pub fn as_slice(&self) -> &[Device] {
        &self.devices
    }

    pub fn to_vec(&self) -> Vec<Device> {
        self.devices.clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rediscovery_updates_in_place() {
        let discovered = DiscoveredDevices::fold([
            Device::new("A", "Alpha", Some(-55)),
            Device::new("B", "Beta", Some(-63)),
            Device::new("A", "Alpha", Some(-50)),
        ]);

        assert_eq!(
            discovered.as_slice(),
            &[
                Device::new("A", "Alpha", Some(-50)),
                Device::new("B", "Beta", Some(-63)),
            ]
        );
    }

    #[test]
    fn test_observe_reports_new_ids() {
        let mut discovered = DiscoveredDevices::new();
        assert!(discovered.observe(Device::new("A", "Alpha", None)));
        assert!(!discovered.observe(Device::new("A", "Renamed", Some(-40))));
        assert_eq!(discovered.get("A").map(|d| d.name.as_str()), Some("Renamed"));
    }

    #[test]
    fn test_reset_clears_index() {
        let mut discovered = DiscoveredDevices::fold([Device::new("A", "Alpha", None)]);
        discovered.reset();
        assert!(discovered.is_empty());
        assert!(discovered.get("A").is_none());
        assert!(discovered.observe(Device::new("A", "Alpha", None)));
    }
}
