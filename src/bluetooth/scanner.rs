/// Bluetooth Low Energy advertisement source backed by BlueZ
use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bluetooth::subscription::AdvertisementCallback;
use crate::error::ScanError;
use crate::models::RawAdvertisement;

type PropertyEvent = (Address, DeviceProperty);

/// Continuously reports advertisements to a subscribed callback
///
/// Lifecycle: `subscribe`, then `start`; `closed` resolves if discovery
/// ends on its own, `stop` ends it deliberately.
#[derive(Default)]
pub struct BluezScanner {
    callback: Option<Arc<AdvertisementCallback>>,
    task: Option<JoinHandle<ScanError>>,
}

impl BluezScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback invoked once per observed advertisement
    pub fn subscribe(&mut self, callback: AdvertisementCallback) {
        self.callback = Some(Arc::new(callback));
    }

    /// Power on the default adapter and start delivering advertisements
    pub async fn start(&mut self) -> Result<(), ScanError> {
        let callback = self.callback.clone().ok_or(ScanError::NoSubscriber)?;

        // Initialize Bluetooth session
        let session = bluer::Session::new().await.map_err(|e| {
            error!("Failed to create Bluetooth session: {}", e);
            e
        })?;

        // Get the default Bluetooth adapter
        let adapter = session.default_adapter().await.map_err(|e| {
            error!("Failed to get default Bluetooth adapter: {}", e);
            e
        })?;

        // Ensure Bluetooth adapter is powered on
        adapter.set_powered(true).await.map_err(|e| {
            error!("Failed to power on adapter: {}", e);
            e
        })?;

        // Low Energy only; BlueZ reports manufacturer data of every advertisement
        let filter = bluer::DiscoveryFilter {
            transport: bluer::DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        };

        // Apply the discovery filter (warn if it fails, but continue)
        if let Err(e) = adapter.set_discovery_filter(filter).await {
            warn!("Failed to set discovery filter: {}", e);
        }

        let events = adapter.discover_devices().await.map_err(|e| {
            error!("Failed to start device discovery: {}", e);
            e
        })?;

        info!("Started continuous scanning on adapter {}", adapter.name());

        self.task = Some(tokio::spawn(async move {
            // Keep the session alive for as long as discovery runs
            let _session = session;
            forward_advertisements(adapter, events, callback).await
        }));

        Ok(())
    }

    /// Wait until discovery stops on its own and return why
    pub async fn closed(&mut self) -> ScanError {
        let Some(task) = self.task.as_mut() else {
            return ScanError::NotStarted;
        };

        let result = task.await;
        self.task = None;
        result.unwrap_or_else(|e| ScanError::TaskFailed(e.to_string()))
    }

    /// Stop discovery; dropping the event streams ends it on the adapter
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Stopped scanning");
        }
    }
}

/// Watch every discovered device and hand each fresh manufacturer data
/// payload to the callback.
///
/// Only property changes count as advertisements. Values BlueZ already had
/// cached when a device was first seen are never reported.
async fn forward_advertisements(
    adapter: Adapter,
    adapter_events: impl Stream<Item = AdapterEvent>,
    callback: Arc<AdvertisementCallback>,
) -> ScanError {
    let mut adapter_events = Box::pin(adapter_events);
    let (tx, mut rx) = mpsc::unbounded_channel::<PropertyEvent>();
    let mut tracker = DeviceTracker::default();
    let mut watchers = DeviceWatchers::default();

    loop {
        tokio::select! {
            event = adapter_events.next() => match event {
                Some(AdapterEvent::DeviceAdded(address)) if !watchers.contains(address) => {
                    match watch_device(&adapter, address, tx.clone()).await {
                        Ok((name, handle)) => {
                            tracker.watch(address, name);
                            watchers.insert(address, handle);
                        }
                        Err(e) => debug!("Failed to watch {}: {}", address, e),
                    }
                }
                Some(AdapterEvent::DeviceRemoved(address)) => {
                    tracker.forget(address);
                    watchers.remove(address);
                }
                Some(_) => {}
                None => return ScanError::StreamEnded,
            },
            Some((address, property)) = rx.recv() => {
                if let Some(advertisement) = tracker.on_property(address, property) {
                    (*callback)(advertisement);
                }
            }
        }
    }
}

/// Subscribe to a device's property changes and forward them to `tx`
async fn watch_device(
    adapter: &Adapter,
    address: Address,
    tx: mpsc::UnboundedSender<PropertyEvent>,
) -> bluer::Result<(Option<String>, JoinHandle<()>)> {
    let device = adapter.device(address)?;
    // Subscribe before reading the name so a rename in between is not missed
    let events = device.events().await?;
    let name = device.name().await?;

    let handle = tokio::spawn(async move {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            let DeviceEvent::PropertyChanged(property) = event;
            if tx.send((address, property)).is_err() {
                break;
            }
        }
    });

    Ok((name, handle))
}

/// Names of the devices being watched, used to label their advertisements
#[derive(Debug, Default)]
pub struct DeviceTracker {
    names: HashMap<Address, Option<String>>,
}

impl DeviceTracker {
    pub fn watch(&mut self, address: Address, name: Option<String>) {
        self.names.insert(address, name);
    }

    pub fn forget(&mut self, address: Address) {
        self.names.remove(&address);
    }

    /// Apply one property change; manufacturer data from a watched, named
    /// device becomes an advertisement.
    pub fn on_property(
        &mut self,
        address: Address,
        property: DeviceProperty,
    ) -> Option<RawAdvertisement> {
        match property {
            DeviceProperty::Name(name) => {
                if let Some(slot) = self.names.get_mut(&address) {
                    *slot = Some(name);
                }
                None
            }
            DeviceProperty::ManufacturerData(manufacturer_data) => {
                let device_name = self.names.get(&address)?.clone()?;
                Some(RawAdvertisement {
                    device_name,
                    device_address: address.to_string().to_uppercase(),
                    manufacturer_data,
                })
            }
            _ => None,
        }
    }
}

/// Per-device watcher tasks, aborted when removed or dropped
#[derive(Default)]
struct DeviceWatchers {
    handles: HashMap<Address, JoinHandle<()>>,
}

impl DeviceWatchers {
    fn contains(&self, address: Address) -> bool {
        self.handles.contains_key(&address)
    }

    fn insert(&mut self, address: Address, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.insert(address, handle) {
            previous.abort();
        }
    }

    fn remove(&mut self, address: Address) {
        if let Some(handle) = self.handles.remove(&address) {
            handle.abort();
        }
    }
}

impl Drop for DeviceWatchers {
    fn drop(&mut self) {
        for handle in self.handles.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: Address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    fn manufacturer_data(payload: &[u8]) -> DeviceProperty {
        DeviceProperty::ManufacturerData(HashMap::from([(0x0499, payload.to_vec())]))
    }

    #[test]
    fn manufacturer_data_change_is_one_advertisement() {
        let mut tracker = DeviceTracker::default();
        tracker.watch(ADDRESS, Some("Ruuvi 524A".to_string()));

        let advertisement = tracker.on_property(ADDRESS, manufacturer_data(&[0x05, 0x01])).unwrap();

        assert_eq!(advertisement.device_name, "Ruuvi 524A");
        assert_eq!(advertisement.device_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(advertisement.manufacturer_data[&0x0499], vec![0x05, 0x01]);
    }

    #[test]
    fn other_property_changes_are_not_advertisements() {
        let mut tracker = DeviceTracker::default();
        tracker.watch(ADDRESS, Some("Ruuvi 524A".to_string()));

        assert!(tracker.on_property(ADDRESS, DeviceProperty::Rssi(-70)).is_none());
        assert!(tracker.on_property(ADDRESS, DeviceProperty::TxPower(4)).is_none());
    }

    #[test]
    fn unknown_or_forgotten_devices_are_ignored() {
        let mut tracker = DeviceTracker::default();
        assert!(tracker.on_property(ADDRESS, manufacturer_data(&[0x05])).is_none());

        tracker.watch(ADDRESS, Some("Ruuvi 524A".to_string()));
        tracker.forget(ADDRESS);
        assert!(tracker.on_property(ADDRESS, manufacturer_data(&[0x05])).is_none());
    }

    #[test]
    fn name_learned_after_watch_labels_later_data() {
        let mut tracker = DeviceTracker::default();
        tracker.watch(ADDRESS, None);

        assert!(tracker.on_property(ADDRESS, manufacturer_data(&[0x05])).is_none());
        assert!(tracker
            .on_property(ADDRESS, DeviceProperty::Name("Ruuvi 524A".to_string()))
            .is_none());

        let advertisement = tracker.on_property(ADDRESS, manufacturer_data(&[0x05])).unwrap();
        assert_eq!(advertisement.device_name, "Ruuvi 524A");
    }
}
