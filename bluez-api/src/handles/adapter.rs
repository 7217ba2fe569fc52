use serde_json::Value;

use crate::error::Result;
use crate::macros::define_interface_handle;
use crate::path::{ObjectPath, PropertyMap};

define_interface_handle! {
    /// Local Bluetooth controller (`org.bluez.Adapter1`)
    handle: Adapter,
    interface: Adapter,
    methods: {
        start_discovery: "StartDiscovery",
        stop_discovery: "StopDiscovery",
    },
    read_only: {
        address: "Address",
        address_type: "AddressType",
        name: "Name",
        class: "Class",
        uuids: "UUIDs",
        discovering: "Discovering",
        modalias: "Modalias",
    },
    read_write: {
        alias: "Alias",
        powered: "Powered",
        discoverable: "Discoverable",
        discoverable_timeout: "DiscoverableTimeout",
        pairable: "Pairable",
        pairable_timeout: "PairableTimeout",
    },
}

impl Adapter {
    /// Remove a remote device and its pairing information
    pub async fn remove_device(&self, device: &ObjectPath) -> Result<()> {
        self.proxy
            .call("RemoveDevice", vec![Value::String(device.to_string())])
            .await
            .map(|_| ())
    }

    /// Restrict discovery results (UUIDs, RSSI, Transport, ...)
    pub async fn set_discovery_filter(&self, filter: PropertyMap) -> Result<()> {
        let filter = serde_json::to_value(filter)
            .map_err(|e| crate::error::ApiError::InvalidParameter(e.to_string()))?;
        self.proxy
            .call("SetDiscoveryFilter", vec![filter])
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_remove_device_passes_path_argument() {
        let bus = Arc::new(MockBus::new());
        let adapter = Adapter::new(bus.clone(), ObjectPath::new("/org/bluez/hci0"));
        let device = ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");

        adapter.remove_device(&device).await.unwrap();

        let calls = bus.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].interface, "org.bluez.Adapter1");
        assert_eq!(calls[0].method, "RemoveDevice");
        assert_eq!(calls[0].args, vec![Value::String(device.to_string())]);
    }

    #[tokio::test]
    async fn test_powered_is_read_write() {
        let bus = Arc::new(MockBus::new());
        let adapter = Adapter::new(bus.clone(), ObjectPath::new("/org/bluez/hci0"));

        adapter.set_powered(Value::Bool(true)).await.unwrap();
        assert_eq!(adapter.powered().await.unwrap(), Value::Bool(true));
    }
}
