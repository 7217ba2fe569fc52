use serde_json::Value;

use crate::error::Result;
use crate::macros::define_interface_handle;

define_interface_handle! {
    /// Remote device (`org.bluez.Device1`)
    handle: Device,
    interface: Device,
    methods: {
        connect: "Connect",
        disconnect: "Disconnect",
        pair: "Pair",
        cancel_pairing: "CancelPairing",
    },
    read_only: {
        address: "Address",
        address_type: "AddressType",
        name: "Name",
        icon: "Icon",
        class: "Class",
        appearance: "Appearance",
        uuids: "UUIDs",
        paired: "Paired",
        connected: "Connected",
        legacy_pairing: "LegacyPairing",
        modalias: "Modalias",
        rssi: "RSSI",
        tx_power: "TxPower",
        adapter: "Adapter",
        services_resolved: "ServicesResolved",
    },
    read_write: {
        alias: "Alias",
        trusted: "Trusted",
        blocked: "Blocked",
    },
}

impl Device {
    /// Connect a single profile by UUID
    pub async fn connect_profile(&self, uuid: &str) -> Result<()> {
        self.proxy
            .call("ConnectProfile", vec![Value::String(uuid.to_string())])
            .await
            .map(|_| ())
    }

    /// Disconnect a single profile by UUID
    pub async fn disconnect_profile(&self, uuid: &str) -> Result<()> {
        self.proxy
            .call("DisconnectProfile", vec![Value::String(uuid.to_string())])
            .await
            .map(|_| ())
    }
}
