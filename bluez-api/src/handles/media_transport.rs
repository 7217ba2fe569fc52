use serde_json::Value;

use crate::error::Result;
use crate::macros::define_interface_handle;

define_interface_handle! {
    /// Media stream endpoint (`org.bluez.MediaTransport1`)
    handle: MediaTransport,
    interface: MediaTransport,
    methods: {
        release: "Release",
    },
    read_only: {
        codec: "Codec",
        configuration: "Configuration",
        device: "Device",
        state: "State",
        uuid: "UUID",
    },
    read_write: {
        delay: "Delay",
        volume: "Volume",
    },
}

impl MediaTransport {
    /// Acquire the transport; the reply carries `(fd, read_mtu, write_mtu)`
    pub async fn acquire(&self) -> Result<Value> {
        self.proxy.call("Acquire", Vec::new()).await
    }

    /// Acquire only if the transport is already pending
    pub async fn try_acquire(&self) -> Result<Value> {
        self.proxy.call("TryAcquire", Vec::new()).await
    }
}
