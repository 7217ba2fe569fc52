//! Object/interface pair bound to a bus client

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::bus::BusClient;
use crate::error::Result;
use crate::path::{ObjectPath, PropertyMap};

/// One interface of one remote object
///
/// Every handle type is a thin wrapper around a `Proxy`; cloning shares the
/// underlying bus client.
#[derive(Clone)]
pub struct Proxy {
    bus: Arc<dyn BusClient>,
    path: ObjectPath,
    interface: &'static str,
}

impl Proxy {
    pub fn new(bus: Arc<dyn BusClient>, path: ObjectPath, interface: &'static str) -> Self {
        Self {
            bus,
            path,
            interface,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn bus(&self) -> &Arc<dyn BusClient> {
        &self.bus
    }

    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        tracing::trace!("{} {}.{}", self.path, self.interface, method);
        self.bus
            .call_method(&self.path, self.interface, method, args)
            .await
    }

    pub async fn get_property(&self, name: &str) -> Result<Value> {
        self.bus.get_property(&self.path, self.interface, name).await
    }

    pub async fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.bus
            .set_property(&self.path, self.interface, name, value)
            .await
    }

    pub async fn properties(&self) -> Result<PropertyMap> {
        self.bus.get_all_properties(&self.path, self.interface).await
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("path", &self.path)
            .field("interface", &self.interface)
            .finish()
    }
}
