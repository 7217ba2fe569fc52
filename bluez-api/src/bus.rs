//! The client boundary to the bus transport
//!
//! The tracker never talks to a connection directly. Everything it needs
//! from the bus (enumeration, the three signal families and per-interface
//! RPC) goes through [`BusClient`]. Signals are not delivered by callbacks:
//! a transport pushes them into the [`SignalSink`] it was handed when the
//! subscription was made.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::path::{InterfaceMap, ManagedObjects, ObjectPath, PropertyMap};

/// A raw notification as delivered by the bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusSignal {
    /// `InterfacesAdded(path, interfacesAndProperties)`
    InterfacesAdded {
        path: ObjectPath,
        interfaces: InterfaceMap,
    },
    /// `InterfacesRemoved(path, interfaceNames[])`
    InterfacesRemoved {
        path: ObjectPath,
        interfaces: Vec<String>,
    },
    /// `PropertiesChanged(interfaceName, changed, invalidated[])`
    ///
    /// The bus signal itself names only the interface. `origin` is the path
    /// the subscription was made for, threaded through by the subscriber.
    PropertiesChanged {
        origin: Option<ObjectPath>,
        interface: String,
        changed: PropertyMap,
        invalidated: Vec<String>,
    },
}

impl BusSignal {
    /// Short name of the signal family, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            BusSignal::InterfacesAdded { .. } => "InterfacesAdded",
            BusSignal::InterfacesRemoved { .. } => "InterfacesRemoved",
            BusSignal::PropertiesChanged { .. } => "PropertiesChanged",
        }
    }
}

/// Where a transport delivers the signals of one subscription
///
/// Cloning is cheap; all clones feed the same queue. The optional origin is
/// stamped onto every PropertiesChanged pushed through this sink.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<BusSignal>,
    origin: Option<ObjectPath>,
}

impl SignalSink {
    pub fn new(tx: mpsc::UnboundedSender<BusSignal>) -> Self {
        Self { tx, origin: None }
    }

    /// A sink feeding the same queue that tags PropertiesChanged with `origin`
    pub fn with_origin(&self, origin: ObjectPath) -> Self {
        Self {
            tx: self.tx.clone(),
            origin: Some(origin),
        }
    }

    pub fn origin(&self) -> Option<&ObjectPath> {
        self.origin.as_ref()
    }

    /// Returns `false` once the receiving side is gone
    pub fn interfaces_added(&self, path: ObjectPath, interfaces: InterfaceMap) -> bool {
        self.send(BusSignal::InterfacesAdded { path, interfaces })
    }

    pub fn interfaces_removed(&self, path: ObjectPath, interfaces: Vec<String>) -> bool {
        self.send(BusSignal::InterfacesRemoved { path, interfaces })
    }

    pub fn properties_changed(
        &self,
        interface: impl Into<String>,
        changed: PropertyMap,
        invalidated: Vec<String>,
    ) -> bool {
        self.send(BusSignal::PropertiesChanged {
            origin: self.origin.clone(),
            interface: interface.into(),
            changed,
            invalidated,
        })
    }

    /// Push a signal as-is
    pub fn send(&self, signal: BusSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Which signal family a subscription listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Root InterfacesAdded/InterfacesRemoved
    ObjectManager,
    /// InterfacesAdded below one object
    InterfacesAdded,
    /// PropertiesChanged on one object
    PropertiesChanged,
}

/// An owned, live signal subscription
///
/// Dropping the value releases the subscription on the bus.
pub trait Subscription: Send + Sync {
    /// Path the subscription is scoped to
    fn path(&self) -> &ObjectPath;

    /// Signal family
    fn kind(&self) -> SubscriptionKind;
}

impl std::fmt::Debug for dyn Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", self.path())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Operations the tracker consumes from the bus
///
/// Implementations own the connection, marshalling and match rules. All
/// methods are single round trips; none of them retry.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// ObjectManager enumeration of every exported object
    async fn managed_objects(&self) -> Result<ManagedObjects>;

    /// Subscribe to root InterfacesAdded/InterfacesRemoved
    async fn subscribe_object_manager(&self, sink: SignalSink) -> Result<Box<dyn Subscription>>;

    /// Subscribe to InterfacesAdded for objects nested below `path`
    async fn subscribe_interfaces_added(
        &self,
        path: &ObjectPath,
        sink: SignalSink,
    ) -> Result<Box<dyn Subscription>>;

    /// Subscribe to PropertiesChanged on the object at `path`
    async fn subscribe_properties_changed(
        &self,
        path: &ObjectPath,
        sink: SignalSink,
    ) -> Result<Box<dyn Subscription>>;

    /// Confirm the object at `path` exports `interface`
    async fn lookup_interface(&self, path: &ObjectPath, interface: &str) -> Result<()>;

    /// Invoke `interface.method(args)` on the object at `path`
    async fn call_method(
        &self,
        path: &ObjectPath,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value>;

    async fn get_property(&self, path: &ObjectPath, interface: &str, name: &str) -> Result<Value>;

    async fn get_all_properties(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap>;

    async fn set_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: Value,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_threads_origin_into_properties_changed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(tx);
        let origin = ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0");

        let tagged = sink.with_origin(origin.clone());
        assert!(tagged.properties_changed("org.bluez.MediaPlayer1", PropertyMap::new(), vec![]));
        assert!(sink.properties_changed("org.bluez.Device1", PropertyMap::new(), vec![]));

        match rx.try_recv().unwrap() {
            BusSignal::PropertiesChanged { origin: got, interface, .. } => {
                assert_eq!(got, Some(origin));
                assert_eq!(interface, "org.bluez.MediaPlayer1");
            }
            other => panic!("unexpected signal {:?}", other),
        }
        match rx.try_recv().unwrap() {
            BusSignal::PropertiesChanged { origin, .. } => assert_eq!(origin, None),
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[test]
    fn test_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(tx);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.interfaces_removed(ObjectPath::new("/org/bluez/hci0"), vec![]));
    }
}
