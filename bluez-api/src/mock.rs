//! In-memory bus for tests
//!
//! `MockBus` keeps an object table, records every method call, counts
//! lookups and subscriptions, and lets a test push signals into whatever
//! sinks the code under test has subscribed with. Subscribe methods yield
//! to the scheduler once before completing so concurrent acquisitions
//! actually interleave.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::bus::{BusClient, SignalSink, Subscription, SubscriptionKind};
use crate::error::{ApiError, Result};
use crate::path::{InterfaceMap, ManagedObjects, ObjectPath, PropertyMap};

/// One recorded `call_method` invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: ObjectPath,
    pub interface: String,
    pub method: String,
    pub args: Vec<Value>,
}

struct SinkEntry {
    id: u64,
    path: ObjectPath,
    kind: SubscriptionKind,
    sink: SignalSink,
}

#[derive(Default)]
struct MockState {
    objects: ManagedObjects,
    properties: HashMap<(ObjectPath, String), PropertyMap>,
    calls: Vec<RecordedCall>,
    sinks: Vec<SinkEntry>,
    subscriptions_per_path: HashMap<(ObjectPath, SubscriptionKind), usize>,
    failing_methods: HashMap<String, String>,
}

/// Scriptable [`BusClient`] implementation
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
    next_id: AtomicU64,
    lookups: AtomicUsize,
    property_subscriptions: AtomicUsize,
    child_subscriptions: AtomicUsize,
    active: Arc<AtomicUsize>,
    fail_lookup: AtomicBool,
    fail_subscriptions: AtomicBool,
    gate: watch::Sender<bool>,
}

impl MockBus {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            next_id: AtomicU64::new(1),
            lookups: AtomicUsize::new(0),
            property_subscriptions: AtomicUsize::new(0),
            child_subscriptions: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            fail_lookup: AtomicBool::new(false),
            fail_subscriptions: AtomicBool::new(false),
            gate,
        }
    }

    /// Export an object without signalling it
    pub fn insert_object(&self, path: impl Into<ObjectPath>, interfaces: InterfaceMap) {
        let path = path.into();
        let mut state = self.state.lock();
        for (iface, props) in &interfaces {
            state
                .properties
                .entry((path.clone(), iface.clone()))
                .or_default()
                .extend(props.clone());
        }
        state.objects.entry(path).or_default().extend(interfaces);
    }

    /// Seed a property value read back by `get_property`
    pub fn set_property_value(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: Value,
    ) {
        self.state
            .lock()
            .properties
            .entry((path.clone(), interface.to_string()))
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Export `interfaces` at `path` and announce them on every root sink
    pub fn emit_interfaces_added(&self, path: impl Into<ObjectPath>, interfaces: InterfaceMap) {
        let path = path.into();
        self.insert_object(path.clone(), interfaces.clone());
        let state = self.state.lock();
        for entry in state
            .sinks
            .iter()
            .filter(|e| e.kind == SubscriptionKind::ObjectManager)
        {
            entry.sink.interfaces_added(path.clone(), interfaces.clone());
        }
    }

    /// Announce `interfaces` at `path` through the nested subscriptions of `parent`
    pub fn emit_child_added(
        &self,
        parent: &ObjectPath,
        path: impl Into<ObjectPath>,
        interfaces: InterfaceMap,
    ) {
        let path = path.into();
        self.insert_object(path.clone(), interfaces.clone());
        let state = self.state.lock();
        for entry in state
            .sinks
            .iter()
            .filter(|e| e.kind == SubscriptionKind::InterfacesAdded && &e.path == parent)
        {
            entry.sink.interfaces_added(path.clone(), interfaces.clone());
        }
    }

    /// Withdraw `interfaces` at `path` and announce it on every root sink
    pub fn emit_interfaces_removed(&self, path: impl Into<ObjectPath>, interfaces: Vec<String>) {
        let path = path.into();
        let mut state = self.state.lock();
        if let Some(exported) = state.objects.get_mut(&path) {
            for iface in &interfaces {
                exported.remove(iface);
            }
            if exported.is_empty() {
                state.objects.remove(&path);
            }
        }
        for entry in state
            .sinks
            .iter()
            .filter(|e| e.kind == SubscriptionKind::ObjectManager)
        {
            entry.sink.interfaces_removed(path.clone(), interfaces.clone());
        }
    }

    /// Deliver PropertiesChanged to every sink subscribed on `path`
    ///
    /// Returns how many sinks received it.
    pub fn emit_properties_changed(
        &self,
        path: &ObjectPath,
        interface: &str,
        changed: PropertyMap,
        invalidated: Vec<String>,
    ) -> usize {
        let state = self.state.lock();
        state
            .sinks
            .iter()
            .filter(|e| e.kind == SubscriptionKind::PropertiesChanged && &e.path == path)
            .filter(|e| e.sink.properties_changed(interface, changed.clone(), invalidated.clone()))
            .count()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Make every subsequent call to `method` fail with `message`
    pub fn fail_method(&self, method: &str, message: &str) {
        self.state
            .lock()
            .failing_methods
            .insert(method.to_string(), message.to_string());
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    /// Hold every subscribe call until [`MockBus::resume_subscriptions`]
    pub fn pause_subscriptions(&self) {
        self.gate.send_replace(true);
    }

    pub fn resume_subscriptions(&self) {
        self.gate.send_replace(false);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// PropertiesChanged subscriptions ever made
    pub fn property_subscription_count(&self) -> usize {
        self.property_subscriptions.load(Ordering::SeqCst)
    }

    /// Nested InterfacesAdded subscriptions ever made
    pub fn child_subscription_count(&self) -> usize {
        self.child_subscriptions.load(Ordering::SeqCst)
    }

    /// Subscriptions currently alive
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Subscriptions ever made on `path` for one signal family
    pub fn subscriptions_for(&self, path: &ObjectPath, kind: SubscriptionKind) -> usize {
        self.state
            .lock()
            .subscriptions_per_path
            .get(&(path.clone(), kind))
            .copied()
            .unwrap_or(0)
    }

    async fn subscribe(
        &self,
        path: ObjectPath,
        kind: SubscriptionKind,
        sink: SignalSink,
    ) -> Result<Box<dyn Subscription>> {
        let mut gate = self.gate.subscribe();
        gate.wait_for(|paused| !*paused)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        tokio::task::yield_now().await;

        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(ApiError::Subscription(format!(
                "match rule rejected for {}",
                path
            )));
        }

        match kind {
            SubscriptionKind::PropertiesChanged => {
                self.property_subscriptions.fetch_add(1, Ordering::SeqCst);
            }
            SubscriptionKind::InterfacesAdded => {
                self.child_subscriptions.fetch_add(1, Ordering::SeqCst);
            }
            SubscriptionKind::ObjectManager => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            *state
                .subscriptions_per_path
                .entry((path.clone(), kind))
                .or_insert(0) += 1;
            state.sinks.push(SinkEntry {
                id,
                path: path.clone(),
                kind,
                sink,
            });
        }
        self.active.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockSubscription {
            id,
            path,
            kind,
            state: Arc::clone(&self.state),
            active: Arc::clone(&self.active),
        }))
    }

    fn check_method(&self, interface: &str, method: &str) -> Result<()> {
        match self.state.lock().failing_methods.get(method) {
            Some(message) => Err(ApiError::method_call(interface, method, message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusClient for MockBus {
    async fn managed_objects(&self) -> Result<ManagedObjects> {
        self.check_method(crate::interface::OBJECT_MANAGER, "GetManagedObjects")?;
        Ok(self.state.lock().objects.clone())
    }

    async fn subscribe_object_manager(&self, sink: SignalSink) -> Result<Box<dyn Subscription>> {
        self.subscribe(ObjectPath::root(), SubscriptionKind::ObjectManager, sink)
            .await
    }

    async fn subscribe_interfaces_added(
        &self,
        path: &ObjectPath,
        sink: SignalSink,
    ) -> Result<Box<dyn Subscription>> {
        self.subscribe(path.clone(), SubscriptionKind::InterfacesAdded, sink)
            .await
    }

    async fn subscribe_properties_changed(
        &self,
        path: &ObjectPath,
        sink: SignalSink,
    ) -> Result<Box<dyn Subscription>> {
        self.subscribe(path.clone(), SubscriptionKind::PropertiesChanged, sink)
            .await
    }

    async fn lookup_interface(&self, path: &ObjectPath, interface: &str) -> Result<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(ApiError::Transport(format!("introspection of {} failed", path)));
        }

        let state = self.state.lock();
        match state.objects.get(path) {
            Some(interfaces) if interfaces.contains_key(interface) => Ok(()),
            _ => Err(ApiError::InterfaceNotFound {
                path: path.clone(),
                interface: interface.to_string(),
            }),
        }
    }

    async fn call_method(
        &self,
        path: &ObjectPath,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.state.lock().calls.push(RecordedCall {
            path: path.clone(),
            interface: interface.to_string(),
            method: method.to_string(),
            args,
        });
        self.check_method(interface, method)?;
        Ok(Value::Null)
    }

    async fn get_property(&self, path: &ObjectPath, interface: &str, name: &str) -> Result<Value> {
        self.state
            .lock()
            .properties
            .get(&(path.clone(), interface.to_string()))
            .and_then(|props| props.get(name))
            .cloned()
            .ok_or_else(|| {
                ApiError::method_call(
                    crate::interface::PROPERTIES,
                    "Get",
                    format!("No such property '{}' on {}", name, interface),
                )
            })
    }

    async fn get_all_properties(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap> {
        Ok(self
            .state
            .lock()
            .properties
            .get(&(path.clone(), interface.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: Value,
    ) -> Result<()> {
        self.set_property_value(path, interface, name, value);
        Ok(())
    }
}

/// Live subscription handed out by [`MockBus`]
///
/// Dropping it detaches the sink so no further signals are delivered.
struct MockSubscription {
    id: u64,
    path: ObjectPath,
    kind: SubscriptionKind,
    state: Arc<Mutex<MockState>>,
    active: Arc<AtomicUsize>,
}

impl Subscription for MockSubscription {
    fn path(&self) -> &ObjectPath {
        &self.path
    }

    fn kind(&self) -> SubscriptionKind {
        self.kind
    }
}

impl Drop for MockSubscription {
    fn drop(&mut self) {
        self.state.lock().sinks.retain(|e| e.id != self.id);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
