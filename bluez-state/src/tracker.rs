//! The tracker: signal ingestion, lazy resolution and registration
//!
//! All three signal families land in one queue. [`Tracker::run`] drains it
//! in order; each signal is applied to the registry synchronously, and the
//! child subscriptions it calls for are acquired concurrently in the same
//! loop so a stalled round trip never holds up later signals.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, trace, warn};

use bluez_api::registration::{self, AVRCP_UUID, SERIAL_PORT_UUID};
use bluez_api::{
    Adapter, AgentCapability, ApiError, BusClient, BusSignal, Device, EntityKey, InterfaceMap,
    Kind, MediaPlayer, MediaTransport, ObjectPath, ProfileOptions, PropertyMap, Role, SignalSink,
    Subscription,
};
use bluez_event_manager::{
    AcquireOutcome, Reservation, SubscriptionKey, SubscriptionManager, SubscriptionStats,
};

use crate::classifier;
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::event::{EventNormalizer, TrackerEvent};
use crate::iter::EventReceiver;
use crate::model::{Entry, EntryState, Resolvable};
use crate::registry::{Materialization, Registry};

/// Kinds whose objects get a child slot (properties + nested added)
pub fn tracks_children(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::MediaControl
            | Kind::MediaTransport
            | Kind::MediaItem
            | Kind::MediaPlayer
            | Kind::Filesystem
    )
}

/// Normalize a human-usable identifier into the key of a `kind` entry
///
/// A full object path is classified for `kind`; anything else is taken as
/// a key, with `:` replaced by `_` (so `AA:BB:CC:DD:EE:FF` works for
/// devices) and a leading `dev_` dropped for devices.
pub fn normalize_id(kind: Kind, id: &str) -> Result<EntityKey> {
    if id.starts_with('/') {
        return classifier::classify_as(&ObjectPath::new(id), kind)
            .ok_or_else(|| TrackerError::not_found(kind, id));
    }

    let id = match kind {
        Kind::Device => id.strip_prefix("dev_").unwrap_or(id),
        _ => id,
    };
    Ok(EntityKey::address(id))
}

/// Client-side view of the BlueZ object tree
pub struct Tracker {
    bus: Arc<dyn BusClient>,
    config: TrackerConfig,
    registry: Mutex<Registry>,
    subscriptions: SubscriptionManager,
    events: mpsc::UnboundedSender<TrackerEvent>,
    signal_tx: mpsc::UnboundedSender<BusSignal>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<BusSignal>>>,
    root_subscription: Mutex<Option<Box<dyn Subscription>>>,
    shutdown: Notify,
}

impl Tracker {
    /// Create a tracker and the receiver for its events
    ///
    /// Nothing touches the bus until [`Tracker::init`].
    pub fn new(bus: Arc<dyn BusClient>, config: TrackerConfig) -> (Self, EventReceiver) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let tracker = Self {
            subscriptions: SubscriptionManager::new(Arc::clone(&bus)),
            bus,
            config,
            registry: Mutex::new(Registry::new()),
            events,
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            root_subscription: Mutex::new(None),
            shutdown: Notify::new(),
        };
        (tracker, EventReceiver::new(events_rx))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<dyn BusClient> {
        &self.bus
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// A sink feeding this tracker's signal queue
    pub fn sink(&self) -> SignalSink {
        SignalSink::new(self.signal_tx.clone())
    }

    /// Subscribe to the root object manager and queue every existing object
    ///
    /// The subscription is made before enumerating, so an object added in
    /// between is seen at least once. Enumerated objects are queued as
    /// InterfacesAdded and go through the same path as live signals.
    ///
    /// Live signals delivered while the enumeration is outstanding are held
    /// back and queued after the snapshot, so a removal the bus reports
    /// during startup is applied after the stale add it supersedes.
    pub async fn init(&self) -> Result<()> {
        self.config.validate()?;

        let (held_tx, mut held_rx) = mpsc::unbounded_channel();
        let subscription = self
            .bus
            .subscribe_object_manager(SignalSink::new(held_tx))
            .await?;
        *self.root_subscription.lock() = Some(subscription);

        let objects = self.bus.managed_objects().await?;
        info!("Enumerated {} objects", objects.len());

        for (path, interfaces) in objects {
            self.enqueue(BusSignal::InterfacesAdded { path, interfaces })?;
        }

        let mut held = 0;
        while let Ok(signal) = held_rx.try_recv() {
            self.enqueue(signal)?;
            held += 1;
        }
        if held > 0 {
            debug!("Queued {} signals received during enumeration", held);
        }

        // Ends when the root subscription drops its sink
        let queue = self.signal_tx.clone();
        tokio::spawn(async move {
            while let Some(signal) = held_rx.recv().await {
                if queue.send(signal).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    /// Push a signal onto the queue drained by [`Tracker::run`]
    pub fn enqueue(&self, signal: BusSignal) -> Result<()> {
        self.signal_tx
            .send(signal)
            .map_err(|_| TrackerError::Bus(ApiError::ChannelClosed))
    }

    /// Process queued signals until [`Tracker::shutdown`]
    ///
    /// Signals are ingested strictly in queue order. Child acquisitions run
    /// concurrently with later signals; failures are logged and leave the
    /// slot free for a later add. Acquisitions still in flight at shutdown
    /// are dropped, withdrawing their reservations; the next run reserves
    /// them again for every recorded child that has no slot.
    pub async fn run(&self) -> Result<()> {
        let mut signals = self
            .signal_rx
            .lock()
            .take()
            .ok_or(TrackerError::AlreadyRunning)?;
        let mut in_flight: FuturesUnordered<BoxFuture<'_, ()>> = FuturesUnordered::new();
        for reservation in self.reserve_recorded_children() {
            in_flight.push(self.acquire_child(reservation).boxed());
        }

        info!("Tracker running");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        for reservation in self.ingest(signal) {
                            in_flight.push(self.acquire_child(reservation).boxed());
                        }
                    }
                    None => break,
                },
            }
        }

        if !in_flight.is_empty() {
            debug!("Dropping {} in-flight acquisitions", in_flight.len());
        }
        drop(in_flight);
        *self.signal_rx.lock() = Some(signals);
        info!("Tracker stopped");
        Ok(())
    }

    /// Stop a running [`Tracker::run`], or the next one to start
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Apply one signal and await the acquisitions it starts
    pub async fn handle_signal(&self, signal: BusSignal) {
        let acquisitions: Vec<_> = self
            .ingest(signal)
            .into_iter()
            .map(|reservation| self.acquire_child(reservation))
            .collect();
        futures::future::join_all(acquisitions).await;
    }

    /// Apply one signal to the registry and emit its events
    ///
    /// Never awaits. Returns the child slots reserved by the signal; the
    /// caller is responsible for acquiring them.
    pub fn ingest(&self, signal: BusSignal) -> Vec<Reservation> {
        self.log_raw(&signal);
        match signal {
            BusSignal::InterfacesAdded { path, interfaces } => {
                self.on_interfaces_added(&path, &interfaces)
            }
            BusSignal::InterfacesRemoved { path, interfaces } => {
                self.on_interfaces_removed(&path, &interfaces);
                Vec::new()
            }
            BusSignal::PropertiesChanged {
                origin,
                interface,
                changed,
                invalidated,
            } => {
                self.on_properties_changed(origin, &interface, changed, invalidated);
                Vec::new()
            }
        }
    }

    /// Record every entity announced at `path`
    ///
    /// Emits `added-<Kind>` for entities seen for the first time and
    /// reserves child slots for the kinds that have one.
    pub fn on_interfaces_added(&self, path: &ObjectPath, interfaces: &InterfaceMap) -> Vec<Reservation> {
        let classifications = classifier::classify_all(path, interfaces.keys().map(String::as_str));
        if classifications.is_empty() {
            trace!("Ignoring InterfacesAdded at {}", path);
            return Vec::new();
        }

        let mut reservations = Vec::new();
        let mut registry = self.registry.lock();
        for classification in classifications {
            let kind = classification.kind;
            let key = classification.key;

            if registry.record_path(kind, key.clone(), path.clone()) {
                debug!("Recorded {} '{}' at {}", kind, key, path);
                let properties = interfaces
                    .get(kind.defining_interface().name())
                    .cloned()
                    .unwrap_or_default();
                self.emit(EventNormalizer::added(kind, key.clone(), path.clone(), properties));
            }

            if tracks_children(kind) {
                if let Some(reservation) = self
                    .subscriptions
                    .reserve(SubscriptionKey::new(kind, key), path.clone())
                {
                    reservations.push(reservation);
                }
            }
        }
        reservations
    }

    /// Delete every entity whose defining interface is named
    ///
    /// Releases the entity's subscription and child slot and emits
    /// `removed-<Kind>` for each entry that existed.
    pub fn on_interfaces_removed(&self, path: &ObjectPath, interfaces: &[String]) {
        let classifications = classifier::classify_all(path, interfaces.iter().map(String::as_str));
        if classifications.is_empty() {
            trace!("Ignoring InterfacesRemoved at {}", path);
            return;
        }

        let mut registry = self.registry.lock();
        for classification in classifications {
            let kind = classification.kind;
            let key = classification.key;

            self.subscriptions
                .release(&SubscriptionKey::new(kind, key.clone()));
            if let Some(entry) = registry.remove(kind, &key) {
                debug!("Removed {} '{}' ({:?})", kind, key, entry.state());
                drop(entry);
                self.emit(EventNormalizer::removed(kind, key));
            }
        }
    }

    /// Emit `changed-<Kind>` for a recognized interface
    pub fn on_properties_changed(
        &self,
        origin: Option<ObjectPath>,
        interface: &str,
        changed: PropertyMap,
        invalidated: Vec<String>,
    ) {
        match EventNormalizer::changed(interface, origin, changed, invalidated) {
            Some(event) => self.emit(event),
            None => trace!("Ignoring PropertiesChanged for {}", interface),
        }
    }

    /// Reserve a slot for every recorded child entry that has none
    fn reserve_recorded_children(&self) -> Vec<Reservation> {
        let registry = self.registry.lock();
        let reservations: Vec<_> = Kind::ALL
            .into_iter()
            .filter(|kind| tracks_children(*kind))
            .flat_map(|kind| {
                registry
                    .paths(kind)
                    .into_iter()
                    .map(move |(key, path)| (SubscriptionKey::new(kind, key), path))
            })
            .filter_map(|(key, path)| self.subscriptions.reserve(key, path))
            .collect();
        if !reservations.is_empty() {
            debug!("Re-reserved {} child slots", reservations.len());
        }
        reservations
    }

    async fn acquire_child(&self, reservation: Reservation) {
        let key = reservation.key().clone();
        match self.subscriptions.acquire(reservation, self.sink()).await {
            Ok(AcquireOutcome::Active) => debug!("Child subscriptions active for {}", key),
            Ok(AcquireOutcome::Abandoned) => debug!("{} went away during acquisition", key),
            Err(e) => warn!("{}", e),
        }
    }

    fn emit(&self, event: TrackerEvent) {
        trace!("Emitting {}", event.name());
        if self.events.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }

    fn log_raw(&self, signal: &BusSignal) {
        if let Some(dump) = self.raw_dump(signal) {
            debug!(target: "bluez_state::raw", "{}", dump);
        }
    }

    /// One-line dump of a raw signal, or `None` when nobody would see it
    fn raw_dump(&self, signal: &BusSignal) -> Option<String> {
        if !self.config.log_raw_signals
            || !tracing::enabled!(target: "bluez_state::raw", tracing::Level::DEBUG)
        {
            return None;
        }

        let (path, payload) = match signal {
            BusSignal::InterfacesAdded { path, interfaces } => {
                (Some(path), serde_json::to_string(interfaces))
            }
            BusSignal::InterfacesRemoved { path, interfaces } => {
                (Some(path), serde_json::to_string(interfaces))
            }
            BusSignal::PropertiesChanged {
                origin, interface, changed, ..
            } => (
                origin.as_ref(),
                serde_json::to_string(&serde_json::json!({
                    "interface": interface,
                    "changed": changed,
                })),
            ),
        };

        Some(format!(
            "{} {} {}",
            signal.name(),
            path.map(ObjectPath::as_str).unwrap_or("-"),
            payload.unwrap_or_default()
        ))
    }

    /// Resolve an entry of `H::KIND` to its handle, materializing it on first use
    ///
    /// A materialized entry returns its cached handle without touching the
    /// bus. A `PathKnown` entry costs one interface lookup and one property
    /// watch, then caches the handle.
    ///
    /// # Errors
    ///
    /// * `TrackerError::NotFound` - no entry, or it was removed while resolving
    /// * `TrackerError::Bus` - the lookup or the subscription failed
    pub async fn resolve<H: Resolvable>(&self, id: &str) -> Result<Arc<H>> {
        let kind = H::KIND;
        let key = normalize_id(kind, id)?;

        let path = {
            let registry = self.registry.lock();
            match registry.get(kind, &key) {
                None => return Err(TrackerError::not_found(kind, key.as_str())),
                Some(Entry::Materialized { handle, .. }) => {
                    return H::from_handle(handle)
                        .ok_or_else(|| TrackerError::not_found(kind, key.as_str()));
                }
                Some(Entry::PathKnown { path }) => path.clone(),
            }
        };

        self.bus.lookup_interface(&path, H::interface()).await?;
        let watch = self
            .subscriptions
            .watch_properties(&path, &self.sink())
            .await?;
        let handle = Arc::new(H::create(Arc::clone(&self.bus), path.clone()));

        let outcome = self.registry.lock().materialize(
            kind,
            &key,
            &path,
            H::wrap(Arc::clone(&handle)),
            Box::new(watch),
        );
        match outcome {
            Materialization::Installed(_) => {
                debug!("Materialized {} '{}'", kind, key);
                Ok(handle)
            }
            Materialization::AlreadyMaterialized(existing) => H::from_handle(&existing)
                .ok_or_else(|| TrackerError::not_found(kind, key.as_str())),
            Materialization::Vanished => Err(TrackerError::not_found(kind, key.as_str())),
        }
    }

    /// Resolve an adapter by id (`hci0`) or path
    pub async fn resolve_adapter(&self, id: &str) -> Result<Arc<Adapter>> {
        self.resolve::<Adapter>(id).await
    }

    /// Resolve a device by address (`AA:BB:CC:DD:EE:FF`), key or path
    pub async fn resolve_device(&self, address: &str) -> Result<Arc<Device>> {
        self.resolve::<Device>(address).await
    }

    /// Resolve a media player by path or key (`AA_BB_CC_DD_EE_FF.player0`)
    pub async fn resolve_media_player(&self, path: &str) -> Result<Arc<MediaPlayer>> {
        self.resolve::<MediaPlayer>(path).await
    }

    /// Resolve a media transport by path or key (`AA_BB_CC_DD_EE_FF.fd0`)
    pub async fn resolve_media_transport(&self, path: &str) -> Result<Arc<MediaTransport>> {
        self.resolve::<MediaTransport>(path).await
    }

    pub fn entry_state(&self, kind: Kind, key: &EntityKey) -> EntryState {
        self.registry.lock().state(kind, key)
    }

    /// Keys of every recorded entry of `kind`
    pub fn keys(&self, kind: Kind) -> Vec<EntityKey> {
        self.registry.lock().keys(kind)
    }

    pub fn path_of(&self, kind: Kind, key: &EntityKey) -> Option<ObjectPath> {
        self.registry.lock().path(kind, key).cloned()
    }

    pub fn subscription_stats(&self) -> SubscriptionStats {
        self.subscriptions.stats()
    }

    /// Register a profile at the configured object path
    pub async fn register_profile(&self, uuid: &str, options: &ProfileOptions) -> Result<()> {
        registration::register_profile(self.bus.as_ref(), &self.config.object_path, uuid, options)
            .await?;
        info!("Registered profile {}", uuid);
        Ok(())
    }

    /// Register the A/V remote control profile, `overrides` on top of its defaults
    pub async fn register_avrcp_profile(&self, role: Role, overrides: ProfileOptions) -> Result<()> {
        let options = ProfileOptions::avrcp(role).merged_with(overrides);
        self.register_profile(AVRCP_UUID, &options).await
    }

    /// Register the serial port profile, `overrides` on top of its defaults
    pub async fn register_serial_profile(&self, role: Role, overrides: ProfileOptions) -> Result<()> {
        let options = ProfileOptions::serial(role).merged_with(overrides);
        self.register_profile(SERIAL_PORT_UUID, &options).await
    }

    /// Register an agent at the configured object path
    pub async fn register_agent(&self, capability: AgentCapability) -> Result<()> {
        registration::register_agent(self.bus.as_ref(), &self.config.object_path, capability)
            .await?;
        info!("Registered agent with capability {}", capability);
        Ok(())
    }

    /// Register an agent with the configured capability (KeyboardDisplay by default)
    pub async fn register_default_agent(&self) -> Result<()> {
        self.register_agent(self.config.default_agent_capability).await
    }

    /// Ask BlueZ to make the agent at the configured object path the system default
    pub async fn request_default_agent(&self) -> Result<()> {
        registration::request_default_agent(self.bus.as_ref(), &self.config.object_path).await?;
        info!("Requested default agent {}", self.config.object_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluez_api::mock::MockBus;
    use rstest::rstest;
    use tracing_subscriber::EnvFilter;

    fn removal() -> BusSignal {
        BusSignal::InterfacesRemoved {
            path: ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF"),
            interfaces: vec!["org.bluez.Device1".to_string()],
        }
    }

    fn raw_dump_under(filter: &str, config: TrackerConfig) -> Option<String> {
        let (tracker, _events) = Tracker::new(Arc::new(MockBus::new()), config);
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::with_default(subscriber, || tracker.raw_dump(&removal()))
    }

    #[test]
    fn test_raw_dump_skipped_when_target_filtered_out() {
        assert!(raw_dump_under("bluez_state::raw=off", TrackerConfig::default()).is_none());
        assert!(raw_dump_under("info", TrackerConfig::default()).is_none());
    }

    #[test]
    fn test_raw_dump_when_target_enabled() {
        let dump = raw_dump_under("bluez_state::raw=debug", TrackerConfig::default()).unwrap();
        assert_eq!(
            dump,
            r#"InterfacesRemoved /org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF ["org.bluez.Device1"]"#
        );

        let quiet = TrackerConfig::default().with_raw_signal_logging(false);
        assert!(raw_dump_under("bluez_state::raw=debug", quiet).is_none());
    }

    #[rstest]
    #[case(Kind::Device, "AA:BB:CC:DD:EE:FF", "AA_BB_CC_DD_EE_FF")]
    #[case(Kind::Device, "AA_BB_CC_DD_EE_FF", "AA_BB_CC_DD_EE_FF")]
    #[case(Kind::Device, "dev_AA_BB_CC_DD_EE_FF", "AA_BB_CC_DD_EE_FF")]
    #[case(Kind::Device, "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF", "AA_BB_CC_DD_EE_FF")]
    #[case(Kind::Adapter, "hci0", "hci0")]
    #[case(Kind::Adapter, "/org/bluez/hci0", "hci0")]
    #[case(Kind::MediaPlayer, "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0", "AA_BB_CC_DD_EE_FF.player0")]
    #[case(Kind::MediaTransport, "AA:BB:CC:DD:EE:FF.fd1", "AA_BB_CC_DD_EE_FF.fd1")]
    fn test_normalize_id(#[case] kind: Kind, #[case] id: &str, #[case] key: &str) {
        assert_eq!(normalize_id(kind, id).unwrap().as_str(), key);
    }

    #[test]
    fn test_normalize_id_rejects_unclassified_path() {
        let err = normalize_id(Kind::MediaPlayer, "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_child_kinds() {
        let children: Vec<_> = Kind::ALL.into_iter().filter(|k| tracks_children(*k)).collect();
        assert_eq!(
            children,
            vec![
                Kind::MediaControl,
                Kind::MediaPlayer,
                Kind::MediaTransport,
                Kind::MediaItem,
                Kind::Filesystem,
            ]
        );
    }
}
