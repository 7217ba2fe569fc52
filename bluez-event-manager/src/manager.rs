//! Reserve-then-acquire slot table for child subscriptions
//!
//! The table maps each child's `(kind, key)` to either a pending reservation
//! or its live subscriptions. Claiming a slot never awaits, so two add
//! signals for the same child can never both start an acquisition.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use bluez_api::{BusClient, EntityKey, Kind, ObjectPath, SignalSink, Subscription};

use crate::error::{EventManagerError, Result};
use crate::watch::{PropertyWatch, PropertyWatches};

/// Identifies the slot of one child object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub kind: Kind,
    pub key: EntityKey,
}

impl SubscriptionKey {
    pub fn new(kind: Kind, key: EntityKey) -> Self {
        Self { kind, key }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Unique identifier for one reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId(u64);

impl ReservationId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// The two subscriptions held for a child object
pub struct ChildSubscriptions {
    /// PropertiesChanged on the child, tagged with its path
    pub properties: PropertyWatch,
    /// InterfacesAdded for objects nested below the child
    pub children: Box<dyn Subscription>,
    /// When both subscriptions were in place
    pub acquired_at: SystemTime,
}

impl fmt::Debug for ChildSubscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildSubscriptions")
            .field("properties", &self.properties)
            .field("children", &self.children)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

#[derive(Debug)]
enum Slot {
    Pending { reservation: ReservationId },
    Active(ChildSubscriptions),
}

impl Slot {
    fn is_pending_for(&self, id: ReservationId) -> bool {
        matches!(self, Slot::Pending { reservation } if *reservation == id)
    }
}

/// Claim on a slot, obtained from [`SubscriptionManager::reserve`]
///
/// Dropping an unfulfilled reservation withdraws the claim.
pub struct Reservation {
    id: ReservationId,
    key: SubscriptionKey,
    path: ObjectPath,
    slots: Arc<DashMap<SubscriptionKey, Slot>>,
    fulfilled: bool,
}

impl Reservation {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Path of the child object the slot was reserved for
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("path", &self.path)
            .field("fulfilled", &self.fulfilled)
            .finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.fulfilled {
            return;
        }
        let id = self.id;
        if self
            .slots
            .remove_if(&self.key, |_, slot| slot.is_pending_for(id))
            .is_some()
        {
            debug!("Withdrew reservation {} for {}", id, self.key);
        }
    }
}

/// What happened to a reservation once its round trips finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Both subscriptions are now held in the slot
    Active,
    /// The slot was released meanwhile; the fresh subscriptions were dropped
    Abandoned,
}

/// Slot counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub active: usize,
    pub pending: usize,
}

impl SubscriptionStats {
    pub fn total(&self) -> usize {
        self.active + self.pending
    }
}

/// Child subscription bookkeeping
///
/// The manager owns one slot per child key. It does not decide which
/// objects deserve a slot; the caller reserves for the children it cares
/// about and releases when they disappear.
pub struct SubscriptionManager {
    bus: Arc<dyn BusClient>,
    watches: PropertyWatches,
    slots: Arc<DashMap<SubscriptionKey, Slot>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(bus: Arc<dyn BusClient>) -> Self {
        Self {
            watches: PropertyWatches::new(Arc::clone(&bus)),
            bus,
            slots: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Property watches shared between child slots and other holders
    pub fn watches(&self) -> &PropertyWatches {
        &self.watches
    }

    /// Claim the PropertiesChanged subscription on `path`
    ///
    /// Shares the subscription already held by a child slot on the same
    /// path, if any.
    pub async fn watch_properties(
        &self,
        path: &ObjectPath,
        sink: &SignalSink,
    ) -> bluez_api::Result<PropertyWatch> {
        self.watches.watch(path, sink).await
    }

    /// Claim the slot for `key` if nobody holds it
    ///
    /// Returns `None` when the slot is already pending or active. The check
    /// and the claim happen under one shard lock.
    pub fn reserve(&self, key: SubscriptionKey, path: ObjectPath) -> Option<Reservation> {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!("Slot for {} already taken, skipping {}", key, path);
                None
            }
            Entry::Vacant(vacant) => {
                let id = ReservationId(self.next_id.fetch_add(1, Ordering::Relaxed));
                vacant.insert(Slot::Pending { reservation: id });
                debug!("Reserved {} for {} at {}", id, key, path);
                Some(Reservation {
                    id,
                    key,
                    path,
                    slots: Arc::clone(&self.slots),
                    fulfilled: false,
                })
            }
        }
    }

    /// Acquire both subscriptions for a reserved slot
    ///
    /// PropertiesChanged is watched through `sink.with_origin(path)` so its
    /// notifications name the child they came from. Nested InterfacesAdded
    /// goes through `sink` unchanged.
    ///
    /// # Errors
    ///
    /// * `EventManagerError::Acquisition` - the bus rejected a subscription;
    ///   the slot is withdrawn
    pub async fn acquire(
        &self,
        mut reservation: Reservation,
        sink: SignalSink,
    ) -> Result<AcquireOutcome> {
        let path = reservation.path.clone();

        let properties = match self.watches.watch(&path, &sink).await {
            Ok(watch) => watch,
            Err(source) => {
                return Err(EventManagerError::Acquisition {
                    key: reservation.key.clone(),
                    source,
                })
            }
        };

        let children = match self.bus.subscribe_interfaces_added(&path, sink).await {
            Ok(subscription) => subscription,
            Err(source) => {
                return Err(EventManagerError::Acquisition {
                    key: reservation.key.clone(),
                    source,
                })
            }
        };

        let fulfilled = match self.slots.get_mut(&reservation.key) {
            Some(mut slot) if slot.is_pending_for(reservation.id) => {
                *slot = Slot::Active(ChildSubscriptions {
                    properties,
                    children,
                    acquired_at: SystemTime::now(),
                });
                true
            }
            _ => false,
        };

        if fulfilled {
            reservation.fulfilled = true;
            debug!("Subscriptions active for {} at {}", reservation.key, path);
            Ok(AcquireOutcome::Active)
        } else {
            debug!(
                "Slot for {} released during acquisition, dropping subscriptions",
                reservation.key
            );
            Ok(AcquireOutcome::Abandoned)
        }
    }

    /// Drop the slot for `key`, releasing any live subscriptions
    ///
    /// Returns `true` if a slot existed. Releasing a pending slot makes the
    /// in-flight acquisition come back abandoned.
    pub fn release(&self, key: &SubscriptionKey) -> bool {
        match self.slots.remove(key) {
            Some((_, slot)) => {
                debug!("Released slot for {} ({:?})", key, slot_state(&slot));
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, key: &SubscriptionKey) -> bool {
        self.slots
            .get(key)
            .map(|slot| matches!(*slot, Slot::Active(_)))
            .unwrap_or(false)
    }

    pub fn is_pending(&self, key: &SubscriptionKey) -> bool {
        self.slots
            .get(key)
            .map(|slot| matches!(*slot, Slot::Pending { .. }))
            .unwrap_or(false)
    }

    /// Whether the slot is taken at all
    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn stats(&self) -> SubscriptionStats {
        self.slots
            .iter()
            .fold(SubscriptionStats::default(), |mut stats, slot| {
                match slot.value() {
                    Slot::Active(_) => stats.active += 1,
                    Slot::Pending { .. } => stats.pending += 1,
                }
                stats
            })
    }

    /// Drop every slot
    pub fn clear(&self) {
        self.slots.clear();
    }
}

fn slot_state(slot: &Slot) -> &'static str {
    match slot {
        Slot::Pending { .. } => "pending",
        Slot::Active(_) => "active",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluez_api::mock::MockBus;
    use bluez_api::{BusSignal, SubscriptionKind};
    use tokio::sync::mpsc;

    const PLAYER_PATH: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0";

    fn player_key() -> SubscriptionKey {
        SubscriptionKey::new(Kind::MediaPlayer, EntityKey::new("AA_BB_CC_DD_EE_FF.player0"))
    }

    fn setup() -> (Arc<MockBus>, SubscriptionManager, SignalSink, mpsc::UnboundedReceiver<BusSignal>) {
        let bus = Arc::new(MockBus::new());
        let manager = SubscriptionManager::new(bus.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        (bus, manager, SignalSink::new(tx), rx)
    }

    #[tokio::test]
    async fn test_second_reservation_is_refused() {
        let (_bus, manager, _sink, _rx) = setup();

        let first = manager.reserve(player_key(), ObjectPath::new(PLAYER_PATH));
        assert!(first.is_some());
        assert!(manager.is_pending(&player_key()));

        let second = manager.reserve(player_key(), ObjectPath::new(PLAYER_PATH));
        assert!(second.is_none());
        assert_eq!(manager.stats(), SubscriptionStats { active: 0, pending: 1 });
    }

    #[tokio::test]
    async fn test_dropping_reservation_withdraws_slot() {
        let (_bus, manager, _sink, _rx) = setup();

        let reservation = manager.reserve(player_key(), ObjectPath::new(PLAYER_PATH));
        drop(reservation);

        assert!(!manager.contains(&player_key()));
        assert!(manager
            .reserve(player_key(), ObjectPath::new(PLAYER_PATH))
            .is_some());
    }

    #[tokio::test]
    async fn test_acquire_fulfills_slot_with_both_subscriptions() {
        let (bus, manager, sink, mut rx) = setup();
        let path = ObjectPath::new(PLAYER_PATH);

        let reservation = manager.reserve(player_key(), path.clone()).unwrap();
        let outcome = manager.acquire(reservation, sink).await.unwrap();

        assert_eq!(outcome, AcquireOutcome::Active);
        assert!(manager.is_active(&player_key()));
        assert_eq!(bus.subscriptions_for(&path, SubscriptionKind::PropertiesChanged), 1);
        assert_eq!(bus.subscriptions_for(&path, SubscriptionKind::InterfacesAdded), 1);
        assert_eq!(bus.active_subscriptions(), 2);

        bus.emit_properties_changed(&path, "org.bluez.MediaPlayer1", Default::default(), vec![]);
        match rx.try_recv().unwrap() {
            BusSignal::PropertiesChanged { origin, .. } => assert_eq!(origin, Some(path)),
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_acquisition_withdraws_slot() {
        let (bus, manager, sink, _rx) = setup();
        bus.set_fail_subscriptions(true);

        let reservation = manager
            .reserve(player_key(), ObjectPath::new(PLAYER_PATH))
            .unwrap();
        let result = manager.acquire(reservation, sink.clone()).await;

        assert!(matches!(result, Err(EventManagerError::Acquisition { .. })));
        assert!(!manager.contains(&player_key()));

        bus.set_fail_subscriptions(false);
        let retry = manager
            .reserve(player_key(), ObjectPath::new(PLAYER_PATH))
            .unwrap();
        assert_eq!(manager.acquire(retry, sink).await.unwrap(), AcquireOutcome::Active);
    }

    #[tokio::test]
    async fn test_release_during_acquisition_abandons_it() {
        let (bus, manager, sink, _rx) = setup();
        bus.pause_subscriptions();

        let reservation = manager
            .reserve(player_key(), ObjectPath::new(PLAYER_PATH))
            .unwrap();
        let acquisition = manager.acquire(reservation, sink);
        tokio::pin!(acquisition);

        // Drive the acquisition until it parks on the paused bus
        tokio::select! {
            biased;
            _ = &mut acquisition => panic!("acquisition completed while paused"),
            _ = tokio::task::yield_now() => {}
        }

        assert!(manager.release(&player_key()));
        bus.resume_subscriptions();

        assert_eq!(acquisition.await.unwrap(), AcquireOutcome::Abandoned);
        assert!(!manager.contains(&player_key()));
        assert_eq!(bus.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_release_drops_live_subscriptions() {
        let (bus, manager, sink, _rx) = setup();

        let reservation = manager
            .reserve(player_key(), ObjectPath::new(PLAYER_PATH))
            .unwrap();
        manager.acquire(reservation, sink).await.unwrap();
        assert_eq!(bus.active_subscriptions(), 2);

        assert!(manager.release(&player_key()));
        assert_eq!(bus.active_subscriptions(), 0);
        assert!(!manager.release(&player_key()));
    }

    #[tokio::test]
    async fn test_concurrent_arrivals_acquire_once() {
        let (bus, manager, sink, _rx) = setup();
        let path = ObjectPath::new(PLAYER_PATH);

        let attempts = (0..8).map(|_| {
            let sink = sink.clone();
            let path = path.clone();
            let manager = &manager;
            async move {
                match manager.reserve(player_key(), path) {
                    Some(reservation) => Some(manager.acquire(reservation, sink).await),
                    None => None,
                }
            }
        });
        let results = futures::future::join_all(attempts).await;

        let acquired = results.iter().filter(|r| r.is_some()).count();
        assert_eq!(acquired, 1);
        assert_eq!(bus.property_subscription_count(), 1);
        assert_eq!(bus.child_subscription_count(), 1);
        assert_eq!(manager.stats(), SubscriptionStats { active: 1, pending: 0 });
    }

    #[tokio::test]
    async fn test_clear_drops_every_slot() {
        let (bus, manager, sink, _rx) = setup();

        for ordinal in 0..3 {
            let key = SubscriptionKey::new(
                Kind::MediaTransport,
                EntityKey::new(format!("AA_BB_CC_DD_EE_FF.fd{}", ordinal)),
            );
            let path = ObjectPath::new(format!("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/fd{}", ordinal));
            let reservation = manager.reserve(key, path).unwrap();
            manager.acquire(reservation, sink.clone()).await.unwrap();
        }
        assert_eq!(manager.stats().total(), 3);

        manager.clear();
        assert_eq!(manager.stats().total(), 0);
        assert_eq!(bus.active_subscriptions(), 0);
    }
}
