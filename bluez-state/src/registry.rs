//! The `(kind, key) -> Entry` table
//!
//! The registry is plain data: it never talks to the bus. The tracker does
//! the round trips for a resolution and hands the results back through
//! [`Registry::materialize`], which re-checks the entry because it may have
//! changed while the tracker was waiting.

use std::collections::BTreeMap;

use bluez_api::{EntityKey, Kind, ObjectPath, Subscription};

use crate::model::{Entry, EntryState, Handle};

/// Result of installing a freshly built handle
#[derive(Debug, Clone)]
pub enum Materialization {
    /// The entry now owns the handle and its subscription
    Installed(Handle),
    /// Another resolution got there first; the offered handle and
    /// subscription were dropped
    AlreadyMaterialized(Handle),
    /// The entry was removed, or re-recorded at a different path
    Vanished,
}

/// Tracked entities by kind and key
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<(Kind, EntityKey), Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the path of an entity
    ///
    /// Returns `true` when the entity was unknown. An existing entry is left
    /// untouched, so a materialized entry never regresses.
    pub fn record_path(&mut self, kind: Kind, key: EntityKey, path: ObjectPath) -> bool {
        use std::collections::btree_map::Entry as Slot;

        match self.entries.entry((kind, key)) {
            Slot::Occupied(_) => false,
            Slot::Vacant(vacant) => {
                vacant.insert(Entry::PathKnown { path });
                true
            }
        }
    }

    /// Forget an entity, returning its entry
    ///
    /// Dropping the returned entry releases its subscription.
    pub fn remove(&mut self, kind: Kind, key: &EntityKey) -> Option<Entry> {
        self.entries.remove(&(kind, key.clone()))
    }

    pub fn get(&self, kind: Kind, key: &EntityKey) -> Option<&Entry> {
        self.entries.get(&(kind, key.clone()))
    }

    pub fn state(&self, kind: Kind, key: &EntityKey) -> EntryState {
        self.get(kind, key)
            .map(Entry::state)
            .unwrap_or(EntryState::Unknown)
    }

    pub fn path(&self, kind: Kind, key: &EntityKey) -> Option<&ObjectPath> {
        self.get(kind, key).map(Entry::path)
    }

    /// Install a handle on a `PathKnown` entry recorded at `path`
    pub fn materialize(
        &mut self,
        kind: Kind,
        key: &EntityKey,
        path: &ObjectPath,
        handle: Handle,
        subscription: Box<dyn Subscription>,
    ) -> Materialization {
        let Some(entry) = self.entries.get_mut(&(kind, key.clone())) else {
            return Materialization::Vanished;
        };

        let same_path = match entry {
            Entry::Materialized { handle: existing, .. } => {
                return Materialization::AlreadyMaterialized(existing.clone());
            }
            Entry::PathKnown { path: recorded } => *recorded == *path,
        };
        if !same_path {
            return Materialization::Vanished;
        }

        *entry = Entry::Materialized {
            path: path.clone(),
            handle: handle.clone(),
            subscription,
        };
        Materialization::Installed(handle)
    }

    /// Keys of every entry of `kind`, in key order
    pub fn keys(&self, kind: Kind) -> Vec<EntityKey> {
        self.entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Key and path of every entry of `kind`, in key order
    pub fn paths(&self, kind: Kind) -> Vec<(EntityKey, ObjectPath)> {
        self.entries
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, key), entry)| (key.clone(), entry.path().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything, releasing every subscription
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluez_api::{BusClient, Device, SubscriptionKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountedSubscription {
        path: ObjectPath,
        live: Arc<AtomicUsize>,
    }

    impl CountedSubscription {
        fn boxed(path: &ObjectPath, live: &Arc<AtomicUsize>) -> Box<dyn Subscription> {
            live.fetch_add(1, Ordering::SeqCst);
            Box::new(Self {
                path: path.clone(),
                live: Arc::clone(live),
            })
        }
    }

    impl Subscription for CountedSubscription {
        fn path(&self) -> &ObjectPath {
            &self.path
        }

        fn kind(&self) -> SubscriptionKind {
            SubscriptionKind::PropertiesChanged
        }
    }

    impl Drop for CountedSubscription {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn device_handle(path: &ObjectPath) -> Handle {
        let bus: Arc<dyn BusClient> = Arc::new(bluez_api::mock::MockBus::new());
        Handle::Device(Arc::new(Device::new(bus, path.clone())))
    }

    fn key() -> EntityKey {
        EntityKey::new("AA_BB_CC_DD_EE_FF")
    }

    fn path() -> ObjectPath {
        ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF")
    }

    #[test]
    fn test_record_path_is_idempotent() {
        let mut registry = Registry::new();

        assert!(registry.record_path(Kind::Device, key(), path()));
        assert!(!registry.record_path(Kind::Device, key(), path()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(Kind::Device, &key()), EntryState::PathKnown);
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut registry = Registry::new();
        registry.record_path(Kind::Device, key(), path());
        registry.record_path(Kind::MediaControl, key(), path());

        assert_eq!(registry.keys(Kind::Device), vec![key()]);
        assert_eq!(registry.keys(Kind::MediaControl), vec![key()]);
        assert!(registry.keys(Kind::Network).is_empty());
    }

    #[test]
    fn test_materialize_then_record_does_not_regress() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.record_path(Kind::Device, key(), path());

        let outcome = registry.materialize(
            Kind::Device,
            &key(),
            &path(),
            device_handle(&path()),
            CountedSubscription::boxed(&path(), &live),
        );
        assert!(matches!(outcome, Materialization::Installed(_)));

        assert!(!registry.record_path(Kind::Device, key(), path()));
        assert_eq!(registry.state(Kind::Device, &key()), EntryState::Materialized);
        assert_eq!(live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_materialization_keeps_first_handle() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.record_path(Kind::Device, key(), path());

        let first = device_handle(&path());
        registry.materialize(
            Kind::Device,
            &key(),
            &path(),
            first.clone(),
            CountedSubscription::boxed(&path(), &live),
        );
        let outcome = registry.materialize(
            Kind::Device,
            &key(),
            &path(),
            device_handle(&path()),
            CountedSubscription::boxed(&path(), &live),
        );

        match (outcome, first) {
            (Materialization::AlreadyMaterialized(Handle::Device(got)), Handle::Device(want)) => {
                assert!(Arc::ptr_eq(&got, &want))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_materialize_after_remove_vanishes() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.record_path(Kind::Device, key(), path());
        registry.remove(Kind::Device, &key());

        let outcome = registry.materialize(
            Kind::Device,
            &key(),
            &path(),
            device_handle(&path()),
            CountedSubscription::boxed(&path(), &live),
        );
        assert!(matches!(outcome, Materialization::Vanished));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_releases_subscription() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.record_path(Kind::Device, key(), path());
        registry.materialize(
            Kind::Device,
            &key(),
            &path(),
            device_handle(&path()),
            CountedSubscription::boxed(&path(), &live),
        );

        let removed = registry.remove(Kind::Device, &key());
        assert!(removed.is_some());
        drop(removed);

        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(registry.state(Kind::Device, &key()), EntryState::Unknown);
        assert!(registry.remove(Kind::Device, &key()).is_none());
    }

    #[test]
    fn test_paths_lists_only_requested_kind() {
        let mut registry = Registry::new();
        registry.record_path(Kind::Device, key(), path());
        let player_path = ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0");
        let player_key = EntityKey::new("AA_BB_CC_DD_EE_FF.player0");
        registry.record_path(Kind::MediaPlayer, player_key.clone(), player_path.clone());

        assert_eq!(registry.paths(Kind::MediaPlayer), vec![(player_key, player_path)]);
        assert_eq!(registry.paths(Kind::Device), vec![(key(), path())]);
        assert!(registry.paths(Kind::MediaTransport).is_empty());
    }
}
