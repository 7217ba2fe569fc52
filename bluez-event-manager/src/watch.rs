//! Shared PropertiesChanged subscriptions, one per object path
//!
//! A device path can be watched by a child slot (its `MediaControl1`) and by
//! a resolved `Device` handle at the same time. Both get a [`PropertyWatch`]
//! backed by one bus subscription; the subscription is released when the
//! last watch is dropped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

use bluez_api::{BusClient, ObjectPath, Result, SignalSink, Subscription, SubscriptionKind};

type WatchTable = DashMap<ObjectPath, Weak<WatchInner>>;

struct WatchInner {
    path: ObjectPath,
    subscription: Box<dyn Subscription>,
    table: Arc<WatchTable>,
}

impl Drop for WatchInner {
    fn drop(&mut self) {
        self.table
            .remove_if(&self.path, |_, weak| weak.strong_count() == 0);
        debug!("Released property watch on {}", self.path);
    }
}

/// A claim on the PropertiesChanged subscription of one path
///
/// Clones share the claim. Implements [`Subscription`] so it can be held
/// wherever an owned subscription is expected.
#[derive(Clone)]
pub struct PropertyWatch {
    inner: Arc<WatchInner>,
}

impl PropertyWatch {
    /// Number of live claims on this path, this one included
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Subscription for PropertyWatch {
    fn path(&self) -> &ObjectPath {
        &self.inner.path
    }

    fn kind(&self) -> SubscriptionKind {
        SubscriptionKind::PropertiesChanged
    }
}

impl fmt::Debug for PropertyWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyWatch")
            .field("path", &self.inner.path)
            .field("subscription", &self.inner.subscription)
            .field("holders", &self.holders())
            .finish()
    }
}

/// Table of live property watches
pub struct PropertyWatches {
    bus: Arc<dyn BusClient>,
    table: Arc<WatchTable>,
}

impl PropertyWatches {
    pub fn new(bus: Arc<dyn BusClient>) -> Self {
        Self {
            bus,
            table: Arc::new(DashMap::new()),
        }
    }

    /// The live watch on `path`, if any
    pub fn get(&self, path: &ObjectPath) -> Option<PropertyWatch> {
        let inner = self.table.get(path).and_then(|weak| weak.upgrade())?;
        Some(PropertyWatch { inner })
    }

    /// Claim the PropertiesChanged subscription on `path`
    ///
    /// Joins a live watch when there is one. Otherwise subscribes through
    /// `sink.with_origin(path)`. If another caller installed a watch while
    /// this one was subscribing, the fresh subscription is dropped and the
    /// installed one is joined.
    pub async fn watch(&self, path: &ObjectPath, sink: &SignalSink) -> Result<PropertyWatch> {
        if let Some(existing) = self.get(path) {
            return Ok(existing);
        }

        let subscription = self
            .bus
            .subscribe_properties_changed(path, sink.with_origin(path.clone()))
            .await?;
        let fresh = Arc::new(WatchInner {
            path: path.clone(),
            subscription,
            table: Arc::clone(&self.table),
        });

        let installed = match self.table.entry(path.clone()) {
            Entry::Occupied(mut occupied) => match occupied.get().upgrade() {
                Some(live) => Some(live),
                None => {
                    occupied.insert(Arc::downgrade(&fresh));
                    None
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::downgrade(&fresh));
                None
            }
        };

        match installed {
            Some(inner) => {
                debug!("Joined property watch installed concurrently on {}", path);
                drop(fresh);
                Ok(PropertyWatch { inner })
            }
            None => {
                debug!("Watching properties on {}", path);
                Ok(PropertyWatch { inner: fresh })
            }
        }
    }

    /// Number of paths currently watched
    pub fn len(&self) -> usize {
        self.table
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
