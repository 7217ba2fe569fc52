use std::fmt;

use bluez_api::{ObjectPath, Subscription};

use super::Handle;

/// Lifecycle of one tracked entity
///
/// An entity with no entry is unknown. Entries are recorded as `PathKnown`
/// and only become `Materialized` through an explicit resolution.
pub enum Entry {
    /// Path recorded, nothing acquired
    PathKnown { path: ObjectPath },
    /// Handle built and PropertiesChanged subscribed
    Materialized {
        path: ObjectPath,
        handle: Handle,
        subscription: Box<dyn Subscription>,
    },
}

impl Entry {
    pub fn path(&self) -> &ObjectPath {
        match self {
            Entry::PathKnown { path } | Entry::Materialized { path, .. } => path,
        }
    }

    pub fn handle(&self) -> Option<&Handle> {
        match self {
            Entry::PathKnown { .. } => None,
            Entry::Materialized { handle, .. } => Some(handle),
        }
    }

    pub fn state(&self) -> EntryState {
        match self {
            Entry::PathKnown { .. } => EntryState::PathKnown,
            Entry::Materialized { .. } => EntryState::Materialized,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::PathKnown { path } => f.debug_struct("PathKnown").field("path", path).finish(),
            Entry::Materialized {
                path,
                handle,
                subscription,
            } => f
                .debug_struct("Materialized")
                .field("path", path)
                .field("handle", &handle.kind())
                .field("subscription", subscription)
                .finish(),
        }
    }
}

/// Observable state of a `(kind, key)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    Unknown,
    PathKnown,
    Materialized,
}
