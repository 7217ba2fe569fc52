//! Materialized handles and the kinds that can be resolved to one

use std::sync::Arc;

use bluez_api::{Adapter, BusClient, Device, Kind, MediaPlayer, MediaTransport, ObjectPath};

/// A materialized handle, owned by its registry entry
///
/// Clones share the same underlying handle.
#[derive(Debug, Clone)]
pub enum Handle {
    Adapter(Arc<Adapter>),
    Device(Arc<Device>),
    MediaPlayer(Arc<MediaPlayer>),
    MediaTransport(Arc<MediaTransport>),
}

impl Handle {
    pub fn kind(&self) -> Kind {
        match self {
            Handle::Adapter(_) => Kind::Adapter,
            Handle::Device(_) => Kind::Device,
            Handle::MediaPlayer(_) => Kind::MediaPlayer,
            Handle::MediaTransport(_) => Kind::MediaTransport,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        match self {
            Handle::Adapter(h) => h.path(),
            Handle::Device(h) => h.path(),
            Handle::MediaPlayer(h) => h.path(),
            Handle::MediaTransport(h) => h.path(),
        }
    }
}

/// A handle type the tracker can lazily materialize
pub trait Resolvable: Sized + Send + Sync + 'static {
    /// Kind whose entries resolve to this handle
    const KIND: Kind;

    /// Construct the handle for the object at `path`
    fn create(bus: Arc<dyn BusClient>, path: ObjectPath) -> Self;

    fn wrap(handle: Arc<Self>) -> Handle;

    fn from_handle(handle: &Handle) -> Option<Arc<Self>>;

    /// Interface confirmed by the lookup before materializing
    fn interface() -> &'static str {
        Self::KIND.interface().name()
    }
}

macro_rules! impl_resolvable {
    ($($handle:ident),* $(,)?) => {
        $(
            impl Resolvable for $handle {
                const KIND: Kind = Kind::$handle;

                fn create(bus: Arc<dyn BusClient>, path: ObjectPath) -> Self {
                    $handle::new(bus, path)
                }

                fn wrap(handle: Arc<Self>) -> Handle {
                    Handle::$handle(handle)
                }

                fn from_handle(handle: &Handle) -> Option<Arc<Self>> {
                    match handle {
                        Handle::$handle(h) => Some(Arc::clone(h)),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_resolvable!(Adapter, Device, MediaPlayer, MediaTransport);
