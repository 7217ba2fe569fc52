//! Typed vocabulary and client boundary for the BlueZ object tree
//!
//! This crate knows what BlueZ exports (interfaces, kinds, object paths) and
//! what a client needs from the bus to track it. It does not own a
//! connection: transports implement [`BusClient`] and push signals into the
//! [`SignalSink`] they are handed.
//!
//! ```rust,ignore
//! use bluez_api::{handles::MediaPlayer, ObjectPath};
//!
//! let player = MediaPlayer::new(bus, ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF/player0"));
//! player.play().await?;
//! let status = player.status().await?;
//! ```

pub mod bus;
pub mod error;
pub mod handles;
pub mod interface;
mod macros;
pub mod path;
pub mod proxy;
pub mod registration;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use bus::{BusClient, BusSignal, SignalSink, Subscription, SubscriptionKind};
pub use error::{ApiError, Result};
pub use handles::{Adapter, Device, MediaPlayer, MediaTransport};
pub use interface::{Interface, Kind, NAMESPACE};
pub use path::{EntityKey, InterfaceMap, ManagedObjects, ObjectPath, PropertyMap, ROOT_PATH};
pub use proxy::Proxy;
pub use registration::{AgentCapability, ProfileOptions, Role};
