//! # BlueZ Event Manager
//!
//! Subscription bookkeeping for child objects (media controls, transports,
//! players and their items) discovered below a device.
//!
//! ## Overview
//!
//! Every child object of interest gets two subscriptions: PropertiesChanged
//! on the object itself, and a nested InterfacesAdded for anything that
//! appears below it. Acquiring them takes two bus round trips, during which
//! a second add signal for the same child may arrive. The manager closes
//! that window with a **reserve-then-acquire** slot table:
//!
//! 1. **Reserve**: a synchronous check-and-claim on the slot for the child's
//!    key. Exactly one caller gets a [`Reservation`]; everyone else sees the
//!    slot as taken.
//! 2. **Acquire**: the reservation holder performs the round trips and
//!    fulfills the slot with the live subscriptions.
//!
//! A reservation dropped before it is fulfilled withdraws its slot, and a
//! slot released while its acquisition is in flight makes that acquisition
//! come back [`AcquireOutcome::Abandoned`].
//!
//! PropertiesChanged subscriptions are shared per path through
//! [`PropertyWatches`], so a child slot and a resolved handle on the same
//! object never hold two subscriptions for it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bluez_event_manager::{SubscriptionKey, SubscriptionManager};
//!
//! let manager = SubscriptionManager::new(bus);
//! let key = SubscriptionKey::new(Kind::MediaPlayer, EntityKey::new("AA_BB_CC_DD_EE_FF.player0"));
//!
//! if let Some(reservation) = manager.reserve(key, path) {
//!     manager.acquire(reservation, sink).await?;
//! }
//! ```

pub mod error;
pub mod manager;
pub mod watch;

pub use error::{EventManagerError, Result};
pub use manager::{
    AcquireOutcome, ChildSubscriptions, Reservation, ReservationId, SubscriptionKey,
    SubscriptionManager, SubscriptionStats,
};
pub use watch::{PropertyWatch, PropertyWatches};
