//! BlueZ Topology Tracking
//!
//! Keeps a client-side view of the adapters, devices, media players and
//! transports exported by BlueZ, and turns the bus's raw notifications into
//! domain events.
//!
//! # Features
//!
//! - **Path grammar**: every object path is classified into a kind and a
//!   stable key (`AA_BB_CC_DD_EE_FF.player0`)
//! - **Lazy handles**: entries are recorded from notifications alone; the
//!   bus is only asked for an object when something resolves it
//! - **Normalized events**: `added-Device`, `changed-MediaPlayer`,
//!   `removed-MediaTransport` instead of interface names
//! - **No duplicate subscriptions**: concurrent discovery of the same child
//!   object costs one subscription
//!
//! # Architecture
//!
//! ```text
//! Bus signals → Tracker queue → Classifier → Registry → EventReceiver
//!                    │                           │
//!                    └── SubscriptionManager ────┘
//!                        (child slots, property watches)
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bluez_state::{Tracker, TrackerConfig};
//! use std::sync::Arc;
//!
//! let (tracker, mut events) = Tracker::new(bus, TrackerConfig::from_env());
//! let tracker = Arc::new(tracker);
//!
//! tracker.init().await?;
//! tokio::spawn({
//!     let tracker = Arc::clone(&tracker);
//!     async move { tracker.run().await }
//! });
//!
//! while let Some(event) = events.recv().await {
//!     if event.name() == "added-MediaPlayer" {
//!         let player = tracker.resolve_media_player(event.payload()["path"].as_str().unwrap_or_default()).await?;
//!         player.play().await?;
//!     }
//! }
//! ```

// Core modules
pub mod classifier;
pub mod model;
pub mod registry;
pub mod tracker;

// Events and their receiver
pub mod event;
pub mod iter;

// Configuration
pub mod config;

// Error types
pub mod error;

// Logging infrastructure
pub mod logging;

// ============================================================================
// Re-exports
// ============================================================================

pub use tracker::{normalize_id, tracks_children, Tracker};

pub use classifier::{classify, classify_all, classify_as, match_path, Classification, PathMatch, Shape};

pub use config::{TrackerConfig, DEFAULT_OBJECT_PATH, DEPLOYMENT_ENV};

pub use event::{EventNormalizer, TrackerEvent};

pub use iter::{EventReceiver, TryIter};

pub use model::{Entry, EntryState, Handle, Resolvable};

pub use registry::{Materialization, Registry};

// ============================================================================
// Re-exports - Error types
// ============================================================================

pub use error::{Result, TrackerError};

// ============================================================================
// Re-exports - Logging
// ============================================================================

pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::TrackerConfig;
    pub use crate::event::TrackerEvent;
    pub use crate::iter::EventReceiver;
    pub use crate::model::EntryState;
    pub use crate::tracker::Tracker;
    pub use bluez_api::{
        Adapter, AgentCapability, Device, EntityKey, Kind, MediaPlayer, MediaTransport,
        ObjectPath, ProfileOptions, Role,
    };
}
