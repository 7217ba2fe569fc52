//! Error types for bluez-state

use bluez_api::{ApiError, Kind};
use bluez_event_manager::EventManagerError;
use thiserror::Error;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors surfaced by the tracker
///
/// Unclassifiable paths and unrecognized interfaces are not errors; they
/// are dropped where they are encountered.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No entry has been recorded for this key
    #[error("{kind} '{key}' not found")]
    NotFound { kind: Kind, key: String },

    /// Bus round trip failed during enumeration, subscription or lookup
    #[error("Bus error: {0}")]
    Bus(#[from] ApiError),

    /// Child subscription acquisition failed
    #[error("Subscription error: {0}")]
    Subscription(#[from] EventManagerError),

    /// `run()` was called while another run loop holds the signal queue
    #[error("Tracker is already running")]
    AlreadyRunning,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    pub fn not_found(kind: Kind, key: impl Into<String>) -> Self {
        TrackerError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackerError::NotFound { .. })
    }
}
