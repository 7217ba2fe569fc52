use thiserror::Error;

use crate::manager::SubscriptionKey;

/// Errors that can occur while acquiring child subscriptions
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// The bus rejected one of the two subscriptions for a child object
    ///
    /// The slot has already been withdrawn when this is returned, so a later
    /// add signal for the same key may try again.
    #[error("Failed to acquire subscriptions for {key}: {source}")]
    Acquisition {
        key: SubscriptionKey,
        #[source]
        source: bluez_api::ApiError,
    },
}

/// Result type for Event Manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;
