use thiserror::Error;

use crate::path::ObjectPath;

/// Errors raised at the bus boundary
///
/// Every failure of the underlying transport surfaces as one of these. The
/// tracking layer never retries them; they propagate to whoever asked for
/// the round trip.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure
    ///
    /// Covers lost connections, rejected match rules and any error the bus
    /// implementation cannot attribute to a single method call.
    #[error("Bus transport error: {0}")]
    Transport(String),

    /// A method call returned an error reply
    #[error("{interface}.{method} failed: {message}")]
    MethodCall {
        interface: String,
        method: String,
        message: String,
    },

    /// The object at `path` does not export `interface`
    #[error("Interface {interface} not found at {path}")]
    InterfaceNotFound { path: ObjectPath, interface: String },

    /// A signal subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Invalid parameter value
    ///
    /// Returned before any round trip when an argument cannot be encoded
    /// into the fixed option schema of a call.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The receiving side of a signal sink has gone away
    #[error("Signal channel has been closed")]
    ChannelClosed,
}

impl ApiError {
    /// Shorthand for an error reply to `interface.method`
    pub fn method_call(
        interface: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MethodCall {
            interface: interface.into(),
            method: method.into(),
            message: message.into(),
        }
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_call_display() {
        let error = ApiError::method_call("org.bluez.Device1", "Connect", "Page Timeout");
        assert_eq!(
            error.to_string(),
            "org.bluez.Device1.Connect failed: Page Timeout"
        );
    }

    #[test]
    fn test_interface_not_found_display() {
        let error = ApiError::InterfaceNotFound {
            path: ObjectPath::new("/org/bluez/hci1"),
            interface: "org.bluez.Adapter1".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/org/bluez/hci1"));
        assert!(message.contains("org.bluez.Adapter1"));
    }
}
