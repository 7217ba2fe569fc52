//! Object paths, entity keys and the property containers carried by signals

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Root under which BlueZ exports adapters and everything below them
pub const ROOT_PATH: &str = "/org/bluez";

/// Property name to value, as carried in GetAll replies and signals
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// Interface name to properties, as carried in InterfacesAdded
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// Result of an object manager enumeration
///
/// Ordered by path so that parents are visited before their children.
pub type ManagedObjects = BTreeMap<ObjectPath, InterfaceMap>;

/// Hierarchical identifier of a remote bus object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The root path (`/org/bluez`)
    pub fn root() -> Self {
        Self(ROOT_PATH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments below the BlueZ root, without the leading separator
    ///
    /// Returns `None` for paths outside the root and for the root itself.
    pub fn relative_to_root(&self) -> Option<&str> {
        self.0
            .strip_prefix(ROOT_PATH)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Append a single segment
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0.trim_end_matches('/'), segment))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(s: &str) -> Self {
        ObjectPath::new(s)
    }
}

impl From<String> for ObjectPath {
    fn from(s: String) -> Self {
        ObjectPath::new(s)
    }
}

/// Canonical key of a tracked entity within its kind
///
/// Adapters are keyed by adapter id (`hci0`), devices by address with `:`
/// replaced by `_`, and sub-objects by dot-joined composites such as
/// `AA_BB_CC_DD_EE_FF.player0.item12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from a human-readable address (`AA:BB:...`)
    pub fn address(raw: &str) -> Self {
        Self(raw.replace(':', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        EntityKey::new(s)
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        EntityKey::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_root() {
        let path = ObjectPath::new("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        assert_eq!(path.relative_to_root(), Some("hci0/dev_AA_BB_CC_DD_EE_FF"));
    }

    #[test]
    fn test_relative_to_root_rejects_root_and_foreign_paths() {
        assert_eq!(ObjectPath::root().relative_to_root(), None);
        assert_eq!(ObjectPath::new("/org/bluez/").relative_to_root(), None);
        assert_eq!(ObjectPath::new("/org/bluezz/hci0").relative_to_root(), None);
        assert_eq!(ObjectPath::new("/org/node/bluez").relative_to_root(), None);
    }

    #[test]
    fn test_child() {
        let path = ObjectPath::new("/org/bluez/hci0").child("dev_11_22_33_44_55_66");
        assert_eq!(path.as_str(), "/org/bluez/hci0/dev_11_22_33_44_55_66");
    }

    #[test]
    fn test_address_key_replaces_colons() {
        assert_eq!(
            EntityKey::address("AA:BB:CC:DD:EE:FF").as_str(),
            "AA_BB_CC_DD_EE_FF"
        );
        assert_eq!(EntityKey::address("AA_BB").as_str(), "AA_BB");
    }

    #[test]
    fn test_serde_transparent() {
        let path = ObjectPath::new("/org/bluez/hci0");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/org/bluez/hci0\"");
    }
}
