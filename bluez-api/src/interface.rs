//! Interface and kind vocabulary
//!
//! BlueZ exports every remote object under a fixed namespace and tags it with
//! one or more versioned interfaces. Eight of them are tracked; each maps to
//! exactly one [`Kind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace shared by all BlueZ interfaces
pub const NAMESPACE: &str = "org.bluez";

/// Standard object manager interface (enumeration and InterfacesAdded/Removed)
pub const OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";

/// Standard properties interface (Get/Set/GetAll and PropertiesChanged)
pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";

/// Profile registration manager, exported at the root path
pub const PROFILE_MANAGER: &str = "org.bluez.ProfileManager1";

/// Agent registration manager, exported at the root path
pub const AGENT_MANAGER: &str = "org.bluez.AgentManager1";

/// The eight interfaces the tracker recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interface {
    Adapter,
    Device,
    Filesystem,
    MediaControl,
    MediaItem,
    MediaPlayer,
    MediaTransport,
    Network,
}

impl Interface {
    /// All recognized interfaces
    pub const ALL: [Interface; 8] = [
        Interface::Adapter,
        Interface::Device,
        Interface::Filesystem,
        Interface::MediaControl,
        Interface::MediaItem,
        Interface::MediaPlayer,
        Interface::MediaTransport,
        Interface::Network,
    ];

    /// Fully qualified interface name as it appears on the bus
    pub fn name(&self) -> &'static str {
        match self {
            Interface::Adapter => "org.bluez.Adapter1",
            Interface::Device => "org.bluez.Device1",
            Interface::Filesystem => "org.bluez.Filesystem1",
            Interface::MediaControl => "org.bluez.MediaControl1",
            Interface::MediaItem => "org.bluez.MediaItem1",
            Interface::MediaPlayer => "org.bluez.MediaPlayer1",
            Interface::MediaTransport => "org.bluez.MediaTransport1",
            Interface::Network => "org.bluez.Network1",
        }
    }

    /// Parse a fully qualified interface name
    ///
    /// Returns `None` for anything outside the recognized set, including
    /// unqualified names such as `Device1`.
    pub fn from_name(name: &str) -> Option<Interface> {
        Interface::ALL.into_iter().find(|iface| iface.name() == name)
    }

    /// The kind of entity this interface defines
    pub fn kind(&self) -> Kind {
        match self {
            Interface::Adapter => Kind::Adapter,
            Interface::Device => Kind::Device,
            Interface::Filesystem => Kind::Filesystem,
            Interface::MediaControl => Kind::MediaControl,
            Interface::MediaItem => Kind::MediaItem,
            Interface::MediaPlayer => Kind::MediaPlayer,
            Interface::MediaTransport => Kind::MediaTransport,
            Interface::Network => Kind::Network,
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Domain category of a tracked object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Adapter,
    Device,
    Network,
    MediaControl,
    MediaPlayer,
    MediaTransport,
    MediaItem,
    Filesystem,
}

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::Adapter,
        Kind::Device,
        Kind::Network,
        Kind::MediaControl,
        Kind::MediaPlayer,
        Kind::MediaTransport,
        Kind::MediaItem,
        Kind::Filesystem,
    ];

    /// Name used as the suffix of domain events (`added-MediaPlayer`)
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Adapter => "Adapter",
            Kind::Device => "Device",
            Kind::Network => "Network",
            Kind::MediaControl => "MediaControl",
            Kind::MediaPlayer => "MediaPlayer",
            Kind::MediaTransport => "MediaTransport",
            Kind::MediaItem => "MediaItem",
            Kind::Filesystem => "Filesystem",
        }
    }

    /// Interface whose property-change notifications are reported as this kind
    pub fn interface(&self) -> Interface {
        match self {
            Kind::Adapter => Interface::Adapter,
            Kind::Device => Interface::Device,
            Kind::Network => Interface::Network,
            Kind::MediaControl => Interface::MediaControl,
            Kind::MediaPlayer => Interface::MediaPlayer,
            Kind::MediaTransport => Interface::MediaTransport,
            Kind::MediaItem => Interface::MediaItem,
            Kind::Filesystem => Interface::Filesystem,
        }
    }

    /// Interface whose appearance creates, and whose removal deletes, an entry
    ///
    /// Identical to [`Kind::interface`] except for `Filesystem`: a player's
    /// `Filesystem` object is announced through `MediaItem1`.
    pub fn defining_interface(&self) -> Interface {
        match self {
            Kind::Filesystem => Interface::MediaItem,
            other => other.interface(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_interface() {
        for iface in Interface::ALL {
            assert_eq!(Interface::from_name(iface.name()), Some(iface));
        }
    }

    #[test]
    fn test_from_name_rejects_unqualified_and_foreign_names() {
        assert_eq!(Interface::from_name("Device1"), None);
        assert_eq!(Interface::from_name("org.bluez.Device2"), None);
        assert_eq!(Interface::from_name("org.bluez.AgentManager1"), None);
        assert_eq!(Interface::from_name(PROPERTIES), None);
    }

    #[test]
    fn test_kind_interface_mapping_is_bijective() {
        for kind in Kind::ALL {
            assert_eq!(kind.interface().kind(), kind);
        }
    }

    #[test]
    fn test_filesystem_is_defined_by_media_item() {
        assert_eq!(Kind::Filesystem.interface(), Interface::Filesystem);
        assert_eq!(Kind::Filesystem.defining_interface(), Interface::MediaItem);
        assert_eq!(Kind::Device.defining_interface(), Interface::Device);
    }
}
