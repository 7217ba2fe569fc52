//! Domain events and their normalization from raw interface names
//!
//! Raw notifications name a versioned, namespaced interface
//! (`org.bluez.MediaPlayer1`). Domain events name the kind instead
//! (`changed-MediaPlayer`), so a consumer never deals with bus vocabulary.

use serde_json::{json, Map, Value};

use bluez_api::{EntityKey, Interface, Kind, ObjectPath, PropertyMap, NAMESPACE};

use crate::classifier;

/// An event emitted by the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// An entity was recorded for the first time
    Added {
        kind: Kind,
        object: EntityKey,
        path: ObjectPath,
        properties: PropertyMap,
    },
    /// An entity's defining interface went away
    Removed { kind: Kind, object: EntityKey },
    /// Properties changed on one of the recognized interfaces
    ///
    /// `origin` is the path the PropertiesChanged subscription was made for,
    /// and `object` its key when that path classifies for `kind`.
    Changed {
        kind: Kind,
        interface: Interface,
        origin: Option<ObjectPath>,
        object: Option<EntityKey>,
        properties: PropertyMap,
        invalidated: Vec<String>,
    },
}

impl TrackerEvent {
    pub fn kind(&self) -> Kind {
        match self {
            TrackerEvent::Added { kind, .. }
            | TrackerEvent::Removed { kind, .. }
            | TrackerEvent::Changed { kind, .. } => *kind,
        }
    }

    /// `added-`, `removed-` or `changed-`
    pub fn prefix(&self) -> &'static str {
        match self {
            TrackerEvent::Added { .. } => "added-",
            TrackerEvent::Removed { .. } => "removed-",
            TrackerEvent::Changed { .. } => "changed-",
        }
    }

    /// Event name, e.g. `added-Device`
    pub fn name(&self) -> String {
        format!("{}{}", self.prefix(), self.kind().name())
    }

    /// Payload in its wire shape
    ///
    /// - added: `{ object, path, properties }`
    /// - removed: `{ object }`
    /// - changed: `{ path: <interface name>, properties }`, plus `origin`,
    ///   `object` and `invalidated` when present
    pub fn payload(&self) -> Value {
        match self {
            TrackerEvent::Added {
                object,
                path,
                properties,
                ..
            } => json!({
                "object": object,
                "path": path,
                "properties": properties,
            }),
            TrackerEvent::Removed { object, .. } => json!({ "object": object }),
            TrackerEvent::Changed {
                interface,
                origin,
                object,
                properties,
                invalidated,
                ..
            } => {
                let mut payload = Map::new();
                payload.insert("path".into(), json!(interface.name()));
                payload.insert("properties".into(), json!(properties));
                if let Some(origin) = origin {
                    payload.insert("origin".into(), json!(origin));
                }
                if let Some(object) = object {
                    payload.insert("object".into(), json!(object));
                }
                if !invalidated.is_empty() {
                    payload.insert("invalidated".into(), json!(invalidated));
                }
                Value::Object(payload)
            }
        }
    }
}

/// Converts raw notifications into [`TrackerEvent`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct EventNormalizer;

impl EventNormalizer {
    /// Domain name of an interface: namespace and version stripped
    ///
    /// `org.bluez.Device1` becomes `Device`. Names outside the eight
    /// recognized interfaces yield `None`.
    pub fn domain_name(interface: &str) -> Option<&str> {
        Interface::from_name(interface)?;
        interface
            .strip_prefix(NAMESPACE)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|rest| rest.strip_suffix('1'))
    }

    pub fn added(kind: Kind, object: EntityKey, path: ObjectPath, properties: PropertyMap) -> TrackerEvent {
        TrackerEvent::Added {
            kind,
            object,
            path,
            properties,
        }
    }

    pub fn removed(kind: Kind, object: EntityKey) -> TrackerEvent {
        TrackerEvent::Removed { kind, object }
    }

    /// Normalize a PropertiesChanged notification
    ///
    /// Returns `None` for unrecognized interfaces.
    pub fn changed(
        interface: &str,
        origin: Option<ObjectPath>,
        properties: PropertyMap,
        invalidated: Vec<String>,
    ) -> Option<TrackerEvent> {
        let interface = Interface::from_name(interface)?;
        let kind = interface.kind();
        let object = origin
            .as_ref()
            .and_then(|path| classifier::classify_as(path, kind));

        Some(TrackerEvent::Changed {
            kind,
            interface,
            origin,
            object,
            properties,
            invalidated,
        })
    }
}
