//! Profile and agent registration
//!
//! Both managers live at the root path. Each registration is a single call
//! with a fixed option schema; exporting the local profile or agent object
//! that BlueZ will call back into is the transport's business.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::bus::BusClient;
use crate::error::{ApiError, Result};
use crate::interface::{AGENT_MANAGER, PROFILE_MANAGER};
use crate::path::ObjectPath;

/// Audio/Video Remote Control Profile
pub const AVRCP_UUID: &str = "0000110e-0000-1000-8000-00805f9b34fb";

/// Serial Port Profile
pub const SERIAL_PORT_UUID: &str = "00001101-0000-1000-8000-00805f9b34fb";

/// Local role for asymmetric profiles without distinct UUIDs per side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Server,
}

/// Options dictionary accepted by `ProfileManager1.RegisterProfile`
///
/// Unset fields are omitted from the dictionary so BlueZ applies its own
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileOptions {
    /// Human readable name for the profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Primary service class UUID, if different from the profile UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// RFCOMM channel number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,

    /// L2CAP PSM number
    #[serde(rename = "PSM", skip_serializing_if = "Option::is_none")]
    pub psm: Option<u16>,

    /// Pairing is required before connections will be established
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_authentication: Option<bool>,

    /// Request authorization before any connection will be established
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_authorization: Option<bool>,

    /// For client UUIDs, connect the channel when the remote device connects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_connect: Option<bool>,

    /// Manual SDP record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_record: Option<String>,

    /// Profile version (for SDP record)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u16>,

    /// Profile features (for SDP record)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<u16>,
}

impl ProfileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults used for the A/V remote control profile
    pub fn avrcp(role: Role) -> Self {
        Self {
            name: Some("Node A/V Remote Control".to_string()),
            role: Some(role),
            ..Default::default()
        }
    }

    /// Defaults used for the serial port profile
    pub fn serial(role: Role) -> Self {
        Self {
            name: Some("Node Serial Port".to_string()),
            role: Some(role),
            ..Default::default()
        }
    }

    /// Overlay every field set in `other` on top of `self`
    pub fn merged_with(self, other: ProfileOptions) -> Self {
        Self {
            name: other.name.or(self.name),
            service: other.service.or(self.service),
            role: other.role.or(self.role),
            channel: other.channel.or(self.channel),
            psm: other.psm.or(self.psm),
            require_authentication: other.require_authentication.or(self.require_authentication),
            require_authorization: other.require_authorization.or(self.require_authorization),
            auto_connect: other.auto_connect.or(self.auto_connect),
            service_record: other.service_record.or(self.service_record),
            version: other.version.or(self.version),
            features: other.features.or(self.features),
        }
    }

    /// Encode as the options dictionary argument
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ApiError::InvalidParameter(e.to_string()))
    }
}

/// Input/output capability advertised by an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    #[default]
    KeyboardDisplay,
}

impl AgentCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentCapability::DisplayOnly => "DisplayOnly",
            AgentCapability::DisplayYesNo => "DisplayYesNo",
            AgentCapability::KeyboardOnly => "KeyboardOnly",
            AgentCapability::NoInputNoOutput => "NoInputNoOutput",
            AgentCapability::KeyboardDisplay => "KeyboardDisplay",
        }
    }

    /// Parse a capability string; the empty string means `KeyboardDisplay`
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "KeyboardDisplay" => Ok(AgentCapability::KeyboardDisplay),
            "DisplayOnly" => Ok(AgentCapability::DisplayOnly),
            "DisplayYesNo" => Ok(AgentCapability::DisplayYesNo),
            "KeyboardOnly" => Ok(AgentCapability::KeyboardOnly),
            "NoInputNoOutput" => Ok(AgentCapability::NoInputNoOutput),
            other => Err(ApiError::InvalidParameter(format!(
                "Unknown agent capability '{}'",
                other
            ))),
        }
    }
}

impl FromStr for AgentCapability {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        AgentCapability::parse(s)
    }
}

impl fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ProfileManager1.RegisterProfile(path, uuid, options)`
pub async fn register_profile(
    bus: &dyn BusClient,
    profile: &ObjectPath,
    uuid: &str,
    options: &ProfileOptions,
) -> Result<()> {
    let args = vec![
        Value::String(profile.to_string()),
        Value::String(uuid.to_string()),
        options.to_value()?,
    ];
    tracing::debug!("Registering profile {} at {}", uuid, profile);
    bus.call_method(&ObjectPath::root(), PROFILE_MANAGER, "RegisterProfile", args)
        .await
        .map(|_| ())
}

/// `ProfileManager1.UnregisterProfile(path)`
pub async fn unregister_profile(bus: &dyn BusClient, profile: &ObjectPath) -> Result<()> {
    bus.call_method(
        &ObjectPath::root(),
        PROFILE_MANAGER,
        "UnregisterProfile",
        vec![Value::String(profile.to_string())],
    )
    .await
    .map(|_| ())
}

/// `AgentManager1.RegisterAgent(path, capability)`
pub async fn register_agent(
    bus: &dyn BusClient,
    agent: &ObjectPath,
    capability: AgentCapability,
) -> Result<()> {
    tracing::debug!("Registering agent {} with capability {}", agent, capability);
    bus.call_method(
        &ObjectPath::root(),
        AGENT_MANAGER,
        "RegisterAgent",
        vec![
            Value::String(agent.to_string()),
            Value::String(capability.as_str().to_string()),
        ],
    )
    .await
    .map(|_| ())
}

/// `AgentManager1.RequestDefaultAgent(path)`
pub async fn request_default_agent(bus: &dyn BusClient, agent: &ObjectPath) -> Result<()> {
    bus.call_method(
        &ObjectPath::root(),
        AGENT_MANAGER,
        "RequestDefaultAgent",
        vec![Value::String(agent.to_string())],
    )
    .await
    .map(|_| ())
}

/// `AgentManager1.UnregisterAgent(path)`
pub async fn unregister_agent(bus: &dyn BusClient, agent: &ObjectPath) -> Result<()> {
    bus.call_method(
        &ObjectPath::root(),
        AGENT_MANAGER,
        "UnregisterAgent",
        vec![Value::String(agent.to_string())],
    )
    .await
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_profile_options_use_fixed_key_names() {
        let options = ProfileOptions {
            psm: Some(25),
            require_authentication: Some(true),
            service_record: Some("<record/>".to_string()),
            ..ProfileOptions::avrcp(Role::Server)
        };

        assert_eq!(
            options.to_value().unwrap(),
            json!({
                "Name": "Node A/V Remote Control",
                "Role": "server",
                "PSM": 25,
                "RequireAuthentication": true,
                "ServiceRecord": "<record/>",
            })
        );
    }

    #[test]
    fn test_unset_options_are_omitted() {
        assert_eq!(ProfileOptions::new().to_value().unwrap(), json!({}));
    }

    #[test]
    fn test_merged_with_prefers_overrides() {
        let merged = ProfileOptions::serial(Role::Client).merged_with(ProfileOptions {
            role: Some(Role::Server),
            channel: Some(3),
            ..Default::default()
        });
        assert_eq!(merged.name.as_deref(), Some("Node Serial Port"));
        assert_eq!(merged.role, Some(Role::Server));
        assert_eq!(merged.channel, Some(3));
    }

    #[rstest]
    #[case("", AgentCapability::KeyboardDisplay)]
    #[case("KeyboardDisplay", AgentCapability::KeyboardDisplay)]
    #[case("DisplayOnly", AgentCapability::DisplayOnly)]
    #[case("DisplayYesNo", AgentCapability::DisplayYesNo)]
    #[case("KeyboardOnly", AgentCapability::KeyboardOnly)]
    #[case("NoInputNoOutput", AgentCapability::NoInputNoOutput)]
    fn test_capability_parse(#[case] input: &str, #[case] expected: AgentCapability) {
        assert_eq!(AgentCapability::parse(input).unwrap(), expected);
    }

    #[test]
    fn test_capability_parse_rejects_unknown() {
        let err = AgentCapability::parse("Telepathy").unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_register_profile_targets_profile_manager() {
        let bus = MockBus::new();
        let profile = ObjectPath::new("/org/node/bluez");

        register_profile(&bus, &profile, AVRCP_UUID, &ProfileOptions::avrcp(Role::Client))
            .await
            .unwrap();

        let calls = bus.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, ObjectPath::root());
        assert_eq!(calls[0].interface, PROFILE_MANAGER);
        assert_eq!(calls[0].method, "RegisterProfile");
        assert_eq!(calls[0].args[0], json!("/org/node/bluez"));
        assert_eq!(calls[0].args[1], json!(AVRCP_UUID));
        assert_eq!(calls[0].args[2]["Role"], json!("client"));
    }

    #[tokio::test]
    async fn test_register_agent_sends_capability_string() {
        let bus = MockBus::new();
        let agent = ObjectPath::new("/org/node/bluez");

        register_agent(&bus, &agent, AgentCapability::NoInputNoOutput)
            .await
            .unwrap();

        let calls = bus.calls();
        assert_eq!(calls[0].interface, AGENT_MANAGER);
        assert_eq!(calls[0].method, "RegisterAgent");
        assert_eq!(calls[0].args[1], json!("NoInputNoOutput"));
    }

    #[tokio::test]
    async fn test_registration_failure_propagates() {
        let bus = MockBus::new();
        bus.fail_method("RegisterAgent", "org.bluez.Error.AlreadyExists");

        let err = register_agent(&bus, &ObjectPath::new("/a"), AgentCapability::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MethodCall { .. }));
    }
}
