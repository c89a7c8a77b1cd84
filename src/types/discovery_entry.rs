//! Discovery entries: the metadata describing a registered provider.

use serde::{Deserialize, Serialize};

use super::address::Address;
use crate::errors::RuntimeError;

/// Visibility of a registered provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderScope {
    /// Visible only to consumers attached to this node.
    Local,
    /// Published to the global capabilities directory.
    Global,
}

impl Default for ProviderScope {
    fn default() -> Self {
        ProviderScope::Global
    }
}

/// A named provider-side QoS parameter, e.g. the arbitration keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomParameter {
    pub name: String,
    pub value: String,
}

impl CustomParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Provider quality-of-service settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQos {
    #[serde(default)]
    pub custom_parameters: Vec<CustomParameter>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub scope: ProviderScope,
    #[serde(default)]
    pub supports_on_change_subscriptions: bool,
}

impl ProviderQos {
    /// Value of the custom parameter called `name`, if present.
    pub fn custom_parameter(&self, name: &str) -> Option<&str> {
        self.custom_parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// Interface version implemented by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub major_version: i32,
    pub minor_version: i32,
}

impl Version {
    pub fn new(major_version: i32, minor_version: i32) -> Self {
        Self {
            major_version,
            minor_version,
        }
    }
}

/// Metadata describing one registered provider instance.
///
/// `participant_id` is the unique key in every store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEntry {
    pub provider_version: Version,
    pub domain: String,
    pub interface_name: String,
    pub participant_id: String,
    pub qos: ProviderQos,
    pub last_seen_date_ms: i64,
    pub expiry_date_ms: i64,
    #[serde(default)]
    pub public_key_id: String,
}

impl DiscoveryEntry {
    /// Create an entry last seen now and expiring after `expiry_interval_ms`.
    pub fn new(
        domain: impl Into<String>,
        interface_name: impl Into<String>,
        participant_id: impl Into<String>,
        qos: ProviderQos,
        expiry_interval_ms: i64,
    ) -> Self {
        let now = super::now_ms();
        Self {
            provider_version: Version::default(),
            domain: domain.into(),
            interface_name: interface_name.into(),
            participant_id: participant_id.into(),
            qos,
            last_seen_date_ms: now,
            expiry_date_ms: now.saturating_add(expiry_interval_ms.max(0)),
            public_key_id: String::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.provider_version = version;
        self
    }

    pub fn scope(&self) -> ProviderScope {
        self.qos.scope
    }

    /// Whether `other` describes the same registration, ignoring freshness
    /// timestamps.
    pub fn same_registration(&self, other: &DiscoveryEntry) -> bool {
        self.participant_id == other.participant_id
            && self.domain == other.domain
            && self.interface_name == other.interface_name
            && self.provider_version == other.provider_version
            && self.qos == other.qos
            && self.public_key_id == other.public_key_id
    }
}

/// A discovery entry as stored in the global directory: the entry plus the
/// serialized transport address of the node hosting the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDiscoveryEntry {
    #[serde(flatten)]
    pub entry: DiscoveryEntry,
    pub address: String,
}

impl GlobalDiscoveryEntry {
    pub fn from_entry(entry: DiscoveryEntry, address: &Address) -> Result<Self, RuntimeError> {
        Ok(Self {
            entry,
            address: address.to_serialized()?,
        })
    }

    pub fn participant_id(&self) -> &str {
        &self.entry.participant_id
    }

    /// Decoded transport address.
    pub fn decoded_address(&self) -> Result<Address, RuntimeError> {
        Address::from_serialized(&self.address)
    }
}

/// Lookup result handed to consumers: the entry plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEntryWithMetaInfo {
    #[serde(flatten)]
    pub entry: DiscoveryEntry,
    /// `true` when the provider is registered on this node.
    pub is_local: bool,
    /// Serialized address for remote providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl DiscoveryEntryWithMetaInfo {
    pub fn local(entry: DiscoveryEntry) -> Self {
        Self {
            entry,
            is_local: true,
            address: None,
        }
    }

    pub fn remote(global: GlobalDiscoveryEntry) -> Self {
        Self {
            entry: global.entry,
            is_local: false,
            address: Some(global.address),
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.entry.participant_id
    }

    /// Local providers are reachable in-process; remote ones need an address.
    pub fn has_usable_address(&self) -> bool {
        self.is_local || self.address.as_deref().map_or(false, |a| !a.is_empty())
    }
}
