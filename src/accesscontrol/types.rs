//! Access control entries and the enums they are built from.

use serde::{Deserialize, Serialize};

/// Matches any user, operation, or (as suffix) domain and interface prefix.
pub const WILDCARD: &str = "*";

/// Permission granted to a consumer. Ordered `No < Ask < Yes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    No,
    Ask,
    Yes,
}

/// Trust placed in a message or required by an entry. Ordered `Low < Mid < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Master,
    Owner,
}

/// Identity of an access control entry inside its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AceKey {
    pub uid: String,
    pub domain: String,
    pub interface_name: String,
    pub operation: String,
}

impl AceKey {
    pub fn new(
        uid: impl Into<String>,
        domain: impl Into<String>,
        interface_name: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            domain: domain.into(),
            interface_name: interface_name.into(),
            operation: operation.into(),
        }
    }
}

/// Entries stored in an access control table.
pub trait ControlEntry: Clone {
    fn key(&self) -> AceKey;
}

/// Master entry. Also used for the mediator tier, which may only narrow
/// what the master allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterAccessControlEntry {
    pub uid: String,
    pub domain: String,
    pub interface_name: String,
    pub default_required_trust_level: TrustLevel,
    pub possible_required_trust_levels: Vec<TrustLevel>,
    pub default_required_control_entry_change_trust_level: TrustLevel,
    pub possible_required_control_entry_change_trust_levels: Vec<TrustLevel>,
    pub operation: String,
    pub default_consumer_permission: Permission,
    pub possible_consumer_permissions: Vec<Permission>,
}

impl MasterAccessControlEntry {
    /// Entry allowing every permission and trust level, defaulting to
    /// `default_consumer_permission` at `default_required_trust_level`.
    pub fn new(
        uid: impl Into<String>,
        domain: impl Into<String>,
        interface_name: impl Into<String>,
        operation: impl Into<String>,
        default_consumer_permission: Permission,
        default_required_trust_level: TrustLevel,
    ) -> Self {
        let all_trust_levels = vec![TrustLevel::Low, TrustLevel::Mid, TrustLevel::High];
        Self {
            uid: uid.into(),
            domain: domain.into(),
            interface_name: interface_name.into(),
            default_required_trust_level,
            possible_required_trust_levels: all_trust_levels.clone(),
            default_required_control_entry_change_trust_level: TrustLevel::Low,
            possible_required_control_entry_change_trust_levels: all_trust_levels,
            operation: operation.into(),
            default_consumer_permission,
            possible_consumer_permissions: vec![Permission::No, Permission::Ask, Permission::Yes],
        }
    }

    pub fn with_possible_consumer_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.possible_consumer_permissions = permissions;
        self
    }

    pub fn with_possible_required_trust_levels(mut self, trust_levels: Vec<TrustLevel>) -> Self {
        self.possible_required_trust_levels = trust_levels;
        self
    }
}

impl ControlEntry for MasterAccessControlEntry {
    fn key(&self) -> AceKey {
        AceKey::new(&self.uid, &self.domain, &self.interface_name, &self.operation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAccessControlEntry {
    pub uid: String,
    pub domain: String,
    pub interface_name: String,
    pub required_trust_level: TrustLevel,
    pub required_ace_change_trust_level: TrustLevel,
    pub operation: String,
    pub consumer_permission: Permission,
}

impl OwnerAccessControlEntry {
    pub fn new(
        uid: impl Into<String>,
        domain: impl Into<String>,
        interface_name: impl Into<String>,
        operation: impl Into<String>,
        consumer_permission: Permission,
        required_trust_level: TrustLevel,
    ) -> Self {
        Self {
            uid: uid.into(),
            domain: domain.into(),
            interface_name: interface_name.into(),
            required_trust_level,
            required_ace_change_trust_level: TrustLevel::Low,
            operation: operation.into(),
            consumer_permission,
        }
    }
}

impl ControlEntry for OwnerAccessControlEntry {
    fn key(&self) -> AceKey {
        AceKey::new(&self.uid, &self.domain, &self.interface_name, &self.operation)
    }
}

/// Domains in which a user holds a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRoleEntry {
    pub uid: String,
    pub domains: Vec<String>,
    pub role: Role,
}

impl DomainRoleEntry {
    pub fn new(uid: impl Into<String>, domains: Vec<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            domains,
            role,
        }
    }
}
