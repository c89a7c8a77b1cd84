//! # Access Control
//!
//! Decides whether a consumer may call a provider. Entries come in three
//! tiers: master, mediator and owner. The [`AccessControlAlgorithm`] combines
//! them, the [`DomainAccessControlStore`] holds them and the
//! [`AccessController`] applies them to incoming messages.

pub mod algorithm;
pub mod controller;
pub mod store;
pub mod types;
pub mod validator;

pub use algorithm::AccessControlAlgorithm;
pub use controller::{AccessController, ConsumerPermission, DISCOVERY_INTERFACE, ROUTING_INTERFACE};
pub use store::{AclChange, DomainAccessControlStore};
pub use types::{
    AceKey, ControlEntry, DomainRoleEntry, MasterAccessControlEntry, OwnerAccessControlEntry, Permission, Role,
    TrustLevel, WILDCARD,
};
pub use validator::AceValidator;
