//! # joynr-discovery
//!
//! Capability discovery, provider arbitration and access control for a
//! joynr-style cluster controller.
//!
//! Providers register with the [`LocalCapabilitiesDirectory`], which keeps a
//! local store, caches entries of the global capabilities directory and
//! publishes GLOBAL providers to one or more backends (gbids). Consumers use
//! an [`Arbitrator`] to pick a provider, and incoming messages are checked by
//! the [`AccessController`] against master, mediator and owner access
//! control entries.

pub mod accesscontrol;
pub mod arbitration;
pub mod capabilities;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod promise;
pub mod types;

pub use accesscontrol::{AccessControlAlgorithm, AccessController, DomainAccessControlStore, Permission, TrustLevel};
pub use arbitration::{ArbitrationResult, ArbitrationStatus, Arbitrator};
pub use capabilities::{DiscoveryEntryStore, ExpiredEntryCleaner, GlobalDirectoryClient, LocalCapabilitiesDirectory};
pub use config::DiscoverySettings;
pub use errors::{ArbitrationError, DiscoveryError, DiscoveryFailure, ProviderError, RuntimeError};
pub use types::{
    Address, DiscoveryEntry, DiscoveryEntryWithMetaInfo, DiscoveryQos, DiscoveryScope, GlobalDiscoveryEntry,
    ProviderQos, ProviderScope,
};
