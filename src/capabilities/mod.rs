//! # Capabilities
//!
//! Registry of providers known to this node.
//!
//! ## Architecture
//!
//! Two [`DiscoveryEntryStore`]s back the [`LocalCapabilitiesDirectory`]:
//! the local store holds providers registered on this node, the global cache
//! holds entries learned from (or pushed to) the global directory. The
//! [`GlobalDirectoryClient`] wraps the remote service and tags every call
//! with the backend (gbid) it is meant for. An [`ExpiredEntryCleaner`] sweeps
//! both stores periodically.
//!
//! ## Registration Flow
//!
//! 1. `add(entry)` inserts into the local store and notifies listeners
//! 2. LOCAL providers are done; GLOBAL providers continue with global registration
//! 3. Without a transport address the registration is queued until `transport_ready`
//! 4. On success the entry lands in the global cache and the gbid map

pub mod cleaner;
pub mod directory;
pub mod global_client;
pub mod provisioning;
pub mod store;

pub use cleaner::{CleanupAction, ExpiredEntryCleaner};
pub use directory::{LocalCapabilitiesDirectory, GLOBAL_CAPABILITIES_DIRECTORY_INTERFACE};
pub use global_client::GlobalDirectoryClient;
pub use provisioning::{load_provisioned_directory, load_provisioned_entries};
pub use store::{DiscoveryEntryStore, ExpirySource, StoredEntry};
