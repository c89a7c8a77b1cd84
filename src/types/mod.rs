//! Core data model shared by every layer of the discovery core.

pub mod address;
pub mod discovery_entry;
pub mod discovery_qos;
pub mod message;

pub use address::Address;
pub use discovery_entry::{
    CustomParameter, DiscoveryEntry, DiscoveryEntryWithMetaInfo, GlobalDiscoveryEntry,
    ProviderQos, ProviderScope, Version,
};
pub use discovery_qos::{ArbitrationStrategy, DiscoveryQos, DiscoveryScope, NO_MAX_AGE};
pub use message::{ImmutableMessage, MessageType};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a fresh participant id.
pub fn new_participant_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
