//! Error types shared by the discovery, arbitration and access-control layers.
//!
//! Remote operations can fail in two distinct ways: a generic runtime failure
//! (transport problems, timeouts, shutdown) or a modeled [`DiscoveryError`]
//! returned by the directory service itself. [`DiscoveryFailure`] keeps the
//! two channels apart so callers can react to each one separately.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Modeled errors reported by the local or global capabilities directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryError {
    /// No provider is registered for the requested participant id.
    #[error("no entry for participant")]
    NoEntryForParticipant,

    /// A provider exists, but not in any of the selected backends.
    #[error("no entry for selected backends")]
    NoEntryForSelectedBackends,

    /// A gbid is well-formed but not one of the known backends.
    #[error("unknown gbid")]
    UnknownGbid,

    /// A gbid is empty, duplicated or otherwise malformed.
    #[error("invalid gbid")]
    InvalidGbid,

    /// The directory failed internally.
    #[error("internal error")]
    InternalError,
}

/// Generic, non-modeled runtime failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Shutting down: {0}")]
    Shutdown(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Serialization(err.to_string())
    }
}

/// Outcome of a failed directory call: either a runtime failure or a modeled error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryFailure {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("discovery error: {0}")]
    Modeled(#[from] DiscoveryError),
}

impl DiscoveryFailure {
    /// The modeled error, if this failure carries one.
    pub fn discovery_error(&self) -> Option<DiscoveryError> {
        match self {
            DiscoveryFailure::Modeled(err) => Some(*err),
            DiscoveryFailure::Runtime(_) => None,
        }
    }
}

/// Error returned to providers registering or unregistering themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Error registering provider {participant_id} in default backend: {error}")]
    Registration {
        participant_id: String,
        error: DiscoveryError,
    },

    #[error("Failed to remove participantId: {0}")]
    UnknownParticipant(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Terminal failure of an arbitration, delivered to its listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbitrationError {
    #[error("Unable to find provider in time: interface: {interface_name} domains: {domains:?}")]
    NoProviderInTime {
        interface_name: String,
        domains: Vec<String>,
    },

    #[error("Unable to find provider due to DiscoveryError: {0}")]
    Discovery(DiscoveryError),

    /// The strategy rejected the candidate set (missing parameter, ambiguity).
    #[error("Arbitration strategy failed: {0}")]
    Strategy(String),

    #[error(transparent)]
    Runtime(RuntimeError),
}

/// Rejected access control store updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessControlError {
    #[error("Invalid access control entry: {0}")]
    InvalidEntry(String),

    #[error("No such access control entry: {0}")]
    NotFound(String),
}
