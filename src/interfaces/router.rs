//! Routing-side collaborators.

use std::sync::Arc;

use crate::errors::RuntimeError;
use crate::types::Address;

/// Routing table of the node: where to physically deliver messages for a
/// participant.
pub trait MessageRouter: Send + Sync {
    fn add_next_hop(&self, participant_id: &str, address: &Address, is_globally_visible: bool);

    fn remove_next_hop(&self, participant_id: &str);
}

/// Notified once the local transport address becomes available.
pub trait TransportReadyListener: Send + Sync {
    fn transport_ready(&self, address: Address);
}

/// Source of this node's own globally reachable address.
pub trait GlobalAddressProvider: Send + Sync {
    /// The resolved address, or an error while the transport is not ready yet.
    fn get(&self) -> Result<Address, RuntimeError>;

    /// `listener` receives exactly one `transport_ready` call once the address
    /// is known.
    fn register_global_addresses_ready_listener(&self, listener: Arc<dyn TransportReadyListener>);
}
