//! Discovery-side seams used by arbitration and access control.

use async_trait::async_trait;

use crate::errors::DiscoveryFailure;
use crate::types::{DiscoveryEntry, DiscoveryEntryWithMetaInfo, DiscoveryQos};

/// Lookup capability of a capabilities directory.
#[async_trait]
pub trait DiscoveryLookup: Send + Sync {
    /// Providers of `interface_name` in any of `domains`. An empty `gbids`
    /// slice means "all known backends".
    async fn lookup(
        &self,
        domains: &[String],
        interface_name: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure>;

    /// The provider registered as `participant_id`. `Ok(None)` is only
    /// returned for local-only lookups that found nothing.
    async fn lookup_participant(
        &self,
        participant_id: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, DiscoveryFailure>;
}

/// Observer of providers appearing in or leaving the local store.
pub trait CapabilityListener: Send + Sync {
    fn capability_added(&self, entry: &DiscoveryEntry);

    fn capability_removed(&self, entry: &DiscoveryEntry);
}
