//! The remote global capabilities directory service.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::DiscoveryFailure;
use crate::types::GlobalDiscoveryEntry;

/// Custom header naming the backend a call is routed to.
pub const GBID_HEADER: &str = "gbid";

/// Per-call messaging parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub ttl_ms: u64,
    pub custom_headers: HashMap<String, String>,
}

impl CallContext {
    /// A context routed to `gbid`.
    pub fn for_gbid(gbid: &str, ttl_ms: u64) -> Self {
        let mut custom_headers = HashMap::new();
        custom_headers.insert(GBID_HEADER.to_string(), gbid.to_string());
        Self {
            ttl_ms,
            custom_headers,
        }
    }

    pub fn gbid(&self) -> Option<&str> {
        self.custom_headers.get(GBID_HEADER).map(String::as_str)
    }
}

/// Remote registry shared by all nodes of one or more backends.
///
/// Every call may fail with a runtime error or a modeled [`DiscoveryError`](crate::errors::DiscoveryError).
#[async_trait]
pub trait GlobalCapabilitiesDirectory: Send + Sync {
    async fn add(
        &self,
        entry: GlobalDiscoveryEntry,
        gbids: &[String],
        ctx: CallContext,
    ) -> Result<(), DiscoveryFailure>;

    async fn remove(
        &self,
        participant_id: &str,
        gbids: &[String],
        ctx: CallContext,
    ) -> Result<(), DiscoveryFailure>;

    async fn lookup_participant(
        &self,
        participant_id: &str,
        gbids: &[String],
        ctx: CallContext,
    ) -> Result<GlobalDiscoveryEntry, DiscoveryFailure>;

    /// `Ok(None)` models a server answering with a null array.
    async fn lookup(
        &self,
        domains: &[String],
        interface_name: &str,
        gbids: &[String],
        ctx: CallContext,
    ) -> Result<Option<Vec<GlobalDiscoveryEntry>>, DiscoveryFailure>;

    async fn touch(
        &self,
        cluster_controller_id: &str,
        participant_ids: &[String],
        ctx: CallContext,
    ) -> Result<(), DiscoveryFailure>;

    async fn remove_stale(
        &self,
        cluster_controller_id: &str,
        max_last_seen_date_ms: i64,
        ctx: CallContext,
    ) -> Result<(), DiscoveryFailure>;
}
