//! Client wrapper around the remote global capabilities directory.
//!
//! Each call is tagged with the gbid of the backend that should serve it; the
//! transport reads the `gbid` custom header to pick the backend instance.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::config::DiscoverySettings;
use crate::errors::{DiscoveryFailure, RuntimeError};
use crate::interfaces::{CallContext, GlobalCapabilitiesDirectory};
use crate::types::GlobalDiscoveryEntry;

pub struct GlobalDirectoryClient {
    proxy: Arc<dyn GlobalCapabilitiesDirectory>,
    cluster_controller_id: String,
    freshness_update_interval_ms: u64,
    remove_stale_ttl_ms: u64,
}

impl GlobalDirectoryClient {
    pub fn new(proxy: Arc<dyn GlobalCapabilitiesDirectory>, settings: &DiscoverySettings) -> Self {
        Self {
            proxy,
            cluster_controller_id: settings.cluster_controller_id.clone(),
            freshness_update_interval_ms: settings.freshness_update_interval_ms,
            remove_stale_ttl_ms: settings.remove_stale_ttl_ms,
        }
    }

    /// Register `entry` in `gbids`, routed through the first one.
    pub async fn add(
        &self,
        entry: GlobalDiscoveryEntry,
        gbids: &[String],
        ttl_ms: u64,
    ) -> Result<(), DiscoveryFailure> {
        let ctx = CallContext::for_gbid(first_gbid(gbids, "add")?, ttl_ms);
        self.proxy.add(entry, gbids, ctx).await
    }

    /// Remove `participant_id` from `gbids`.
    ///
    /// An empty `gbids` slice is a caller bug and is rejected before any
    /// call is made; otherwise the returned future performs the call.
    pub fn remove(
        &self,
        participant_id: &str,
        gbids: &[String],
        ttl_ms: u64,
    ) -> Result<BoxFuture<'static, Result<(), DiscoveryFailure>>, DiscoveryFailure> {
        let ctx = CallContext::for_gbid(first_gbid(gbids, "remove")?, ttl_ms);
        let proxy = self.proxy.clone();
        let participant_id = participant_id.to_string();
        let gbids = gbids.to_vec();
        Ok(async move { proxy.remove(&participant_id, &gbids, ctx).await }.boxed())
    }

    pub async fn lookup_participant(
        &self,
        participant_id: &str,
        gbids: &[String],
        ttl_ms: u64,
    ) -> Result<GlobalDiscoveryEntry, DiscoveryFailure> {
        let ctx = CallContext::for_gbid(first_gbid(gbids, "lookup")?, ttl_ms);
        self.proxy.lookup_participant(participant_id, gbids, ctx).await
    }

    /// Bulk lookup; a null answer from the server becomes an empty list.
    pub async fn lookup(
        &self,
        domains: &[String],
        interface_name: &str,
        gbids: &[String],
        ttl_ms: u64,
    ) -> Result<Vec<GlobalDiscoveryEntry>, DiscoveryFailure> {
        let ctx = CallContext::for_gbid(first_gbid(gbids, "lookup")?, ttl_ms);
        let entries = self.proxy.lookup(domains, interface_name, gbids, ctx).await?;
        Ok(entries.unwrap_or_default())
    }

    /// Refresh the last-seen date of `participant_ids` in `gbid`.
    pub async fn touch(&self, participant_ids: &[String], gbid: &str) -> Result<(), DiscoveryFailure> {
        let ctx = CallContext::for_gbid(gbid, self.freshness_update_interval_ms);
        self.proxy
            .touch(&self.cluster_controller_id, participant_ids, ctx)
            .await
    }

    /// Drop every entry of this node last seen before `max_last_seen_date_ms`.
    pub async fn remove_stale(&self, max_last_seen_date_ms: i64, gbid: &str) -> Result<(), DiscoveryFailure> {
        let ctx = CallContext::for_gbid(gbid, self.remove_stale_ttl_ms);
        self.proxy
            .remove_stale(&self.cluster_controller_id, max_last_seen_date_ms, ctx)
            .await
    }
}

fn first_gbid<'a>(gbids: &'a [String], operation: &str) -> Result<&'a str, DiscoveryFailure> {
    gbids.first().map(String::as_str).ok_or_else(|| {
        RuntimeError::IllegalArgument(format!("{}: gbids must not be empty", operation)).into()
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::DiscoveryError;
    use crate::types::{Address, DiscoveryEntry, ProviderQos};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Recording fake of the remote directory, shared with the directory tests.
    #[derive(Default)]
    pub(crate) struct FakeGlobalDirectory {
        pub calls: Mutex<Vec<(String, String, Option<String>)>>,
        pub ttls: Mutex<Vec<(String, u64)>>,
        pub added_gbids: Mutex<Vec<Vec<String>>>,
        pub entries: Mutex<Vec<GlobalDiscoveryEntry>>,
        pub add_error: Mutex<Option<DiscoveryFailure>>,
        pub lookup_returns_null: Mutex<bool>,
    }

    impl FakeGlobalDirectory {
        fn record(&self, op: &str, arg: &str, ctx: &CallContext) {
            self.calls
                .lock()
                .push((op.to_string(), arg.to_string(), ctx.gbid().map(String::from)));
            self.ttls.lock().push((op.to_string(), ctx.ttl_ms));
        }

        pub fn ttls_of(&self, op: &str) -> Vec<u64> {
            self.ttls
                .lock()
                .iter()
                .filter(|(o, _)| o == op)
                .map(|(_, ttl)| *ttl)
                .collect()
        }

        pub fn calls_of(&self, op: &str) -> Vec<(String, Option<String>)> {
            self.calls
                .lock()
                .iter()
                .filter(|(o, _, _)| o == op)
                .map(|(_, arg, gbid)| (arg.clone(), gbid.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl GlobalCapabilitiesDirectory for FakeGlobalDirectory {
        async fn add(
            &self,
            entry: GlobalDiscoveryEntry,
            gbids: &[String],
            ctx: CallContext,
        ) -> Result<(), DiscoveryFailure> {
            self.record("add", entry.participant_id(), &ctx);
            self.added_gbids.lock().push(gbids.to_vec());
            if let Some(err) = self.add_error.lock().clone() {
                return Err(err);
            }
            self.entries.lock().push(entry);
            Ok(())
        }

        async fn remove(
            &self,
            participant_id: &str,
            _gbids: &[String],
            ctx: CallContext,
        ) -> Result<(), DiscoveryFailure> {
            self.record("remove", participant_id, &ctx);
            self.entries.lock().retain(|e| e.participant_id() != participant_id);
            Ok(())
        }

        async fn lookup_participant(
            &self,
            participant_id: &str,
            _gbids: &[String],
            ctx: CallContext,
        ) -> Result<GlobalDiscoveryEntry, DiscoveryFailure> {
            self.record("lookup_participant", participant_id, &ctx);
            self.entries
                .lock()
                .iter()
                .find(|e| e.participant_id() == participant_id)
                .cloned()
                .ok_or(DiscoveryFailure::Modeled(DiscoveryError::NoEntryForParticipant))
        }

        async fn lookup(
            &self,
            domains: &[String],
            interface_name: &str,
            _gbids: &[String],
            ctx: CallContext,
        ) -> Result<Option<Vec<GlobalDiscoveryEntry>>, DiscoveryFailure> {
            self.record("lookup", interface_name, &ctx);
            if *self.lookup_returns_null.lock() {
                return Ok(None);
            }
            Ok(Some(
                self.entries
                    .lock()
                    .iter()
                    .filter(|e| e.entry.interface_name == interface_name && domains.contains(&e.entry.domain))
                    .cloned()
                    .collect(),
            ))
        }

        async fn touch(
            &self,
            _cluster_controller_id: &str,
            participant_ids: &[String],
            ctx: CallContext,
        ) -> Result<(), DiscoveryFailure> {
            self.record("touch", &participant_ids.join(","), &ctx);
            Ok(())
        }

        async fn remove_stale(
            &self,
            _cluster_controller_id: &str,
            max_last_seen_date_ms: i64,
            ctx: CallContext,
        ) -> Result<(), DiscoveryFailure> {
            self.record("remove_stale", &max_last_seen_date_ms.to_string(), &ctx);
            Ok(())
        }
    }

    fn client(fake: Arc<FakeGlobalDirectory>) -> GlobalDirectoryClient {
        GlobalDirectoryClient::new(fake, &DiscoverySettings::default())
    }

    fn global_entry(pid: &str) -> GlobalDiscoveryEntry {
        let entry = DiscoveryEntry::new("dom", "vehicle/Radio", pid, ProviderQos::default(), 60_000);
        let address = Address::Mqtt {
            broker_uri: "gbid-a".into(),
            topic: "t".into(),
        };
        GlobalDiscoveryEntry::from_entry(entry, &address).unwrap()
    }

    #[test]
    fn test_remove_with_empty_gbids_fails_synchronously() {
        let fake = Arc::new(FakeGlobalDirectory::default());
        let result = client(fake.clone()).remove("p1", &[], 1_000);

        assert!(matches!(
            result,
            Err(DiscoveryFailure::Runtime(RuntimeError::IllegalArgument(_)))
        ));
        assert!(fake.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_add_routes_through_first_gbid() {
        let fake = Arc::new(FakeGlobalDirectory::default());
        let gbids = vec!["gbid-b".to_string(), "gbid-a".to_string()];
        client(fake.clone()).add(global_entry("p1"), &gbids, 1_000).await.unwrap();

        assert_eq!(fake.calls_of("add"), vec![("p1".to_string(), Some("gbid-b".to_string()))]);
    }

    #[tokio::test]
    async fn test_null_lookup_result_becomes_empty() {
        let fake = Arc::new(FakeGlobalDirectory::default());
        *fake.lookup_returns_null.lock() = true;
        let found = client(fake)
            .lookup(&["dom".to_string()], "vehicle/Radio", &["gbid-a".to_string()], 1_000)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_modeled_errors_pass_through() {
        let fake = Arc::new(FakeGlobalDirectory::default());
        let err = client(fake)
            .lookup_participant("unknown", &["gbid-a".to_string()], 1_000)
            .await
            .unwrap_err();
        assert_eq!(err.discovery_error(), Some(DiscoveryError::NoEntryForParticipant));
    }

    #[tokio::test]
    async fn test_touch_and_remove_stale_use_given_gbid() {
        let fake = Arc::new(FakeGlobalDirectory::default());
        let settings = DiscoverySettings {
            freshness_update_interval_ms: 120_000,
            global_directory_call_ttl_ms: 5_000,
            ..Default::default()
        };
        let client = GlobalDirectoryClient::new(fake.clone(), &settings);
        client.touch(&["p1".to_string(), "p2".to_string()], "gbid-c").await.unwrap();
        client.remove_stale(42, "gbid-c").await.unwrap();

        assert_eq!(fake.calls_of("touch"), vec![("p1,p2".to_string(), Some("gbid-c".to_string()))]);
        assert_eq!(fake.calls_of("remove_stale"), vec![("42".to_string(), Some("gbid-c".to_string()))]);
        // touch lives as long as one freshness period, removeStale always one hour
        assert_eq!(fake.ttls_of("touch"), vec![120_000]);
        assert_eq!(fake.ttls_of("remove_stale"), vec![3_600_000]);
    }
}
