//! Local capabilities directory: registration and lookup across the local
//! store, the global cache and the remote global directory.
//!
//! ```text
//! add(entry) ──► local store ──► (GLOBAL scope) registerGlobal
//!                                     │ address known?  no ──► queue until transport_ready
//!                                     ▼ yes
//!                               global client add ──► global cache + gbid map
//!
//! lookup(domains, interface, qos)
//!   LOCAL_ONLY        local store
//!   LOCAL_THEN_GLOBAL local store, else global cache, else remote (per domain)
//!   GLOBAL_ONLY       global cache, else remote (per domain)
//!   LOCAL_AND_GLOBAL  local store + global cache, remote for missing domains
//! ```
//!
//! Remote results are pushed into the message router before they are handed
//! to the caller, so a send to a freshly discovered participant can be routed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::cleaner::{CleanupAction, ExpiredEntryCleaner};
use super::global_client::GlobalDirectoryClient;
use super::store::{DiscoveryEntryStore, ExpirySource};
use crate::config::DiscoverySettings;
use crate::errors::{DiscoveryError, DiscoveryFailure, ProviderError, RuntimeError};
use crate::interfaces::{
    CapabilityListener, DiscoveryLookup, GlobalAddressProvider, GlobalCapabilitiesDirectory,
    MessageRouter, TransportReadyListener,
};
use crate::promise::{self, Deferred};
use crate::types::{
    Address, DiscoveryEntry, DiscoveryEntryWithMetaInfo, DiscoveryQos, DiscoveryScope,
    GlobalDiscoveryEntry, ProviderScope, NO_MAX_AGE,
};

/// Interface name of the global capabilities directory itself. Provisioned
/// entries for it are reachable through every known backend.
pub const GLOBAL_CAPABILITIES_DIRECTORY_INTERFACE: &str = "infrastructure/GlobalCapabilitiesDirectory";

/// A global registration waiting for the transport address.
struct QueuedRegistration {
    entry: DiscoveryEntry,
    gbids: Vec<String>,
    deferred: Deferred<(), DiscoveryFailure>,
    await_global: bool,
}

pub struct LocalCapabilitiesDirectory {
    self_ref: Weak<Self>,
    settings: DiscoverySettings,
    local_store: Arc<DiscoveryEntryStore<DiscoveryEntry>>,
    global_cache: Arc<DiscoveryEntryStore<GlobalDiscoveryEntry>>,
    global_client: GlobalDirectoryClient,
    message_router: Arc<dyn MessageRouter>,
    address_provider: Arc<dyn GlobalAddressProvider>,
    /// Guarded separately from the stores; taken before `queued_registrations`.
    global_address: Mutex<Option<Address>>,
    queued_registrations: Mutex<Vec<QueuedRegistration>>,
    /// Backends each globally registered provider lives in.
    participant_gbids: DashMap<String, Vec<String>>,
    listeners: RwLock<Vec<Arc<dyn CapabilityListener>>>,
    cleaner: ExpiredEntryCleaner,
    freshness_cancel: CancellationToken,
    freshness_task: Mutex<Option<JoinHandle<()>>>,
}

impl LocalCapabilitiesDirectory {
    /// Build a directory. `provisioned` entries (e.g. the global directory
    /// itself) go straight into the global cache and the routing table.
    /// Fails when `settings` do not validate.
    pub fn new(
        settings: DiscoverySettings,
        global_directory: Arc<dyn GlobalCapabilitiesDirectory>,
        message_router: Arc<dyn MessageRouter>,
        address_provider: Arc<dyn GlobalAddressProvider>,
        provisioned: Vec<GlobalDiscoveryEntry>,
    ) -> Result<Arc<Self>, RuntimeError> {
        settings.validate()?;
        let cleaner = ExpiredEntryCleaner::new(Duration::from_millis(settings.cleanup_interval_ms))?;
        let directory = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            global_client: GlobalDirectoryClient::new(global_directory, &settings),
            cleaner,
            settings,
            local_store: Arc::new(DiscoveryEntryStore::new()),
            global_cache: Arc::new(DiscoveryEntryStore::new()),
            message_router,
            address_provider,
            global_address: Mutex::new(None),
            queued_registrations: Mutex::new(Vec::new()),
            participant_gbids: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            freshness_cancel: CancellationToken::new(),
            freshness_task: Mutex::new(None),
        });
        directory.add_provisioned_entries(provisioned);
        Ok(directory)
    }

    fn add_provisioned_entries(&self, provisioned: Vec<GlobalDiscoveryEntry>) {
        for entry in &provisioned {
            let gbids = if entry.entry.interface_name == GLOBAL_CAPABILITIES_DIRECTORY_INTERFACE {
                self.settings.known_gbids.clone()
            } else {
                match entry.decoded_address() {
                    Ok(address) => vec![self.gbid_of(&address)],
                    Err(e) => {
                        log::error!(
                            "[LocalCapabilitiesDirectory] provisioned entry {} has an unreadable address: {}",
                            entry.participant_id(),
                            e
                        );
                        continue;
                    }
                }
            };
            self.map_gbids(entry.participant_id(), &gbids);
        }
        self.register_incoming_endpoints(&provisioned);
        self.global_cache.add_all(provisioned);
    }

    /// Start the expired entry sweep and the periodic freshness update.
    pub fn start(&self) {
        let weak = self.self_ref.clone();
        let action: CleanupAction = Arc::new(move |expired: HashSet<DiscoveryEntry>| {
            if let Some(directory) = weak.upgrade() {
                directory.remove_expired(expired.into_iter());
            }
        });
        self.cleaner.schedule_cleanup(
            action,
            vec![
                self.global_cache.clone() as Arc<dyn ExpirySource>,
                self.local_store.clone() as Arc<dyn ExpirySource>,
            ],
        );

        let period = Duration::from_millis(self.settings.freshness_update_interval_ms);
        let weak = self.self_ref.clone();
        let cancel = self.freshness_cancel.clone();
        log::trace!(
            "[LocalCapabilitiesDirectory] periodic freshness update every {}ms",
            self.settings.freshness_update_interval_ms
        );
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(directory) = weak.upgrade() else { break };
                        directory.touch_global_providers().await;
                    }
                }
            }
        });
        if let Some(previous) = self.freshness_task.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn add_capability_listener(&self, listener: Arc<dyn CapabilityListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_capability_listener(&self, listener: &Arc<dyn CapabilityListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a provider in the default backend without waiting for the
    /// global registration to finish.
    pub async fn add(&self, entry: DiscoveryEntry) -> Result<(), ProviderError> {
        self.add_awaiting(entry, false).await
    }

    /// Register a provider in the default backend.
    pub async fn add_awaiting(&self, entry: DiscoveryEntry, await_global: bool) -> Result<(), ProviderError> {
        let participant_id = entry.participant_id.clone();
        let default_gbid = vec![self.settings.default_gbid().to_string()];
        self.add_with_gbids(entry, await_global, &default_gbid)
            .await
            .map_err(|failure| match failure {
                DiscoveryFailure::Modeled(error) => ProviderError::Registration {
                    participant_id,
                    error,
                },
                DiscoveryFailure::Runtime(e) => ProviderError::Runtime(e),
            })
    }

    /// Register a provider in every known backend.
    pub async fn add_to_all(&self, entry: DiscoveryEntry, await_global: bool) -> Result<(), DiscoveryFailure> {
        let gbids = self.settings.known_gbids.clone();
        self.add_with_gbids(entry, await_global, &gbids).await
    }

    /// Register a provider in `gbids` (empty means the default backend).
    ///
    /// With `await_global` the call completes only once the global directory
    /// answered; a failed global registration then also removes the local
    /// entry. Without it the call completes right after the local insert.
    pub async fn add_with_gbids(
        &self,
        entry: DiscoveryEntry,
        await_global: bool,
        gbids: &[String],
    ) -> Result<(), DiscoveryFailure> {
        self.validate_gbids(gbids)?;
        let gbids = if gbids.is_empty() {
            vec![self.settings.default_gbid().to_string()]
        } else {
            gbids.to_vec()
        };

        if self.local_store.has_discovery_entry(&entry) {
            if entry.scope() == ProviderScope::Local {
                return Ok(());
            }
            if self.global_cache.lookup(&entry.participant_id, NO_MAX_AGE).is_some() {
                self.map_gbids(&entry.participant_id, &gbids);
                return Ok(());
            }
        } else {
            self.local_store.add(entry.clone());
            self.notify_added(&entry);
        }

        if entry.scope() != ProviderScope::Global {
            return Ok(());
        }

        let (deferred, promise) = promise::deferred();
        self.register_global(entry, gbids, deferred, await_global);
        if await_global {
            promise.await
        } else {
            Ok(())
        }
    }

    fn register_global(
        &self,
        entry: DiscoveryEntry,
        gbids: Vec<String>,
        deferred: Deferred<(), DiscoveryFailure>,
        await_global: bool,
    ) {
        let Some(directory) = self.self_ref.upgrade() else {
            deferred.reject(RuntimeError::Shutdown("capabilities directory dropped".into()).into());
            return;
        };

        let mut global_address = self.global_address.lock();
        if global_address.is_none() {
            match self.address_provider.get() {
                Ok(address) => *global_address = Some(address),
                Err(e) => log::debug!("[LocalCapabilitiesDirectory] global address not available: {}", e),
            }
        }
        if let Some(address) = global_address.clone() {
            let mut queue = self.queued_registrations.lock();
            if queue.is_empty() {
                drop(queue);
                drop(global_address);
                tokio::spawn(directory.perform_global_registration(entry, gbids, address, deferred, await_global));
            } else {
                // address resolved before transport_ready: keep submission order
                queue.push(QueuedRegistration {
                    entry,
                    gbids,
                    deferred,
                    await_global,
                });
                drop(queue);
                drop(global_address);
                self.drain_queue(address);
            }
            return;
        }

        log::debug!(
            "[LocalCapabilitiesDirectory] transport not ready, queueing global registration of {}",
            entry.participant_id
        );
        let first_in_queue = {
            let mut queue = self.queued_registrations.lock();
            let first_in_queue = queue.is_empty();
            queue.push(QueuedRegistration {
                entry,
                gbids,
                deferred,
                await_global,
            });
            first_in_queue
        };
        drop(global_address);
        if first_in_queue {
            self.address_provider
                .register_global_addresses_ready_listener(directory);
        }
    }

    async fn perform_global_registration(
        self: Arc<Self>,
        entry: DiscoveryEntry,
        gbids: Vec<String>,
        address: Address,
        deferred: Deferred<(), DiscoveryFailure>,
        await_global: bool,
    ) {
        let global_entry = match GlobalDiscoveryEntry::from_entry(entry, &address) {
            Ok(global_entry) => global_entry,
            Err(e) => {
                deferred.reject(e.into());
                return;
            }
        };
        let participant_id = global_entry.participant_id().to_string();
        log::info!(
            "[LocalCapabilitiesDirectory] starting global registration for {} : {}",
            global_entry.entry.domain,
            global_entry.entry.interface_name
        );

        match self
            .global_client
            .add(global_entry.clone(), &gbids, self.settings.global_directory_call_ttl_ms)
            .await
        {
            Ok(()) => {
                log::info!(
                    "[LocalCapabilitiesDirectory] global registration for {}, {} : {} completed",
                    participant_id,
                    global_entry.entry.domain,
                    global_entry.entry.interface_name
                );
                self.map_gbids(&participant_id, &gbids);
                self.global_cache.add(global_entry);
                deferred.resolve(());
            }
            Err(failure) => {
                log::info!(
                    "[LocalCapabilitiesDirectory] global registration for {}, {} : {} failed: {}",
                    participant_id,
                    global_entry.entry.domain,
                    global_entry.entry.interface_name,
                    failure
                );
                if await_global {
                    if let Some(removed) = self.local_store.remove(&participant_id) {
                        self.notify_removed(&removed);
                    }
                }
                let failure = match failure {
                    DiscoveryFailure::Runtime(e) => RuntimeError::Provider(e.to_string()).into(),
                    modeled => modeled,
                };
                deferred.reject(failure);
            }
        }
    }

    /// Drain the registration queue once the transport address is known.
    fn drain_queue(&self, address: Address) {
        let queued = {
            let mut global_address = self.global_address.lock();
            *global_address = Some(address.clone());
            std::mem::take(&mut *self.queued_registrations.lock())
        };
        if queued.is_empty() {
            return;
        }
        let Some(directory) = self.self_ref.upgrade() else { return };
        log::debug!(
            "[LocalCapabilitiesDirectory] transport ready, registering {} queued providers",
            queued.len()
        );
        tokio::spawn(async move {
            for queued in queued {
                directory
                    .clone()
                    .perform_global_registration(
                        queued.entry,
                        queued.gbids,
                        address.clone(),
                        queued.deferred,
                        queued.await_global,
                    )
                    .await;
            }
        });
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Unregister the provider with `participant_id`.
    pub fn remove(&self, participant_id: &str) -> Result<(), ProviderError> {
        match self.local_store.lookup(participant_id, NO_MAX_AGE) {
            Some(entry) => {
                self.remove_entry(&entry);
                Ok(())
            }
            None => Err(ProviderError::UnknownParticipant(participant_id.to_string())),
        }
    }

    /// Remove `entry` locally, fire a best-effort remote removal for
    /// non-local providers and drop its routing entry.
    pub fn remove_entry(&self, entry: &DiscoveryEntry) {
        let participant_id = entry.participant_id.as_str();
        self.local_store.remove(participant_id);
        self.notify_removed(entry);

        if entry.scope() != ProviderScope::Local {
            self.remove_globally(participant_id);
        }

        self.message_router.remove_next_hop(participant_id);
    }

    fn remove_globally(&self, participant_id: &str) {
        let Some(gbids) = self.participant_gbids.get(participant_id).map(|g| g.value().clone()) else {
            log::warn!(
                "[LocalCapabilitiesDirectory] participant {} is not registered globally and cannot be removed",
                participant_id
            );
            return;
        };
        let removal = match self.global_client.remove(
            participant_id,
            &gbids,
            self.settings.global_directory_call_ttl_ms,
        ) {
            Ok(removal) => removal,
            Err(e) => {
                log::warn!("[LocalCapabilitiesDirectory] cannot remove {}: {}", participant_id, e);
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(
                "[LocalCapabilitiesDirectory] no runtime, skipping global removal of {}",
                participant_id
            );
            return;
        };
        let weak = self.self_ref.clone();
        let participant_id = participant_id.to_string();
        runtime.spawn(async move {
            match removal.await {
                Ok(()) => {
                    if let Some(directory) = weak.upgrade() {
                        directory.global_cache.remove(&participant_id);
                        directory.participant_gbids.remove(&participant_id);
                    }
                }
                Err(e) => log::debug!(
                    "[LocalCapabilitiesDirectory] global removal of {} failed: {}",
                    participant_id,
                    e
                ),
            }
        });
    }

    fn remove_expired(&self, expired: impl Iterator<Item = DiscoveryEntry>) {
        for entry in expired {
            if self.local_store.lookup(&entry.participant_id, NO_MAX_AGE).is_some() {
                log::debug!("[LocalCapabilitiesDirectory] local entry {} expired", entry.participant_id);
                self.remove_entry(&entry);
            } else {
                self.global_cache.remove(&entry.participant_id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Providers of `interface_name` in `domains`, across all known backends.
    pub async fn lookup(
        &self,
        domains: &[String],
        interface_name: &str,
        qos: &DiscoveryQos,
    ) -> Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        self.lookup_with_gbids(domains, interface_name, qos, &[]).await
    }

    pub async fn lookup_with_gbids(
        &self,
        domains: &[String],
        interface_name: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        let gbids = self.resolve_gbids(gbids)?;
        let scope = qos.discovery_scope;

        let local: Vec<DiscoveryEntry> = if scope.includes_local() {
            self.local_store.lookup_by_interface(domains, interface_name)
        } else {
            Vec::new()
        };
        let local_with_meta: Vec<DiscoveryEntryWithMetaInfo> = local
            .iter()
            .cloned()
            .map(DiscoveryEntryWithMetaInfo::local)
            .collect();
        let cached: Vec<DiscoveryEntryWithMetaInfo> = if scope.includes_global() {
            self.global_cache
                .lookup_by_interface_with_max_age(domains, interface_name, qos.cache_max_age_ms)
                .into_iter()
                .filter(|entry| self.is_entry_for_gbids(entry, &gbids))
                .map(DiscoveryEntryWithMetaInfo::remote)
                .collect()
        } else {
            Vec::new()
        };

        let mut matched = Vec::new();
        let mut missing_domains = Vec::new();
        match scope {
            DiscoveryScope::LocalOnly => return Ok(local_with_meta),
            DiscoveryScope::LocalThenGlobal => {
                for domain in domains {
                    let domain_matched = add_entries_for_domain(&local_with_meta, &mut matched, domain)
                        || add_entries_for_domain(&cached, &mut matched, domain);
                    if !domain_matched {
                        missing_domains.push(domain.clone());
                    }
                }
            }
            DiscoveryScope::GlobalOnly => {
                for domain in domains {
                    if !add_entries_for_domain(&cached, &mut matched, domain) {
                        missing_domains.push(domain.clone());
                    }
                }
            }
            DiscoveryScope::LocalAndGlobal => {
                let cached_not_local: Vec<DiscoveryEntryWithMetaInfo> = cached
                    .iter()
                    .filter(|c| !local.contains(&c.entry))
                    .cloned()
                    .collect();
                for domain in domains {
                    add_entries_for_domain(&local_with_meta, &mut matched, domain);
                    add_entries_for_domain(&cached_not_local, &mut matched, domain);
                    if !cached.iter().any(|c| c.entry.domain == *domain) {
                        missing_domains.push(domain.clone());
                    }
                }
            }
        }

        if missing_domains.is_empty() {
            return Ok(matched);
        }
        self.lookup_remote(&missing_domains, interface_name, &gbids, qos, matched)
            .await
    }

    /// Remote bulk lookup; `merge` holds already matched entries appended to
    /// the remote result.
    async fn lookup_remote(
        &self,
        domains: &[String],
        interface_name: &str,
        gbids: &[String],
        qos: &DiscoveryQos,
        merge: Vec<DiscoveryEntryWithMetaInfo>,
    ) -> Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        let found = self
            .global_client
            .lookup(domains, interface_name, gbids, ttl_of(qos))
            .await?;
        self.register_incoming_endpoints(&found);
        self.global_cache.add_all(found.iter().cloned());

        let mut result: Vec<DiscoveryEntryWithMetaInfo> =
            found.into_iter().map(DiscoveryEntryWithMetaInfo::remote).collect();
        for entry in merge {
            push_unique(&mut result, entry);
        }
        Ok(result)
    }

    /// The provider registered as `participant_id`, across all known backends.
    pub async fn lookup_participant(
        &self,
        participant_id: &str,
        qos: &DiscoveryQos,
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        self.lookup_participant_with_gbids(participant_id, qos, &[]).await
    }

    pub async fn lookup_participant_with_gbids(
        &self,
        participant_id: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        let gbids = self.resolve_gbids(gbids)?;
        let local = self
            .local_store
            .lookup(participant_id, NO_MAX_AGE)
            .map(DiscoveryEntryWithMetaInfo::local);

        match qos.discovery_scope {
            DiscoveryScope::LocalOnly => Ok(local),
            DiscoveryScope::LocalThenGlobal | DiscoveryScope::LocalAndGlobal if local.is_some() => Ok(local),
            _ => self
                .lookup_participant_global(participant_id, qos, &gbids)
                .await
                .map(Some),
        }
    }

    async fn lookup_participant_global(
        &self,
        participant_id: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<DiscoveryEntryWithMetaInfo, DiscoveryFailure> {
        if let Some(cached) = self.global_cache.lookup(participant_id, qos.cache_max_age_ms) {
            if self.is_entry_for_gbids(&cached, gbids) {
                return Ok(DiscoveryEntryWithMetaInfo::remote(cached));
            }
        }

        let found = self
            .global_client
            .lookup_participant(participant_id, gbids, ttl_of(qos))
            .await?;
        self.register_incoming_endpoints(std::slice::from_ref(&found));
        self.global_cache.add(found.clone());
        if self.is_entry_for_gbids(&found, gbids) {
            Ok(DiscoveryEntryWithMetaInfo::remote(found))
        } else {
            Err(DiscoveryError::NoEntryForSelectedBackends.into())
        }
    }

    pub fn list_local_capabilities(&self) -> Vec<DiscoveryEntry> {
        self.local_store.get_all_discovery_entries()
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Refresh the last-seen date of every globally registered local
    /// provider, one call per backend.
    pub async fn touch_global_providers(&self) {
        let mut by_gbid: HashMap<String, Vec<String>> = HashMap::new();
        for entry in self.local_store.get_all_discovery_entries() {
            if entry.scope() != ProviderScope::Global {
                continue;
            }
            if let Some(gbids) = self.participant_gbids.get(&entry.participant_id) {
                for gbid in gbids.iter() {
                    by_gbid.entry(gbid.clone()).or_default().push(entry.participant_id.clone());
                }
            }
        }
        if by_gbid.is_empty() {
            return;
        }

        log::debug!("[LocalCapabilitiesDirectory] updating last seen date of global providers");
        let touches = by_gbid.iter().map(|(gbid, participant_ids)| async move {
            if let Err(e) = self.global_client.touch(participant_ids, gbid).await {
                log::error!("[LocalCapabilitiesDirectory] freshness update for {} failed: {}", gbid, e);
            }
        });
        join_all(touches).await;
    }

    /// Ask every known backend to drop this node's entries last seen before
    /// `max_last_seen_date_ms`.
    pub async fn remove_stale_providers(&self, max_last_seen_date_ms: i64) {
        let calls = self.settings.known_gbids.iter().map(|gbid| async move {
            match self.global_client.remove_stale(max_last_seen_date_ms, gbid).await {
                Ok(()) => log::info!(
                    "[LocalCapabilitiesDirectory] removed stale providers of backend {}",
                    gbid
                ),
                Err(e) => log::error!(
                    "[LocalCapabilitiesDirectory] removeStale for backend {} failed: {}",
                    gbid,
                    e
                ),
            }
        });
        join_all(calls).await;
    }

    /// Stop periodic tasks; optionally unregister every global provider.
    /// Remote failures are logged and ignored.
    pub async fn shutdown(&self, unregister_all: bool) {
        self.cleaner.shutdown();
        self.freshness_cancel.cancel();
        if let Some(task) = self.freshness_task.lock().take() {
            task.abort();
        }
        if !unregister_all {
            return;
        }

        let mut removals = Vec::new();
        for entry in self.local_store.get_all_discovery_entries() {
            if entry.scope() != ProviderScope::Global {
                continue;
            }
            let Some(gbids) = self.participant_gbids.get(&entry.participant_id).map(|g| g.value().clone()) else {
                continue;
            };
            match self.global_client.remove(
                &entry.participant_id,
                &gbids,
                self.settings.global_directory_call_ttl_ms,
            ) {
                Ok(removal) => removals.push(removal),
                Err(e) => log::debug!("[LocalCapabilitiesDirectory] error removing discovery entries: {}", e),
            }
        }
        for result in join_all(removals).await {
            if let Err(e) = result {
                log::debug!("[LocalCapabilitiesDirectory] error removing discovery entries: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn validate_gbids(&self, gbids: &[String]) -> Result<(), DiscoveryError> {
        let mut seen = Vec::with_capacity(gbids.len());
        for gbid in gbids {
            if gbid.is_empty() || seen.contains(&gbid) {
                return Err(DiscoveryError::InvalidGbid);
            }
            seen.push(gbid);
            if !self.settings.known_gbids.contains(gbid) {
                return Err(DiscoveryError::UnknownGbid);
            }
        }
        Ok(())
    }

    /// Validated lookup gbids; empty means every known backend.
    fn resolve_gbids(&self, gbids: &[String]) -> Result<Vec<String>, DiscoveryError> {
        self.validate_gbids(gbids)?;
        if gbids.is_empty() {
            Ok(self.settings.known_gbids.clone())
        } else {
            Ok(gbids.to_vec())
        }
    }

    fn gbid_of(&self, address: &Address) -> String {
        match address.gbid() {
            Some(gbid) => gbid.to_string(),
            None => self.settings.default_gbid().to_string(),
        }
    }

    fn map_gbids(&self, participant_id: &str, gbids: &[String]) {
        let mut known = self.participant_gbids.entry(participant_id.to_string()).or_default();
        for gbid in gbids {
            if !known.contains(gbid) {
                known.push(gbid.clone());
            }
        }
    }

    /// Whether a cached global entry is reachable through one of `gbids`.
    /// Providers registered from this node are checked against the gbid map,
    /// others against the backend encoded in their address.
    fn is_entry_for_gbids(&self, entry: &GlobalDiscoveryEntry, gbids: &[String]) -> bool {
        if let Some(backends) = self.participant_gbids.get(entry.participant_id()) {
            return gbids.iter().any(|g| backends.contains(g));
        }
        match entry.decoded_address() {
            Ok(address) => address.gbid().map_or(true, |gbid| gbids.iter().any(|g| g == gbid)),
            Err(e) => {
                log::error!(
                    "[LocalCapabilitiesDirectory] error reading address of {}: {}",
                    entry.participant_id(),
                    e
                );
                false
            }
        }
    }

    fn register_incoming_endpoints(&self, entries: &[GlobalDiscoveryEntry]) {
        for entry in entries {
            match entry.decoded_address() {
                Ok(address) => self.message_router.add_next_hop(
                    entry.participant_id(),
                    &address,
                    entry.entry.scope() == ProviderScope::Global,
                ),
                Err(e) => log::error!(
                    "[LocalCapabilitiesDirectory] cannot route {}: {}",
                    entry.participant_id(),
                    e
                ),
            }
        }
    }

    fn notify_added(&self, entry: &DiscoveryEntry) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.capability_added(entry);
        }
    }

    fn notify_removed(&self, entry: &DiscoveryEntry) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.capability_removed(entry);
        }
    }
}

impl TransportReadyListener for LocalCapabilitiesDirectory {
    fn transport_ready(&self, address: Address) {
        self.drain_queue(address);
    }
}

#[async_trait]
impl DiscoveryLookup for LocalCapabilitiesDirectory {
    async fn lookup(
        &self,
        domains: &[String],
        interface_name: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<Vec<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        self.lookup_with_gbids(domains, interface_name, qos, gbids).await
    }

    async fn lookup_participant(
        &self,
        participant_id: &str,
        qos: &DiscoveryQos,
        gbids: &[String],
    ) -> Result<Option<DiscoveryEntryWithMetaInfo>, DiscoveryFailure> {
        self.lookup_participant_with_gbids(participant_id, qos, gbids).await
    }
}

fn ttl_of(qos: &DiscoveryQos) -> u64 {
    u64::try_from(qos.discovery_timeout_ms).unwrap_or(0)
}

fn add_entries_for_domain(
    entries: &[DiscoveryEntryWithMetaInfo],
    matched: &mut Vec<DiscoveryEntryWithMetaInfo>,
    domain: &str,
) -> bool {
    let mut domain_matched = false;
    for entry in entries.iter().filter(|e| e.entry.domain == domain) {
        push_unique(matched, entry.clone());
        domain_matched = true;
    }
    domain_matched
}

fn push_unique(entries: &mut Vec<DiscoveryEntryWithMetaInfo>, entry: DiscoveryEntryWithMetaInfo) {
    if !entries.contains(&entry) {
        entries.push(entry);
    }
}
