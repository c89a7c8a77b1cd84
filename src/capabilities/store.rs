//! In-memory discovery entry store keyed by participant id.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{now_ms, DiscoveryEntry, GlobalDiscoveryEntry};

/// Anything the store can hold: it must expose its discovery metadata.
pub trait StoredEntry: Clone + Send + Sync + 'static {
    fn discovery_entry(&self) -> &DiscoveryEntry;
}

impl StoredEntry for DiscoveryEntry {
    fn discovery_entry(&self) -> &DiscoveryEntry {
        self
    }
}

impl StoredEntry for GlobalDiscoveryEntry {
    fn discovery_entry(&self) -> &DiscoveryEntry {
        &self.entry
    }
}

/// Read access for the expired entry sweep, independent of the stored type.
pub trait ExpirySource: Send + Sync {
    fn all_discovery_entries(&self) -> Vec<DiscoveryEntry>;
}

/// Thread-safe registry of discovery entries.
///
/// A single coarse lock guards the map; cardinalities are small and every
/// operation is a short in-memory scan.
pub struct DiscoveryEntryStore<E: StoredEntry> {
    entries: RwLock<HashMap<String, E>>,
}

impl<E: StoredEntry> Default for DiscoveryEntryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StoredEntry> DiscoveryEntryStore<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the entry with the same participant id.
    pub fn add(&self, entry: E) {
        let participant_id = entry.discovery_entry().participant_id.clone();
        self.entries.write().insert(participant_id, entry);
    }

    pub fn add_all(&self, entries: impl IntoIterator<Item = E>) {
        let mut map = self.entries.write();
        for entry in entries {
            map.insert(entry.discovery_entry().participant_id.clone(), entry);
        }
    }

    /// Remove the entry for `participant_id`; returns it if it was present.
    pub fn remove(&self, participant_id: &str) -> Option<E> {
        self.entries.write().remove(participant_id)
    }

    /// The entry for `participant_id` unless it was last seen more than
    /// `max_age_ms` ago.
    pub fn lookup(&self, participant_id: &str, max_age_ms: i64) -> Option<E> {
        self.lookup_at(participant_id, max_age_ms, now_ms())
    }

    pub(crate) fn lookup_at(&self, participant_id: &str, max_age_ms: i64, now: i64) -> Option<E> {
        let map = self.entries.read();
        let entry = map.get(participant_id)?;
        if is_too_old(entry.discovery_entry(), max_age_ms, now) {
            return None;
        }
        Some(entry.clone())
    }

    /// All non-expired entries for `interface_name` in any of `domains`.
    pub fn lookup_by_interface(&self, domains: &[String], interface_name: &str) -> Vec<E> {
        self.collect_matching(domains, interface_name, None)
    }

    /// Like [`lookup_by_interface`](Self::lookup_by_interface), additionally
    /// skipping entries last seen more than `max_age_ms` ago.
    pub fn lookup_by_interface_with_max_age(
        &self,
        domains: &[String],
        interface_name: &str,
        max_age_ms: i64,
    ) -> Vec<E> {
        self.collect_matching(domains, interface_name, Some(max_age_ms))
    }

    fn collect_matching(&self, domains: &[String], interface_name: &str, max_age_ms: Option<i64>) -> Vec<E> {
        let now = now_ms();
        self.entries
            .read()
            .values()
            .filter(|e| {
                let entry = e.discovery_entry();
                entry.interface_name == interface_name
                    && domains.iter().any(|d| *d == entry.domain)
                    && entry.expiry_date_ms >= now
                    && max_age_ms.map_or(true, |age| !is_too_old(entry, age, now))
            })
            .cloned()
            .collect()
    }

    /// Whether an entry describing the same registration is stored.
    pub fn has_discovery_entry(&self, entry: &DiscoveryEntry) -> bool {
        self.entries
            .read()
            .get(&entry.participant_id)
            .map_or(false, |stored| stored.discovery_entry().same_registration(entry))
    }

    pub fn get_all_discovery_entries(&self) -> Vec<E> {
        self.entries.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<E: StoredEntry> ExpirySource for DiscoveryEntryStore<E> {
    fn all_discovery_entries(&self) -> Vec<DiscoveryEntry> {
        self.entries
            .read()
            .values()
            .map(|e| e.discovery_entry().clone())
            .collect()
    }
}

fn is_too_old(entry: &DiscoveryEntry, max_age_ms: i64, now: i64) -> bool {
    now.saturating_sub(entry.last_seen_date_ms) > max_age_ms
}
