//! Local copy of the domain access control lists.
//!
//! Master, mediator and owner entries live in separate tables keyed by
//! `(uid, domain, interface, operation)`. Lookups resolve wildcards in this
//! order: exact uid before `*`, exact operation before `*`, and finally
//! domain and interface patterns ending in `*`.
//!
//! The store is kept current by [`AclChange`] broadcasts from the domain
//! access controller, see [`DomainAccessControlStore::spawn_change_listener`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::types::{
    AceKey, ControlEntry, DomainRoleEntry, MasterAccessControlEntry, OwnerAccessControlEntry, Role, WILDCARD,
};
use super::validator::AceValidator;
use crate::errors::AccessControlError;

/// Change pushed by the domain access controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum AclChange {
    MasterUpdated(MasterAccessControlEntry),
    MasterRemoved(AceKey),
    MediatorUpdated(MasterAccessControlEntry),
    MediatorRemoved(AceKey),
    OwnerUpdated(OwnerAccessControlEntry),
    OwnerRemoved(AceKey),
    DomainRoleUpdated(DomainRoleEntry),
    DomainRoleRemoved { uid: String, role: Role },
}

#[derive(Default)]
struct AclTables {
    master: HashMap<AceKey, MasterAccessControlEntry>,
    mediator: HashMap<AceKey, MasterAccessControlEntry>,
    owner: HashMap<AceKey, OwnerAccessControlEntry>,
    domain_roles: HashMap<(String, Role), DomainRoleEntry>,
}

#[derive(Default)]
pub struct DomainAccessControlStore {
    tables: RwLock<AclTables>,
}

impl DomainAccessControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_master_access_control_entry(
        &self,
        uid: &str,
        domain: &str,
        interface_name: &str,
        operation: &str,
    ) -> Option<MasterAccessControlEntry> {
        find_entry(&self.tables.read().master, uid, domain, interface_name, operation)
    }

    pub fn get_mediator_access_control_entry(
        &self,
        uid: &str,
        domain: &str,
        interface_name: &str,
        operation: &str,
    ) -> Option<MasterAccessControlEntry> {
        find_entry(&self.tables.read().mediator, uid, domain, interface_name, operation)
    }

    pub fn get_owner_access_control_entry(
        &self,
        uid: &str,
        domain: &str,
        interface_name: &str,
        operation: &str,
    ) -> Option<OwnerAccessControlEntry> {
        find_entry(&self.tables.read().owner, uid, domain, interface_name, operation)
    }

    pub fn update_master_access_control_entry(
        &self,
        entry: MasterAccessControlEntry,
    ) -> Result<(), AccessControlError> {
        check_key(&entry.key())?;
        log::trace!("[DomainAccessControlStore] Master ACE updated: {:?}", entry.key());
        self.tables.write().master.insert(entry.key(), entry);
        Ok(())
    }

    /// Rejected when it offers more than the matching master entry.
    pub fn update_mediator_access_control_entry(
        &self,
        entry: MasterAccessControlEntry,
    ) -> Result<(), AccessControlError> {
        let key = entry.key();
        check_key(&key)?;
        let mut tables = self.tables.write();
        let master = find_entry(&tables.master, &key.uid, &key.domain, &key.interface_name, &key.operation);
        if !AceValidator::new(master.as_ref(), Some(&entry), None).is_mediator_valid() {
            return Err(AccessControlError::InvalidEntry(format!(
                "mediator entry {:?} exceeds master entry",
                key
            )));
        }
        log::trace!("[DomainAccessControlStore] Mediator ACE updated: {:?}", key);
        tables.mediator.insert(key, entry);
        Ok(())
    }

    /// Rejected when it picks values the mediator (or master) does not offer.
    pub fn update_owner_access_control_entry(
        &self,
        entry: OwnerAccessControlEntry,
    ) -> Result<(), AccessControlError> {
        let key = entry.key();
        check_key(&key)?;
        let mut tables = self.tables.write();
        let master = find_entry(&tables.master, &key.uid, &key.domain, &key.interface_name, &key.operation);
        let mediator = find_entry(&tables.mediator, &key.uid, &key.domain, &key.interface_name, &key.operation);
        if !AceValidator::new(master.as_ref(), mediator.as_ref(), Some(&entry)).is_owner_valid() {
            return Err(AccessControlError::InvalidEntry(format!(
                "owner entry {:?} exceeds mediator/master entries",
                key
            )));
        }
        log::trace!("[DomainAccessControlStore] Owner ACE updated: {:?}", key);
        tables.owner.insert(key, entry);
        Ok(())
    }

    pub fn remove_master_access_control_entry(&self, key: &AceKey) -> Result<MasterAccessControlEntry, AccessControlError> {
        self.tables
            .write()
            .master
            .remove(key)
            .ok_or_else(|| AccessControlError::NotFound(format!("master {:?}", key)))
    }

    pub fn remove_mediator_access_control_entry(
        &self,
        key: &AceKey,
    ) -> Result<MasterAccessControlEntry, AccessControlError> {
        self.tables
            .write()
            .mediator
            .remove(key)
            .ok_or_else(|| AccessControlError::NotFound(format!("mediator {:?}", key)))
    }

    pub fn remove_owner_access_control_entry(&self, key: &AceKey) -> Result<OwnerAccessControlEntry, AccessControlError> {
        self.tables
            .write()
            .owner
            .remove(key)
            .ok_or_else(|| AccessControlError::NotFound(format!("owner {:?}", key)))
    }

    pub fn update_domain_role(&self, entry: DomainRoleEntry) -> Result<(), AccessControlError> {
        if entry.uid.is_empty() {
            return Err(AccessControlError::InvalidEntry("domain role entry without uid".into()));
        }
        self.tables
            .write()
            .domain_roles
            .insert((entry.uid.clone(), entry.role), entry);
        Ok(())
    }

    pub fn remove_domain_role(&self, uid: &str, role: Role) -> Result<DomainRoleEntry, AccessControlError> {
        self.tables
            .write()
            .domain_roles
            .remove(&(uid.to_string(), role))
            .ok_or_else(|| AccessControlError::NotFound(format!("{:?} role of {}", role, uid)))
    }

    pub fn get_domain_role(&self, uid: &str, role: Role) -> Option<DomainRoleEntry> {
        self.tables.read().domain_roles.get(&(uid.to_string(), role)).cloned()
    }

    pub fn get_domain_roles(&self, uid: &str) -> Vec<DomainRoleEntry> {
        [Role::Master, Role::Owner]
            .into_iter()
            .filter_map(|role| self.get_domain_role(uid, role))
            .collect()
    }

    /// `true` if `uid` holds `role` in `domain` or in every domain (`*`).
    pub fn has_role(&self, uid: &str, domain: &str, role: Role) -> bool {
        self.get_domain_role(uid, role)
            .map_or(false, |entry| entry.domains.iter().any(|d| d == domain || d == WILDCARD))
    }

    /// Master entries in the domains where `uid` is master.
    pub fn editable_master_access_control_entries(&self, uid: &str) -> Vec<MasterAccessControlEntry> {
        let tables = self.tables.read();
        entries_in_role_domains(&tables, &tables.master, uid, Role::Master)
    }

    /// Owner entries in the domains where `uid` is owner.
    pub fn editable_owner_access_control_entries(&self, uid: &str) -> Vec<OwnerAccessControlEntry> {
        let tables = self.tables.read();
        entries_in_role_domains(&tables, &tables.owner, uid, Role::Owner)
    }

    /// `true` unless some tier holds operation-specific entries for this
    /// exact uid, domain and interface. Operation-level checks need the
    /// request payload, so callers decode it only when this is `false`.
    pub fn only_wildcard_operations(&self, uid: &str, domain: &str, interface_name: &str) -> bool {
        let tables = self.tables.read();
        only_wildcards(&tables.master, uid, domain, interface_name)
            && only_wildcards(&tables.mediator, uid, domain, interface_name)
            && only_wildcards(&tables.owner, uid, domain, interface_name)
    }

    pub fn apply_change(&self, change: AclChange) -> Result<(), AccessControlError> {
        match change {
            AclChange::MasterUpdated(entry) => self.update_master_access_control_entry(entry),
            AclChange::MasterRemoved(key) => self.remove_master_access_control_entry(&key).map(|_| ()),
            AclChange::MediatorUpdated(entry) => self.update_mediator_access_control_entry(entry),
            AclChange::MediatorRemoved(key) => self.remove_mediator_access_control_entry(&key).map(|_| ()),
            AclChange::OwnerUpdated(entry) => self.update_owner_access_control_entry(entry),
            AclChange::OwnerRemoved(key) => self.remove_owner_access_control_entry(&key).map(|_| ()),
            AclChange::DomainRoleUpdated(entry) => self.update_domain_role(entry),
            AclChange::DomainRoleRemoved { uid, role } => self.remove_domain_role(&uid, role).map(|_| ()),
        }
    }

    /// Apply every change received on `changes` until the channel closes.
    pub fn spawn_change_listener(self: &Arc<Self>, mut changes: broadcast::Receiver<AclChange>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if let Err(e) = store.apply_change(change) {
                            log::warn!("[DomainAccessControlStore] Ignoring change: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("[DomainAccessControlStore] Missed {} access control changes", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::debug!("[DomainAccessControlStore] Change channel closed");
                        break;
                    }
                }
            }
        })
    }
}

fn check_key(key: &AceKey) -> Result<(), AccessControlError> {
    if key.uid.is_empty() || key.domain.is_empty() || key.interface_name.is_empty() || key.operation.is_empty() {
        return Err(AccessControlError::InvalidEntry(format!("incomplete entry key {:?}", key)));
    }
    Ok(())
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

fn find_entry<E: ControlEntry>(
    table: &HashMap<AceKey, E>,
    uid: &str,
    domain: &str,
    interface_name: &str,
    operation: &str,
) -> Option<E> {
    for candidate_uid in [uid, WILDCARD] {
        for candidate_operation in [operation, WILDCARD] {
            let key = AceKey::new(candidate_uid, domain, interface_name, candidate_operation);
            if let Some(entry) = table.get(&key) {
                return Some(entry.clone());
            }
        }
    }

    table
        .iter()
        .filter(|(key, _)| {
            (key.uid == uid || key.uid == WILDCARD)
                && (key.operation == operation || key.operation == WILDCARD)
                && pattern_matches(&key.domain, domain)
                && pattern_matches(&key.interface_name, interface_name)
        })
        .max_by_key(|(key, _)| {
            (
                key.uid == uid,
                key.domain.len(),
                key.interface_name.len(),
                key.operation == operation,
            )
        })
        .map(|(_, entry)| entry.clone())
}

fn only_wildcards<E>(table: &HashMap<AceKey, E>, uid: &str, domain: &str, interface_name: &str) -> bool {
    let mut matching = table
        .keys()
        .filter(|key| key.uid == uid && key.domain == domain && key.interface_name == interface_name);
    match (matching.next(), matching.next()) {
        (None, _) => true,
        (Some(key), None) => key.operation == WILDCARD,
        (Some(_), Some(_)) => false,
    }
}

fn entries_in_role_domains<E: Clone>(
    tables: &AclTables,
    table: &HashMap<AceKey, E>,
    uid: &str,
    role: Role,
) -> Vec<E> {
    let Some(roles) = tables.domain_roles.get(&(uid.to_string(), role)) else {
        return Vec::new();
    };
    table
        .iter()
        .filter(|(key, _)| roles.domains.iter().any(|d| d == &key.domain || d == WILDCARD))
        .map(|(_, entry)| entry.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accesscontrol::types::{Permission, TrustLevel};

    fn master(uid: &str, domain: &str, interface_name: &str, operation: &str, permission: Permission) -> MasterAccessControlEntry {
        MasterAccessControlEntry::new(uid, domain, interface_name, operation, permission, TrustLevel::Low)
    }

    #[test]
    fn test_exact_uid_before_wildcard_uid() {
        let store = DomainAccessControlStore::new();
        store
            .update_master_access_control_entry(master(WILDCARD, "dom", "if", WILDCARD, Permission::No))
            .unwrap();
        store
            .update_master_access_control_entry(master("alice", "dom", "if", WILDCARD, Permission::Yes))
            .unwrap();

        let alice = store.get_master_access_control_entry("alice", "dom", "if", "play").unwrap();
        assert_eq!(alice.default_consumer_permission, Permission::Yes);
        let bob = store.get_master_access_control_entry("bob", "dom", "if", "play").unwrap();
        assert_eq!(bob.default_consumer_permission, Permission::No);
        assert!(store.get_master_access_control_entry("bob", "other", "if", "play").is_none());
    }

    #[test]
    fn test_exact_operation_before_wildcard_operation() {
        let store = DomainAccessControlStore::new();
        store
            .update_master_access_control_entry(master("alice", "dom", "if", WILDCARD, Permission::No))
            .unwrap();
        store
            .update_master_access_control_entry(master("alice", "dom", "if", "play", Permission::Yes))
            .unwrap();

        let play = store.get_master_access_control_entry("alice", "dom", "if", "play").unwrap();
        assert_eq!(play.default_consumer_permission, Permission::Yes);
        let stop = store.get_master_access_control_entry("alice", "dom", "if", "stop").unwrap();
        assert_eq!(stop.default_consumer_permission, Permission::No);
    }

    #[test]
    fn test_domain_and_interface_patterns() {
        let store = DomainAccessControlStore::new();
        store
            .update_master_access_control_entry(master("alice", "vehicle.*", "*", WILDCARD, Permission::Ask))
            .unwrap();
        store
            .update_master_access_control_entry(master("alice", "vehicle.radio*", "*", WILDCARD, Permission::Yes))
            .unwrap();

        let radio = store
            .get_master_access_control_entry("alice", "vehicle.radio.front", "audio/Radio", "play")
            .unwrap();
        assert_eq!(radio.default_consumer_permission, Permission::Yes);
        let seats = store
            .get_master_access_control_entry("alice", "vehicle.seats", "Seat", "move")
            .unwrap();
        assert_eq!(seats.default_consumer_permission, Permission::Ask);
        assert!(store.get_master_access_control_entry("alice", "home", "Light", "on").is_none());
    }

    #[test]
    fn test_validated_updates() {
        let store = DomainAccessControlStore::new();
        store
            .update_master_access_control_entry(
                master("alice", "dom", "if", WILDCARD, Permission::No).with_possible_consumer_permissions(vec![Permission::No]),
            )
            .unwrap();

        let err = store
            .update_mediator_access_control_entry(master("alice", "dom", "if", WILDCARD, Permission::Yes))
            .unwrap_err();
        assert!(matches!(err, AccessControlError::InvalidEntry(_)));

        let owner = OwnerAccessControlEntry::new("alice", "dom", "if", WILDCARD, Permission::Yes, TrustLevel::Low);
        assert!(store.update_owner_access_control_entry(owner).is_err());
        let owner = OwnerAccessControlEntry::new("alice", "dom", "if", WILDCARD, Permission::No, TrustLevel::Low);
        store.update_owner_access_control_entry(owner).unwrap();

        assert!(store.update_master_access_control_entry(master("", "dom", "if", WILDCARD, Permission::No)).is_err());
    }

    #[test]
    fn test_remove_unknown_entry() {
        let store = DomainAccessControlStore::new();
        let key = AceKey::new("alice", "dom", "if", WILDCARD);
        assert!(matches!(
            store.remove_owner_access_control_entry(&key),
            Err(AccessControlError::NotFound(_))
        ));
        store
            .update_master_access_control_entry(master("alice", "dom", "if", WILDCARD, Permission::Yes))
            .unwrap();
        assert!(store.remove_master_access_control_entry(&key).is_ok());
        assert!(store.get_master_access_control_entry("alice", "dom", "if", WILDCARD).is_none());
    }

    #[test]
    fn test_domain_roles() {
        let store = DomainAccessControlStore::new();
        store
            .update_domain_role(DomainRoleEntry::new("alice", vec!["dom".into()], Role::Master))
            .unwrap();
        store
            .update_domain_role(DomainRoleEntry::new("admin", vec![WILDCARD.into()], Role::Owner))
            .unwrap();
        store
            .update_master_access_control_entry(master("bob", "dom", "if", WILDCARD, Permission::Yes))
            .unwrap();
        store
            .update_master_access_control_entry(master("bob", "elsewhere", "if", WILDCARD, Permission::Yes))
            .unwrap();

        assert!(store.has_role("alice", "dom", Role::Master));
        assert!(!store.has_role("alice", "dom", Role::Owner));
        assert!(!store.has_role("alice", "other", Role::Master));
        assert!(store.has_role("admin", "anything", Role::Owner));
        assert_eq!(store.get_domain_roles("alice").len(), 1);
        assert_eq!(store.editable_master_access_control_entries("alice").len(), 1);

        store.remove_domain_role("alice", Role::Master).unwrap();
        assert!(!store.has_role("alice", "dom", Role::Master));
    }

    #[test]
    fn test_only_wildcard_operations() {
        let store = DomainAccessControlStore::new();
        assert!(store.only_wildcard_operations("alice", "dom", "if"));

        store
            .update_master_access_control_entry(master("alice", "dom", "if", WILDCARD, Permission::Yes))
            .unwrap();
        assert!(store.only_wildcard_operations("alice", "dom", "if"));

        store
            .update_master_access_control_entry(master("alice", "dom", "if", "play", Permission::Yes))
            .unwrap();
        assert!(!store.only_wildcard_operations("alice", "dom", "if"));
        assert!(store.only_wildcard_operations("bob", "dom", "if"));
    }

    #[tokio::test]
    async fn test_change_listener_applies_broadcasts() {
        let store = Arc::new(DomainAccessControlStore::new());
        let (tx, rx) = broadcast::channel(16);
        let handle = store.spawn_change_listener(rx);

        tx.send(AclChange::MasterUpdated(master("alice", "dom", "if", WILDCARD, Permission::Yes)))
            .unwrap();
        tx.send(AclChange::DomainRoleUpdated(DomainRoleEntry::new("alice", vec!["dom".into()], Role::Owner)))
            .unwrap();
        tx.send(AclChange::OwnerRemoved(AceKey::new("nobody", "dom", "if", WILDCARD)))
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(store.get_master_access_control_entry("alice", "dom", "if", "x").is_some());
        assert!(store.has_role("alice", "dom", Role::Owner));
    }

    #[tokio::test]
    async fn test_change_listener_survives_lag() {
        let store = Arc::new(DomainAccessControlStore::new());
        let (tx, rx) = broadcast::channel(1);
        for uid in ["a", "b", "c"] {
            tx.send(AclChange::MasterUpdated(master(uid, "dom", "if", WILDCARD, Permission::Yes)))
                .unwrap();
        }
        let handle = store.spawn_change_listener(rx);
        drop(tx);
        handle.await.unwrap();

        assert!(store.get_master_access_control_entry("a", "dom", "if", WILDCARD).is_none());
        assert!(store.get_master_access_control_entry("c", "dom", "if", WILDCARD).is_some());
    }
}
