//! Consumer permission checks for incoming messages.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use super::algorithm::AccessControlAlgorithm;
use super::store::DomainAccessControlStore;
use super::types::{Permission, Role, TrustLevel, WILDCARD};
use crate::capabilities::GLOBAL_CAPABILITIES_DIRECTORY_INTERFACE;
use crate::config::DiscoverySettings;
use crate::errors::RuntimeError;
use crate::interfaces::DiscoveryLookup;
use crate::types::{DiscoveryQos, DiscoveryScope, ImmutableMessage, MessageType};

/// Interface of the node-local discovery provider.
pub const DISCOVERY_INTERFACE: &str = "system/Discovery";
/// Interface of the node-local routing provider.
pub const ROUTING_INTERFACE: &str = "system/Routing";

const PARTICIPANT_LOOKUP_TIMEOUT_MS: i64 = 60_000;

/// Outcome of a consumer permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerPermission {
    Yes,
    No,
    /// The recipient could not be resolved yet; the caller may retry later.
    Retry,
}

impl ConsumerPermission {
    pub fn is_granted(&self) -> bool {
        matches!(self, ConsumerPermission::Yes)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestPayload {
    method_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionRequestPayload {
    subscribe_to_name: String,
}

pub struct AccessController {
    discovery: Arc<dyn DiscoveryLookup>,
    store: Arc<DomainAccessControlStore>,
    algorithm: AccessControlAlgorithm,
    whitelist: RwLock<HashSet<String>>,
    capabilities_directory_domain: String,
    system_services_domain: String,
}

impl AccessController {
    pub fn new(
        settings: &DiscoverySettings,
        discovery: Arc<dyn DiscoveryLookup>,
        store: Arc<DomainAccessControlStore>,
    ) -> Self {
        Self {
            discovery,
            store,
            algorithm: AccessControlAlgorithm::new(),
            whitelist: RwLock::new(HashSet::new()),
            capabilities_directory_domain: settings.capabilities_directory_domain.clone(),
            system_services_domain: settings.system_services_domain.clone(),
        }
    }

    /// Messages to whitelisted participants are never checked.
    pub fn add_participant_to_whitelist(&self, participant_id: impl Into<String>) {
        self.whitelist.write().insert(participant_id.into());
    }

    pub fn needs_permission_check(&self, message: &ImmutableMessage) -> bool {
        if self.whitelist.read().contains(&message.recipient) {
            return false;
        }
        message.message_type.requires_permission_check()
    }

    /// Decide whether the creator of `message` may call its recipient.
    ///
    /// The recipient is resolved through discovery (local only when
    /// `is_local_recipient`). Messages whose payload cannot be decoded are
    /// denied. Only [`Permission::Yes`] grants access.
    pub async fn has_consumer_permission(&self, message: &ImmutableMessage, is_local_recipient: bool) -> ConsumerPermission {
        if !self.needs_permission_check(message) {
            return ConsumerPermission::Yes;
        }

        let qos = DiscoveryQos {
            discovery_timeout_ms: PARTICIPANT_LOOKUP_TIMEOUT_MS,
            discovery_scope: if is_local_recipient {
                DiscoveryScope::LocalOnly
            } else {
                DiscoveryScope::LocalThenGlobal
            },
            ..Default::default()
        };
        let entry = match self.discovery.lookup_participant(&message.recipient, &qos, &[]).await {
            Ok(Some(entry)) if entry.participant_id() == message.recipient => entry.entry,
            Ok(Some(entry)) => {
                log::error!(
                    "[AccessController] Lookup for participantId {} returned {}",
                    message.recipient,
                    entry.participant_id()
                );
                return ConsumerPermission::No;
            }
            Ok(None) => {
                log::debug!("[AccessController] No provider registered as {}", message.recipient);
                return ConsumerPermission::Retry;
            }
            Err(e) => {
                log::debug!("[AccessController] Lookup of {} failed: {}", message.recipient, e);
                return ConsumerPermission::Retry;
            }
        };

        let operation = match requested_operation(message) {
            Ok(operation) => operation,
            Err(e) => {
                log::error!("[AccessController] Could not decode payload of message {}: {}", message.id, e);
                return ConsumerPermission::No;
            }
        };

        if self.is_system_service(&entry.domain, &entry.interface_name) {
            return ConsumerPermission::Yes;
        }

        let operation = if self
            .store
            .only_wildcard_operations(&message.creator, &entry.domain, &entry.interface_name)
        {
            WILDCARD.to_string()
        } else {
            match operation {
                Some(operation) => operation,
                None => {
                    log::error!(
                        "[AccessController] Message {} of type {:?} carries no operation",
                        message.id,
                        message.message_type
                    );
                    return ConsumerPermission::No;
                }
            }
        };

        // message trust levels are not established yet
        let permission = self.get_consumer_permission(
            &message.creator,
            &entry.domain,
            &entry.interface_name,
            &operation,
            TrustLevel::High,
        );
        if permission == Permission::Yes {
            ConsumerPermission::Yes
        } else {
            log::error!(
                "[AccessController] Message {} to domain {}, interface/operation {}/{} from creator {} failed ACL check",
                message.id,
                entry.domain,
                entry.interface_name,
                operation,
                message.creator
            );
            ConsumerPermission::No
        }
    }

    pub fn get_consumer_permission(
        &self,
        uid: &str,
        domain: &str,
        interface_name: &str,
        operation: &str,
        trust_level: TrustLevel,
    ) -> Permission {
        log::trace!(
            "[AccessController] getConsumerPermission uid={} domain={} interface={} operation={}",
            uid,
            domain,
            interface_name,
            operation
        );
        let master = self
            .store
            .get_master_access_control_entry(uid, domain, interface_name, operation);
        let mediator = self
            .store
            .get_mediator_access_control_entry(uid, domain, interface_name, operation);
        let owner = self
            .store
            .get_owner_access_control_entry(uid, domain, interface_name, operation);
        self.algorithm
            .get_consumer_permission(master.as_ref(), mediator.as_ref(), owner.as_ref(), trust_level)
    }

    pub fn has_role(&self, uid: &str, domain: &str, role: Role) -> bool {
        self.store.has_role(uid, domain, role)
    }

    fn is_system_service(&self, domain: &str, interface_name: &str) -> bool {
        (domain == self.capabilities_directory_domain && interface_name == GLOBAL_CAPABILITIES_DIRECTORY_INTERFACE)
            || (domain == self.system_services_domain
                && (interface_name == DISCOVERY_INTERFACE || interface_name == ROUTING_INTERFACE))
    }
}

/// Method or subscribed name a message asks for, if its type carries one.
fn requested_operation(message: &ImmutableMessage) -> Result<Option<String>, RuntimeError> {
    match message.message_type {
        MessageType::Request | MessageType::OneWay => {
            let request: RequestPayload = serde_json::from_slice(&message.payload)?;
            Ok(Some(request.method_name))
        }
        MessageType::SubscriptionRequest
        | MessageType::BroadcastSubscriptionRequest
        | MessageType::MulticastSubscriptionRequest => {
            let request: SubscriptionRequestPayload = serde_json::from_slice(&message.payload)?;
            Ok(Some(request.subscribe_to_name))
        }
        _ => Ok(None),
    }
}
