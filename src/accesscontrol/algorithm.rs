//! Consumer permission from the three access control tiers.

use super::types::{MasterAccessControlEntry, OwnerAccessControlEntry, Permission, TrustLevel};

/// Owner > mediator > master, with the master bounding what the mediator
/// may grant. No entries at all means [`Permission::No`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessControlAlgorithm;

impl AccessControlAlgorithm {
    pub fn new() -> Self {
        Self
    }

    pub fn get_consumer_permission(
        &self,
        master: Option<&MasterAccessControlEntry>,
        mediator: Option<&MasterAccessControlEntry>,
        owner: Option<&OwnerAccessControlEntry>,
        message_trust_level: TrustLevel,
    ) -> Permission {
        if let Some(owner) = owner {
            return if message_trust_level >= owner.required_trust_level {
                owner.consumer_permission
            } else {
                Permission::No
            };
        }

        let Some(effective) = mediator.or(master) else {
            return Permission::No;
        };

        if let Some(master) = master {
            if !master
                .possible_consumer_permissions
                .contains(&effective.default_consumer_permission)
            {
                log::debug!(
                    "[AccessControlAlgorithm] {:?} not allowed by master entry for {}/{}",
                    effective.default_consumer_permission,
                    master.domain,
                    master.interface_name
                );
                return Permission::No;
            }
            if !master
                .possible_required_trust_levels
                .contains(&effective.default_required_trust_level)
            {
                return Permission::No;
            }
        }

        if message_trust_level >= effective.default_required_trust_level {
            effective.default_consumer_permission
        } else {
            Permission::No
        }
    }
}
