//! Checks that lower access control tiers stay within the bounds of the upper ones.

use super::types::{MasterAccessControlEntry, OwnerAccessControlEntry};

pub struct AceValidator<'a> {
    master: Option<&'a MasterAccessControlEntry>,
    mediator: Option<&'a MasterAccessControlEntry>,
    owner: Option<&'a OwnerAccessControlEntry>,
}

impl<'a> AceValidator<'a> {
    pub fn new(
        master: Option<&'a MasterAccessControlEntry>,
        mediator: Option<&'a MasterAccessControlEntry>,
        owner: Option<&'a OwnerAccessControlEntry>,
    ) -> Self {
        Self { master, mediator, owner }
    }

    pub fn is_valid(&self) -> bool {
        self.is_mediator_valid() && self.is_owner_valid()
    }

    /// The mediator may only offer permissions and trust levels the master offers.
    pub fn is_mediator_valid(&self) -> bool {
        let (Some(master), Some(mediator)) = (self.master, self.mediator) else {
            return true;
        };
        is_subset(&mediator.possible_consumer_permissions, &master.possible_consumer_permissions)
            && is_subset(
                &mediator.possible_required_trust_levels,
                &master.possible_required_trust_levels,
            )
            && is_subset(
                &mediator.possible_required_control_entry_change_trust_levels,
                &master.possible_required_control_entry_change_trust_levels,
            )
    }

    /// The owner must pick values the mediator allows, or the master when
    /// there is no mediator.
    pub fn is_owner_valid(&self) -> bool {
        let Some(owner) = self.owner else {
            return true;
        };
        let Some(bound) = self.mediator.or(self.master) else {
            return true;
        };
        bound.possible_consumer_permissions.contains(&owner.consumer_permission)
            && bound.possible_required_trust_levels.contains(&owner.required_trust_level)
            && bound
                .possible_required_control_entry_change_trust_levels
                .contains(&owner.required_ace_change_trust_level)
    }
}

fn is_subset<T: PartialEq>(subset: &[T], superset: &[T]) -> bool {
    subset.iter().all(|item| superset.contains(item))
}
