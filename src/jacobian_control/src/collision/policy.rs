//! Collision policy classifier.
//!
//! Classification is a set union over the contacts of one step plus the
//! registration of each contact with the run's required-collision counter, so
//! the order in which contacts are reported never matters.

use std::collections::BTreeSet;

use super::part::ContactPair;
use super::types::{CollisionTypes, RequiredCollisionsCounter};
use crate::controller::Outcome;

/// Classification of one step's contacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollisionConstraintsCheck {
    /// Policy violations observed in this step.
    pub failures: BTreeSet<Outcome>,
    /// A terminating contact occurred, nothing failed and every required
    /// pair has been seen during the run.
    pub success_termination: bool,
}

/// Classify the contacts of one step against `collision_types`.
///
/// Every contact is registered with `required_counter`, whatever its type.
/// A contact on an unsensorized robot part fails unless the pair is ignored;
/// a prohibited pair always fails.
pub fn check_collision_constraints(
    contacts: &[ContactPair],
    collision_types: &CollisionTypes,
    required_counter: &mut RequiredCollisionsCounter,
) -> CollisionConstraintsCheck {
    let mut check = CollisionConstraintsCheck::default();
    let mut terminating_contact = false;

    for contact in contacts {
        let collision_type = collision_types.collision_type(&contact.robot, &contact.other);

        required_counter.count_collision(contact);

        if !collision_types.is_sensorized(&contact.robot) && !collision_type.ignored {
            check.failures.insert(Outcome::UnsensorizedCollision);
        }
        if collision_type.prohibited {
            check.failures.insert(Outcome::UnacceptableCollision);
        }
        if collision_type.terminating {
            terminating_contact = true;
        }
    }

    check.success_termination =
        terminating_contact && check.failures.is_empty() && required_counter.all_required_present();

    check
}
