//! Contacts, collision policies and their classification.

pub mod part;
pub mod policy;
pub mod types;

pub use part::{CollisionDetector, ContactPair, PartId, UnorderedPair};
pub use policy::{check_collision_constraints, CollisionConstraintsCheck};
pub use types::{CollisionType, CollisionTypes, RequiredCollisionsCounter, DEFAULT_SENSOR_MARKER};
