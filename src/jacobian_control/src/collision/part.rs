//! Part identifiers and the collision detector interface.

use std::fmt;
use std::sync::Arc;

use crate::error::{ControlError, Result};
use crate::kinematics::Configuration;

/// Stable identifier of a robot or scene part.
///
/// Opaque token supplied by the collision detector. Only equality, ordering
/// and hashing are meaningful, plus a textual form used for sensorization
/// rules and logging.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartId(Arc<str>);

impl PartId {
    /// Validate and wrap a part name. Empty names or names with surrounding
    /// whitespace are rejected.
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() || name.trim() != name {
            return Err(ControlError::InvalidPartId(name.to_string()));
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PartId {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Two parts in contact, as reported by the detector.
///
/// `robot` is the robot-side part; sensorization is checked on it. Policy
/// lookups treat the pair as unordered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactPair {
    pub robot: PartId,
    pub other: PartId,
}

impl ContactPair {
    pub fn new(robot: PartId, other: PartId) -> Self {
        Self { robot, other }
    }

    /// Parse both names.
    pub fn parse(robot: &str, other: &str) -> Result<Self> {
        Ok(Self::new(PartId::parse(robot)?, PartId::parse(other)?))
    }

    /// Order-independent key for policy lookups.
    pub fn unordered(&self) -> UnorderedPair {
        UnorderedPair::new(self.robot.clone(), self.other.clone())
    }
}

impl fmt::Display for ContactPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.robot, self.other)
    }
}

/// Unordered pair of parts, stored with the smaller identifier first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnorderedPair(PartId, PartId);

impl UnorderedPair {
    pub fn new(a: PartId, b: PartId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn parts(&self) -> (&PartId, &PartId) {
        (&self.0, &self.1)
    }
}

/// Scene collision query.
pub trait CollisionDetector: Send + Sync {
    /// All part pairs in contact with the robot placed at `configuration`.
    fn contacts_at(&self, configuration: &Configuration) -> Result<Vec<ContactPair>>;
}
