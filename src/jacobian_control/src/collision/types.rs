//! Collision policy table.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::part::{ContactPair, PartId, UnorderedPair};

/// Default substring marking a part as sensorized.
pub const DEFAULT_SENSOR_MARKER: &str = "sensor";

/// How a contact between two parts is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionType {
    /// Never a failure, even on an unsensorized part.
    pub ignored: bool,
    /// Always a failure.
    pub prohibited: bool,
    /// Ends the run successfully if nothing else failed.
    pub terminating: bool,
    /// Must be seen at least once during the run.
    pub required: bool,
}

impl CollisionType {
    pub fn ignored() -> Self {
        Self {
            ignored: true,
            ..Default::default()
        }
    }

    pub fn prohibited() -> Self {
        Self {
            prohibited: true,
            ..Default::default()
        }
    }

    pub fn terminating() -> Self {
        Self {
            terminating: true,
            ..Default::default()
        }
    }

    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Combine flags, e.g. `CollisionType::required().and(CollisionType::terminating())`.
    pub fn and(self, other: Self) -> Self {
        Self {
            ignored: self.ignored || other.ignored,
            prohibited: self.prohibited || other.prohibited,
            terminating: self.terminating || other.terminating,
            required: self.required || other.required,
        }
    }
}

/// Policy table mapping unordered part pairs to [`CollisionType`].
#[derive(Debug, Clone)]
pub struct CollisionTypes {
    types: BTreeMap<UnorderedPair, CollisionType>,
    default_type: CollisionType,
    sensor_marker: String,
}

impl Default for CollisionTypes {
    fn default() -> Self {
        Self {
            types: BTreeMap::new(),
            default_type: CollisionType::default(),
            sensor_marker: DEFAULT_SENSOR_MARKER.to_string(),
        }
    }
}

impl CollisionTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type used for pairs that are not listed.
    pub fn with_default(mut self, default_type: CollisionType) -> Self {
        self.default_type = default_type;
        self
    }

    /// Substring that marks a part identifier as sensorized.
    pub fn with_sensor_marker(mut self, marker: impl Into<String>) -> Self {
        self.sensor_marker = marker.into();
        self
    }

    /// Set the type of the unordered pair `(a, b)`, replacing any previous entry.
    pub fn with(mut self, a: PartId, b: PartId, collision_type: CollisionType) -> Self {
        self.insert(a, b, collision_type);
        self
    }

    pub fn insert(&mut self, a: PartId, b: PartId, collision_type: CollisionType) {
        self.types.insert(UnorderedPair::new(a, b), collision_type);
    }

    pub fn collision_type(&self, a: &PartId, b: &PartId) -> CollisionType {
        self.types
            .get(&UnorderedPair::new(a.clone(), b.clone()))
            .copied()
            .unwrap_or(self.default_type)
    }

    pub fn is_sensorized(&self, part: &PartId) -> bool {
        part.as_str().contains(self.sensor_marker.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Fresh counter over every pair marked `required`.
    pub fn make_required_collisions_counter(&self) -> RequiredCollisionsCounter {
        RequiredCollisionsCounter {
            required: self
                .types
                .iter()
                .filter(|(_, t)| t.required)
                .map(|(pair, _)| pair.clone())
                .collect(),
            seen: BTreeSet::new(),
        }
    }
}

/// Tracks which required pairs have been contacted during a run.
#[derive(Debug, Clone, Default)]
pub struct RequiredCollisionsCounter {
    required: BTreeSet<UnorderedPair>,
    seen: BTreeSet<UnorderedPair>,
}

impl RequiredCollisionsCounter {
    /// Register a contact. Pairs that are not required are ignored.
    pub fn count_collision(&mut self, contact: &ContactPair) {
        let pair = contact.unordered();
        if self.required.contains(&pair) {
            self.seen.insert(pair);
        }
    }

    pub fn all_required_present(&self) -> bool {
        self.seen.len() == self.required.len()
    }

    /// Required pairs not contacted so far.
    pub fn missing(&self) -> impl Iterator<Item = &UnorderedPair> {
        self.required.difference(&self.seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str) -> PartId {
        PartId::parse(name).unwrap()
    }

    #[test]
    fn test_lookup_is_unordered() {
        let types = CollisionTypes::new().with(part("palm"), part("table"), CollisionType::prohibited());

        assert!(types.collision_type(&part("table"), &part("palm")).prohibited);
        assert!(types.collision_type(&part("palm"), &part("table")).prohibited);
    }

    #[test]
    fn test_default_for_unlisted() {
        let types = CollisionTypes::new();
        let t = types.collision_type(&part("a"), &part("b"));
        assert!(!t.ignored);
        assert!(!t.required);
        assert!(!t.prohibited);
        assert!(!t.terminating);

        let types = CollisionTypes::new().with_default(CollisionType::prohibited());
        assert!(types.collision_type(&part("a"), &part("b")).prohibited);
    }

    #[test]
    fn test_sensor_marker() {
        let types = CollisionTypes::new();
        assert!(types.is_sensorized(&part("finger_sensor_2")));
        assert!(!types.is_sensorized(&part("palm")));

        let types = types.with_sensor_marker("tactile");
        assert!(types.is_sensorized(&part("tactile_pad")));
        assert!(!types.is_sensorized(&part("finger_sensor_2")));
    }

    #[test]
    fn test_required_counter() {
        let types = CollisionTypes::new()
            .with(part("finger_sensor"), part("box"), CollisionType::required())
            .with(part("palm_sensor"), part("wall"), CollisionType::required())
            .with(part("palm"), part("table"), CollisionType::ignored());
        let mut counter = types.make_required_collisions_counter();

        assert!(!counter.all_required_present());
        assert_eq!(counter.missing().count(), 2);

        counter.count_collision(&ContactPair::parse("palm", "table").unwrap());
        counter.count_collision(&ContactPair::parse("box", "finger_sensor").unwrap());
        assert_eq!(counter.missing().count(), 1);

        counter.count_collision(&ContactPair::parse("palm_sensor", "wall").unwrap());
        counter.count_collision(&ContactPair::parse("palm_sensor", "wall").unwrap());
        assert!(counter.all_required_present());
    }

    #[test]
    fn test_no_required_pairs() {
        let counter = CollisionTypes::new().make_required_collisions_counter();
        assert!(counter.all_required_present());
    }

    #[test]
    fn test_collision_type_and() {
        let t = CollisionType::required().and(CollisionType::terminating());
        assert!(t.required && t.terminating);
        assert!(!t.ignored && !t.prohibited);
    }
}
