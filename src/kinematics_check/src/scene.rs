//! Capsule collision scene.
//!
//! Each link of a [`PlanarChain`] is a capsule around the segment between its
//! joints; each obstacle is a sphere. A link and an obstacle touch when the
//! distance from the sphere centre to the segment is at most the sum of the
//! radii.

use jacobian_control::{CollisionDetector, Configuration, ContactPair, ControlError, Kinematics, PartId};
use nalgebra::Vector3;

use crate::chain::PlanarChain;

/// Named sphere in the world frame.
#[derive(Debug, Clone)]
pub struct SphereObstacle {
    pub part: PartId,
    pub center: Vector3<f64>,
    pub radius: f64,
}

#[derive(Debug, Clone)]
pub struct CapsuleScene {
    chain: PlanarChain,
    link_parts: Vec<PartId>,
    link_radius: f64,
    obstacles: Vec<SphereObstacle>,
}

impl CapsuleScene {
    /// Scene around `chain` with one part per link.
    pub fn new(
        chain: PlanarChain,
        link_parts: Vec<PartId>,
        link_radius: f64,
    ) -> Result<Self, ControlError> {
        if link_parts.len() != chain.dof() {
            return Err(ControlError::DimensionMismatch {
                what: "link parts",
                expected: chain.dof(),
                actual: link_parts.len(),
            });
        }
        if !(link_radius.is_finite() && link_radius >= 0.0) {
            return Err(ControlError::InvalidSettings(format!(
                "link radius must be finite and non-negative, got {link_radius}"
            )));
        }
        Ok(Self {
            chain,
            link_parts,
            link_radius,
            obstacles: Vec::new(),
        })
    }

    pub fn with_obstacle(mut self, obstacle: SphereObstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn obstacles(&self) -> &[SphereObstacle] {
        &self.obstacles
    }

    pub fn link_parts(&self) -> &[PartId] {
        &self.link_parts
    }
}

impl CollisionDetector for CapsuleScene {
    fn contacts_at(&self, configuration: &Configuration) -> jacobian_control::Result<Vec<ContactPair>> {
        if configuration.len() != self.chain.dof() {
            return Err(ControlError::Detector(format!(
                "configuration has {} joints, scene expects {}",
                configuration.len(),
                self.chain.dof()
            )));
        }

        let positions = self.chain.joint_positions(configuration);
        let mut contacts = Vec::new();
        for (link, part) in self.link_parts.iter().enumerate() {
            let (start, end) = (positions[link], positions[link + 1]);
            for obstacle in &self.obstacles {
                let distance = segment_point_distance(&start, &end, &obstacle.center);
                if distance <= self.link_radius + obstacle.radius {
                    contacts.push(ContactPair::new(part.clone(), obstacle.part.clone()));
                }
            }
        }
        Ok(contacts)
    }
}

/// Distance from `point` to the segment `[start, end]`.
fn segment_point_distance(start: &Vector3<f64>, end: &Vector3<f64>, point: &Vector3<f64>) -> f64 {
    let segment = end - start;
    let length_squared = segment.norm_squared();
    if length_squared == 0.0 {
        return (point - start).norm();
    }
    let t = ((point - start).dot(&segment) / length_squared).clamp(0.0, 1.0);
    (point - (start + segment * t)).norm()
}
