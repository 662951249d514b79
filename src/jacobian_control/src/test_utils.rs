//! Test utilities: a prismatic chain with exact kinematics and a scripted
//! collision detector.
//!
//! The prismatic chain makes joint-space and task-space distances identical,
//! so controller runs can be checked step by step without floating point
//! noise from a pseudo-inverse.

use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::{DMatrix, DVector, Isometry3, Vector3, Vector6};

use crate::collision::{CollisionDetector, ContactPair};
use crate::error::Result;
use crate::kinematics::{Configuration, Kinematics, PSEUDO_INVERSE_TOLERANCE};

/// Serial chain of prismatic joints; joint `i` translates along world axis
/// `i % 3`. The orientation never changes.
///
/// With more than three joints the chain is redundant and its Jacobian loses
/// rank, so its manipulability is zero.
#[derive(Debug, Clone)]
pub struct PrismaticChain {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl PrismaticChain {
    /// Chain with joint limits.
    pub fn new(lower: DVector<f64>, upper: DVector<f64>) -> Self {
        assert_eq!(lower.len(), upper.len());
        Self { lower, upper }
    }

    /// Chain without joint limits.
    pub fn unbounded(dof: usize) -> Self {
        Self::new(
            DVector::from_element(dof, f64::NEG_INFINITY),
            DVector::from_element(dof, f64::INFINITY),
        )
    }

    /// Chain with the same symmetric limit on every joint.
    pub fn symmetric(dof: usize, limit: f64) -> Self {
        Self::new(
            DVector::from_element(dof, -limit),
            DVector::from_element(dof, limit),
        )
    }

    /// Pose with translation `(x, y, z)` and identity rotation.
    pub fn target(x: f64, y: f64, z: f64) -> Isometry3<f64> {
        Isometry3::translation(x, y, z)
    }
}

impl Kinematics for PrismaticChain {
    fn dof(&self) -> usize {
        self.lower.len()
    }

    fn forward_pose(&self, configuration: &Configuration) -> Isometry3<f64> {
        let mut translation = Vector3::<f64>::zeros();
        for (i, q) in configuration.iter().enumerate() {
            translation[i % 3] += *q;
        }
        Isometry3::translation(translation.x, translation.y, translation.z)
    }

    fn jacobian(&self, _configuration: &Configuration) -> DMatrix<f64> {
        let dof = self.dof();
        DMatrix::from_fn(6, dof, |row, col| if row == col % 3 { 1.0 } else { 0.0 })
    }

    fn is_within_joint_limits(&self, configuration: &Configuration) -> bool {
        configuration
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(q, (lo, hi))| q >= lo && q <= hi)
    }

    fn inverse_velocity(
        &self,
        configuration: &Configuration,
        task_delta: &Vector6<f64>,
    ) -> Configuration {
        let dof = self.dof();
        if dof <= 3 {
            // Exact inverse: each joint owns one axis.
            return DVector::from_fn(dof, |i, _| task_delta[i]);
        }
        match self
            .jacobian(configuration)
            .pseudo_inverse(PSEUDO_INVERSE_TOLERANCE)
        {
            Ok(inverse) => inverse * DVector::from_column_slice(task_delta.as_slice()),
            Err(_) => DVector::zeros(dof),
        }
    }
}

/// Contact reported while joint `joint` is at or beyond `threshold`.
#[derive(Debug, Clone)]
pub struct ContactRule {
    pub joint: usize,
    pub threshold: f64,
    pub contact: ContactPair,
}

/// Collision detector driven by per-joint thresholds. Counts its queries.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    rules: Vec<ContactRule>,
    queries: AtomicUsize,
}

impl ScriptedDetector {
    /// Detector that never reports a contact.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Report `contact` while `q[joint] >= threshold`.
    pub fn with_contact(mut self, joint: usize, threshold: f64, contact: ContactPair) -> Self {
        self.rules.push(ContactRule {
            joint,
            threshold,
            contact,
        });
        self
    }

    /// Number of `contacts_at` calls so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl CollisionDetector for ScriptedDetector {
    fn contacts_at(&self, configuration: &Configuration) -> Result<Vec<ContactPair>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rules
            .iter()
            .filter(|rule| configuration[rule.joint] >= rule.threshold)
            .map(|rule| rule.contact.clone())
            .collect())
    }
}
