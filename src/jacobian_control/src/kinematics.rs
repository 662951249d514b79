//! Kinematics adapter interface.
//!
//! The controller never computes forward kinematics itself. It talks to the
//! chain through the [`Kinematics`] trait, which only has to provide the
//! forward pose, the geometric Jacobian and the joint limits. Jacobian
//! inverse, inverse velocity and manipulability have SVD-based defaults.

use nalgebra::{DMatrix, DVector, Isometry3, Vector6};

use crate::error::{ControlError, Result};

/// Singular value tolerance for the Jacobian pseudo-inverse.
pub const PSEUDO_INVERSE_TOLERANCE: f64 = 1e-10;

/// Joint-space configuration, one entry per degree of freedom.
pub type Configuration = DVector<f64>;

/// Kinematic chain as seen by the controller.
///
/// Implementations must be stateless with respect to the configuration: every
/// query receives the configuration it is about, so particles can be evaluated
/// concurrently.
pub trait Kinematics: Send + Sync {
    /// Number of joints (configuration length).
    fn dof(&self) -> usize;

    /// End-effector pose in the world frame.
    fn forward_pose(&self, configuration: &Configuration) -> Isometry3<f64>;

    /// Geometric Jacobian (6 × DOF), linear rows first.
    fn jacobian(&self, configuration: &Configuration) -> DMatrix<f64>;

    /// Whether every joint lies inside its limits.
    fn is_within_joint_limits(&self, configuration: &Configuration) -> bool;

    /// Jacobian pseudo-inverse (DOF × 6), or `None` if it cannot be formed.
    fn jacobian_inverse(&self, configuration: &Configuration) -> Option<DMatrix<f64>> {
        self.jacobian(configuration)
            .svd(true, true)
            .pseudo_inverse(PSEUDO_INVERSE_TOLERANCE)
            .ok()
    }

    /// Joint velocity producing the task-space twist `task_delta`.
    fn inverse_velocity(
        &self,
        configuration: &Configuration,
        task_delta: &Vector6<f64>,
    ) -> Configuration {
        match self.jacobian_inverse(configuration) {
            Some(inverse) => inverse * DVector::from_column_slice(task_delta.as_slice()),
            None => {
                tracing::warn!("Jacobian pseudo-inverse unavailable, commanding zero velocity");
                DVector::zeros(self.dof())
            }
        }
    }

    /// Manipulability measure at `configuration`.
    fn manipulability(&self, configuration: &Configuration) -> f64 {
        let jacobian = self.jacobian(configuration);
        let singular_values = jacobian.singular_values();
        self.jacobian_manipulability(&jacobian, &singular_values)
    }

    /// Manipulability of an evaluated `jacobian` with singular values
    /// `singular_values`. Defaults to their product.
    ///
    /// Equals `sqrt(det(J Jᵀ))` for a chain with six or more joints and
    /// `sqrt(det(Jᵀ J))` for fewer.
    fn jacobian_manipulability(
        &self,
        _jacobian: &DMatrix<f64>,
        singular_values: &DVector<f64>,
    ) -> f64 {
        singular_values.iter().product()
    }
}

/// Everything the controller recomputes for a proposed configuration.
#[derive(Debug, Clone)]
pub struct KinematicState {
    pub pose: Isometry3<f64>,
    pub jacobian: DMatrix<f64>,
    pub jacobian_inverse: Option<DMatrix<f64>>,
    pub manipulability: f64,
}

impl KinematicState {
    /// Update frames, Jacobian, Jacobian inverse and manipulability at
    /// `configuration`, rejecting non-finite adapter output.
    ///
    /// The Jacobian is queried once and decomposed once; the inverse and the
    /// manipulability both come from that decomposition.
    pub fn evaluate<K: Kinematics + ?Sized>(
        kinematics: &K,
        configuration: &Configuration,
    ) -> Result<Self> {
        let pose = kinematics.forward_pose(configuration);
        if !pose.translation.vector.iter().all(|v| v.is_finite())
            || !pose.rotation.coords.iter().all(|v| v.is_finite())
        {
            return Err(ControlError::NonFinite("forward pose"));
        }

        let jacobian = kinematics.jacobian(configuration);
        if !jacobian.iter().all(|v| v.is_finite()) {
            return Err(ControlError::NonFinite("jacobian"));
        }

        let svd = jacobian.clone().svd(true, true);
        let manipulability = kinematics.jacobian_manipulability(&jacobian, &svd.singular_values);
        if !manipulability.is_finite() {
            return Err(ControlError::NonFinite("manipulability"));
        }

        let jacobian_inverse = svd.pseudo_inverse(PSEUDO_INVERSE_TOLERANCE).ok();
        if let Some(inverse) = &jacobian_inverse {
            if !inverse.iter().all(|v| v.is_finite()) {
                return Err(ControlError::NonFinite("jacobian inverse"));
            }
        }

        Ok(Self {
            pose,
            jacobian,
            jacobian_inverse,
            manipulability,
        })
    }
}

/// Task-space twist taking `current` to `target`.
///
/// Linear part is the translation difference, angular part the rotation
/// vector of `target.R * current.R⁻¹`, both expressed in the world frame.
pub fn task_space_delta(current: &Isometry3<f64>, target: &Isometry3<f64>) -> Vector6<f64> {
    let linear = target.translation.vector - current.translation.vector;
    let angular = (target.rotation * current.rotation.inverse()).scaled_axis();
    Vector6::new(
        linear.x, linear.y, linear.z, angular.x, angular.y, angular.z,
    )
}

/// Whether every component of a configuration is finite.
pub(crate) fn is_finite(configuration: &Configuration) -> bool {
    configuration.iter().all(|v| v.is_finite())
}
