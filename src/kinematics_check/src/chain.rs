//! Planar revolute chain.
//!
//! Every joint rotates about the world Z axis and every link lies in the XY
//! plane. The end-effector frame is attached to the tip of the last link with
//! its X axis along that link.

use jacobian_control::{Configuration, Kinematics};
use nalgebra::{DMatrix, DVector, Isometry3, Translation3, UnitQuaternion, Vector3};

/// Rows of the geometric Jacobian that a planar chain can move: x, y and the
/// rotation about z.
const PLANAR_ROWS: [usize; 3] = [0, 1, 5];

#[derive(Debug, Clone)]
pub struct PlanarChain {
    link_lengths: Vec<f64>,
    lower_limits: Vec<f64>,
    upper_limits: Vec<f64>,
}

impl PlanarChain {
    /// Chain with the given link lengths and joint limits (radians).
    ///
    /// Returns `None` if the three vectors differ in length or are empty.
    pub fn new(link_lengths: Vec<f64>, lower_limits: Vec<f64>, upper_limits: Vec<f64>) -> Option<Self> {
        if link_lengths.is_empty()
            || link_lengths.len() != lower_limits.len()
            || link_lengths.len() != upper_limits.len()
        {
            return None;
        }
        Some(Self {
            link_lengths,
            lower_limits,
            upper_limits,
        })
    }

    /// Positions of the base, every joint after the first, and the tip.
    pub fn joint_positions(&self, configuration: &Configuration) -> Vec<Vector3<f64>> {
        let mut positions = Vec::with_capacity(self.link_lengths.len() + 1);
        let mut position = Vector3::zeros();
        let mut angle = 0.0_f64;
        positions.push(position);
        for (length, q) in self.link_lengths.iter().zip(configuration.iter()) {
            angle += *q;
            position += Vector3::new(angle.cos(), angle.sin(), 0.0) * *length;
            positions.push(position);
        }
        positions
    }
}

impl Kinematics for PlanarChain {
    fn dof(&self) -> usize {
        self.link_lengths.len()
    }

    fn forward_pose(&self, configuration: &Configuration) -> Isometry3<f64> {
        let tip = self
            .joint_positions(configuration)
            .last()
            .copied()
            .unwrap_or_else(Vector3::zeros);
        let yaw: f64 = configuration.iter().sum();
        Isometry3::from_parts(
            Translation3::from(tip),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        )
    }

    fn jacobian(&self, configuration: &Configuration) -> DMatrix<f64> {
        let positions = self.joint_positions(configuration);
        let tip = positions[positions.len() - 1];
        let dof = self.dof();

        let mut jacobian = DMatrix::zeros(6, dof);
        for joint in 0..dof {
            // z × (tip - joint)
            let arm = tip - positions[joint];
            jacobian[(0, joint)] = -arm.y;
            jacobian[(1, joint)] = arm.x;
            jacobian[(5, joint)] = 1.0;
        }
        jacobian
    }

    fn is_within_joint_limits(&self, configuration: &Configuration) -> bool {
        configuration
            .iter()
            .zip(self.lower_limits.iter().zip(self.upper_limits.iter()))
            .all(|(q, (lower, upper))| q >= lower && q <= upper)
    }

    /// Manipulability of the planar part of the Jacobian.
    ///
    /// The full 6 × DOF Jacobian never has more than three non-zero singular
    /// values, so its product would call every chain with more than three
    /// joints singular.
    fn jacobian_manipulability(
        &self,
        jacobian: &DMatrix<f64>,
        _singular_values: &DVector<f64>,
    ) -> f64 {
        let planar = DMatrix::from_fn(PLANAR_ROWS.len(), self.dof(), |row, col| {
            jacobian[(PLANAR_ROWS[row], col)]
        });
        planar.svd(false, false).singular_values.iter().product()
    }
}
