//! JSON report of a kinematics check.

use std::io::Write;

use anyhow::{Context, Result};
use nalgebra::Isometry3;
use serde::Serialize;

use crate::goal_sampling::{Attempt, CheckOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub success: bool,
    /// Index of the successful attempt (0 is the exact goal)
    pub successful_attempt: Option<usize>,
    pub attempts: Vec<AttemptReport>,
    /// Last configuration of the successful attempt
    pub final_configuration: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptReport {
    pub index: usize,
    pub goal: PoseReport,
    pub success: bool,
    pub outcomes: Vec<String>,
    pub description: String,
    /// Fraction of successful particles, for belief runs
    pub success_ratio: Option<f64>,
    pub steps: usize,
    pub mean_trajectory: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoseReport {
    pub position: [f64; 3],
    /// Quaternion as x, y, z, w
    pub orientation: [f64; 4],
}

impl From<&Isometry3<f64>> for PoseReport {
    fn from(pose: &Isometry3<f64>) -> Self {
        let t = pose.translation.vector;
        let q = pose.rotation.coords;
        Self {
            position: [t.x, t.y, t.z],
            orientation: [q.x, q.y, q.z, q.w],
        }
    }
}

impl From<&Attempt> for AttemptReport {
    fn from(attempt: &Attempt) -> Self {
        let motion = attempt.result.motion();
        Self {
            index: attempt.index,
            goal: PoseReport::from(&attempt.goal),
            success: attempt.result.is_success(),
            outcomes: motion.outcomes.iter().map(|o| o.to_string()).collect(),
            description: attempt.result.description(),
            success_ratio: attempt.result.success_ratio(),
            steps: motion.steps(),
            mean_trajectory: motion
                .mean_trajectory
                .iter()
                .map(|q| q.iter().copied().collect())
                .collect(),
        }
    }
}

impl From<&CheckOutcome> for CheckReport {
    fn from(outcome: &CheckOutcome) -> Self {
        let successful = outcome.successful_attempt();
        Self {
            success: successful.is_some(),
            successful_attempt: successful.map(|attempt| attempt.index),
            attempts: outcome.attempts.iter().map(AttemptReport::from).collect(),
            final_configuration: successful
                .and_then(|attempt| attempt.result.motion().final_configuration())
                .map(|q| q.iter().copied().collect()),
        }
    }
}

impl CheckReport {
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context("Failed to serialize report")
    }
}
