//! Goal sampling around an unreachable goal.
//!
//! The exact goal is tried first. If the controller does not succeed, goals
//! are drawn from a box around it: a uniform position offset within
//! `±position_deltas` and a rotation `Rz(γ) · Ry(β) · Rx(α)` applied on top of
//! the goal orientation with each angle uniform within `±orientation_deltas`.
//! The first successful attempt wins.

use anyhow::{ensure, Result};
use jacobian_control::{
    BeliefResult, CollisionDetector, CollisionTypes, Configuration, JacobianController, Kinematics,
    MotionResult, MoveSettings,
};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Uniform goal perturbation.
#[derive(Debug, Clone)]
pub struct GoalSampler {
    position: [Uniform<f64>; 3],
    orientation: [Uniform<f64>; 3],
}

impl GoalSampler {
    pub fn new(position_deltas: [f64; 3], orientation_deltas: [f64; 3]) -> Result<Self> {
        for delta in position_deltas.iter().chain(orientation_deltas.iter()) {
            ensure!(
                delta.is_finite() && *delta >= 0.0,
                "sampling deltas must be finite and non-negative, got {delta}"
            );
        }
        let uniform = |delta: f64| Uniform::new_inclusive(-delta, delta);
        Ok(Self {
            position: position_deltas.map(uniform),
            orientation: orientation_deltas.map(uniform),
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, goal: &Isometry3<f64>, rng: &mut R) -> Isometry3<f64> {
        let offset = Vector3::new(
            self.position[0].sample(rng),
            self.position[1].sample(rng),
            self.position[2].sample(rng),
        );
        let [roll, pitch, yaw] = [
            self.orientation[0].sample(rng),
            self.orientation[1].sample(rng),
            self.orientation[2].sample(rng),
        ];

        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), pitch)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), roll)
            * goal.rotation;
        Isometry3::from_parts(
            Translation3::from(goal.translation.vector + offset),
            rotation,
        )
    }
}

/// Controller result of one attempt.
#[derive(Debug, Clone)]
pub enum RunResult {
    Single(MotionResult),
    Belief(BeliefResult),
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        match self {
            RunResult::Single(result) => result.is_success(),
            RunResult::Belief(result) => result.is_success(),
        }
    }

    /// The deterministic run: the only run, or the noiseless test of a belief.
    pub fn motion(&self) -> &MotionResult {
        match self {
            RunResult::Single(result) => result,
            RunResult::Belief(result) => &result.no_noise_test_result,
        }
    }

    pub fn success_ratio(&self) -> Option<f64> {
        match self {
            RunResult::Single(_) => None,
            RunResult::Belief(result) => Some(result.success_ratio()),
        }
    }

    pub fn description(&self) -> String {
        match self {
            RunResult::Single(result) => result.description(),
            RunResult::Belief(result) => result.description(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attempt {
    /// 0 for the exact goal, then 1.. for sampled goals
    pub index: usize,
    pub goal: Isometry3<f64>,
    pub result: RunResult,
}

/// All attempts of one check, the last one being the successful one if any.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub attempts: Vec<Attempt>,
}

impl CheckOutcome {
    pub fn successful_attempt(&self) -> Option<&Attempt> {
        self.attempts.last().filter(|attempt| attempt.result.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.successful_attempt().is_some()
    }
}

/// What to reach and how far the goal may be moved.
#[derive(Debug, Clone)]
pub struct GoalRequest {
    pub initial_configuration: Configuration,
    pub goal: Isometry3<f64>,
    pub sampler: GoalSampler,
    pub sample_count: usize,
}

/// Try the exact goal, then up to `sample_count` sampled goals.
///
/// Deterministic settings run a single particle; anything else runs the
/// two-phase belief controller.
pub fn check_kinematics<K, C, R>(
    controller: &JacobianController<K, C>,
    request: &GoalRequest,
    collision_types: &CollisionTypes,
    settings: &MoveSettings,
    rng: &mut R,
) -> Result<CheckOutcome>
where
    K: Kinematics,
    C: CollisionDetector,
    R: Rng + ?Sized,
{
    let run = |goal: &Isometry3<f64>| -> Result<RunResult> {
        if settings.is_deterministic() {
            Ok(RunResult::Single(controller.move_particles(
                &request.initial_configuration,
                goal,
                collision_types,
                settings,
            )?))
        } else {
            Ok(RunResult::Belief(controller.move_belief(
                &request.initial_configuration,
                goal,
                collision_types,
                settings,
            )?))
        }
    };

    tracing::info!("Trying to reach the goal frame");
    let result = run(&request.goal)?;
    let mut outcome = CheckOutcome {
        attempts: vec![Attempt {
            index: 0,
            goal: request.goal,
            result,
        }],
    };
    if outcome.is_success() {
        tracing::info!("Reached the exact goal frame");
        return Ok(outcome);
    }

    tracing::info!(
        samples = request.sample_count,
        "Beginning to sample within acceptable deltas"
    );
    for index in 1..=request.sample_count {
        let goal = request.sampler.sample(&request.goal, rng);
        tracing::debug!(
            index,
            translation = ?goal.translation.vector.as_slice(),
            "Trying sampled goal frame"
        );
        let result = run(&goal)?;
        let success = result.is_success();
        outcome.attempts.push(Attempt {
            index,
            goal,
            result,
        });
        if success {
            tracing::info!(attempt = index, "Reached a sampled goal frame");
            return Ok(outcome);
        }
    }

    tracing::info!(
        attempts = request.sample_count,
        "Could not reach the goal frame within the deltas"
    );
    Ok(outcome)
}
