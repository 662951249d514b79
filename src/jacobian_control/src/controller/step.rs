//! Step controller.
//!
//! Each step:
//! 1. Compute the joint velocity from the belief mean towards the target, or
//!    take the next recorded command when replaying
//! 2. Stop if it is shorter than `delta` (target reached)
//! 3. Propagate every particle by the velocity plus motion noise
//! 4. Check joint limits, singularity and contacts of every particle
//! 5. Classify the step's contacts and decide whether to continue

use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::{DVector, Isometry3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use super::config::{ControllerConfig, MoveSettings, SINGULARITY_MIN_DOF, SINGULARITY_THRESHOLD};
use super::observer::{ControllerObserver, NullObserver};
use super::result::{MotionResult, Outcome};
use crate::belief::{BeliefState, NoiseModel, Particle};
use crate::collision::{
    check_collision_constraints, CollisionDetector, CollisionTypes, ContactPair,
    RequiredCollisionsCounter,
};
use crate::error::{check_dimension, ControlError, Result};
use crate::kinematics::{is_finite, task_space_delta, Configuration, KinematicState, Kinematics};

/// Jacobian-based approach controller.
pub struct JacobianController<K, C> {
    kinematics: K,
    detector: C,
    config: ControllerConfig,
    observer: Arc<dyn ControllerObserver>,
}

/// Where each step's joint velocity comes from.
#[derive(Debug, Clone, Copy)]
enum Steering<'a> {
    /// Closed loop from the belief mean towards a target pose.
    Target(&'a Isometry3<f64>),
    /// Recorded velocity commands, applied in order.
    Replay(&'a [Configuration]),
}

impl Steering<'_> {
    fn step_limit(&self, maximum_steps: usize) -> usize {
        match self {
            Steering::Target(_) => maximum_steps,
            Steering::Replay(q_dots) => q_dots.len(),
        }
    }

    fn is_replay(&self) -> bool {
        matches!(self, Steering::Replay(_))
    }
}

/// Outcome of a run that stops moving: reached, unless a required contact is
/// still missing.
fn arrival_outcome(required_counter: &RequiredCollisionsCounter) -> Outcome {
    if required_counter.all_required_present() {
        Outcome::Reached
    } else {
        let missing: Vec<_> = required_counter.missing().collect();
        tracing::debug!(?missing, "target reached without required contacts");
        Outcome::MissedRequiredCollisions
    }
}

/// What one particle produced in one step.
#[derive(Debug)]
struct PropagatedParticle {
    config: Configuration,
    within_limits: bool,
    singular: bool,
    contacts: Vec<ContactPair>,
}

impl<K: Kinematics, C: CollisionDetector> JacobianController<K, C> {
    /// Create a controller.
    ///
    /// Fails if `config` has a non-positive `delta`.
    pub fn new(kinematics: K, detector: C, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kinematics,
            detector,
            config,
            observer: Arc::new(NullObserver),
        })
    }

    /// Attach an observer notified of every run start and belief mean.
    pub fn with_observer(mut self, observer: Arc<dyn ControllerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn kinematics(&self) -> &K {
        &self.kinematics
    }

    pub fn detector(&self) -> &C {
        &self.detector
    }

    pub fn dof(&self) -> usize {
        self.kinematics.dof()
    }

    /// Move one noiseless particle from `initial_configuration` towards
    /// `target_pose`.
    pub fn move_single_particle(
        &self,
        initial_configuration: &Configuration,
        target_pose: &Isometry3<f64>,
        collision_types: &CollisionTypes,
    ) -> Result<MotionResult> {
        self.move_particles(
            initial_configuration,
            target_pose,
            collision_types,
            &MoveSettings::no_uncertainty(self.dof()),
        )
    }

    /// Sample a belief around `initial_configuration` and move it towards
    /// `target_pose` under `collision_types`.
    ///
    /// Returns an error only on contract violations (dimension mismatch,
    /// invalid settings, non-finite adapter output, detector failure); every
    /// other way a run can end is an [`Outcome`].
    pub fn move_particles(
        &self,
        initial_configuration: &Configuration,
        target_pose: &Isometry3<f64>,
        collision_types: &CollisionTypes,
        settings: &MoveSettings,
    ) -> Result<MotionResult> {
        self.drive(
            initial_configuration,
            Steering::Target(target_pose),
            collision_types,
            settings,
        )
    }

    /// Sample a belief around `initial_configuration` and apply `q_dots` to
    /// it one step at a time, without steering back towards any target.
    ///
    /// The run ends like a closed-loop run that reached its target once the
    /// commands run out. The observer is not notified.
    pub(super) fn replay_q_dots(
        &self,
        initial_configuration: &Configuration,
        q_dots: &[Configuration],
        collision_types: &CollisionTypes,
        settings: &MoveSettings,
    ) -> Result<MotionResult> {
        for q_dot in q_dots {
            check_dimension("joint velocity", self.dof(), q_dot.len())?;
        }
        self.drive(
            initial_configuration,
            Steering::Replay(q_dots),
            collision_types,
            settings,
        )
    }

    fn drive(
        &self,
        initial_configuration: &Configuration,
        steering: Steering<'_>,
        collision_types: &CollisionTypes,
        settings: &MoveSettings,
    ) -> Result<MotionResult> {
        let dof = self.dof();
        check_dimension("initial configuration", dof, initial_configuration.len())?;
        if !is_finite(initial_configuration) {
            return Err(ControlError::NonFinite("initial configuration"));
        }
        let noise = settings.noise_model(dof)?;

        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let initial_belief = if settings.is_deterministic() {
            BeliefState::certain(initial_configuration.clone())
        } else {
            BeliefState::sample_around(
                initial_configuration,
                settings.number_of_particles,
                &noise,
                &mut rng,
            )
        };

        tracing::debug!(
            dof,
            particles = initial_belief.len(),
            delta = self.config.delta,
            maximum_steps = steering.step_limit(self.config.maximum_steps),
            replay = steering.is_replay(),
            "starting controller run"
        );

        let result = self.run(initial_belief, steering, collision_types, &noise, &mut rng)?;

        tracing::debug!(
            steps = result.steps(),
            outcome = %result.description(),
            "controller run finished"
        );
        Ok(result)
    }

    fn run(
        &self,
        initial_belief: BeliefState,
        steering: Steering<'_>,
        collision_types: &CollisionTypes,
        noise: &NoiseModel,
        rng: &mut StdRng,
    ) -> Result<MotionResult> {
        let mut required_counter = collision_types.make_required_collisions_counter();
        let notify = !steering.is_replay();

        let mut result = MotionResult::start(initial_belief);
        if notify {
            self.observer.reset();
            self.observer.on_mean_configuration(&result.mean_trajectory[0]);
        }

        let mut current_mean = result.mean_trajectory[0].clone();

        for step in 0..steering.step_limit(self.config.maximum_steps) {
            let q_dot = match steering {
                Steering::Target(target_pose) => self.calculate_q_dot(&current_mean, target_pose)?,
                Steering::Replay(q_dots) => q_dots[step].clone(),
            };
            if q_dot.iter().all(|&v| v == 0.0) {
                tracing::trace!(step, "velocity below delta");
                return Ok(result.with_single_outcome(arrival_outcome(&required_counter)));
            }

            // Draw noise in particle order so parallel propagation stays
            // reproducible.
            let particles = result.final_belief.particles();
            let motion_errors: Vec<DVector<f64>> = particles
                .iter()
                .map(|_| noise.sample_motion_error(rng))
                .collect();
            let noise_scale = q_dot.map(|v| v.abs().sqrt());

            let propagated = particles
                .par_iter()
                .zip(motion_errors.par_iter())
                .map(|(particle, motion_error)| {
                    let scaled_noise = motion_error.component_mul(&noise_scale);
                    self.propagate(particle, &q_dot, &scaled_noise, noise)
                })
                .collect::<Result<Vec<_>>>()?;

            let mut outcomes = BTreeSet::new();
            let mut contacts = Vec::new();
            let mut next_particles = Vec::with_capacity(propagated.len());
            for particle in propagated {
                if !particle.within_limits {
                    outcomes.insert(Outcome::JointLimit);
                }
                if particle.singular {
                    outcomes.insert(Outcome::Singularity);
                }
                contacts.extend(particle.contacts);
                next_particles.push(Particle::new(particle.config));
            }

            let next_belief = BeliefState::new(next_particles)
                .ok_or(ControlError::NonFinite("belief"))?;
            current_mean = next_belief.config_mean();
            result.final_belief = next_belief;
            result.q_dots.push(q_dot);
            result.mean_trajectory.push(current_mean.clone());
            if notify {
                self.observer.on_mean_configuration(&current_mean);
            }

            let check =
                check_collision_constraints(&contacts, collision_types, &mut required_counter);
            outcomes.extend(check.failures);

            tracing::trace!(
                step,
                contacts = contacts.len(),
                failures = outcomes.len(),
                "propagated belief"
            );

            if !outcomes.is_empty() {
                result.outcomes = outcomes;
                return Ok(result);
            }
            if check.success_termination {
                return Ok(result.with_single_outcome(Outcome::AcceptableCollision));
            }
        }

        let outcome = match steering {
            Steering::Target(_) => Outcome::StepsLimit,
            Steering::Replay(_) => arrival_outcome(&required_counter),
        };
        Ok(result.with_single_outcome(outcome))
    }

    /// Joint velocity of magnitude `delta` towards `target_pose`, or zero
    /// when the unscaled velocity is shorter than `delta`.
    pub fn calculate_q_dot(
        &self,
        configuration: &Configuration,
        target_pose: &Isometry3<f64>,
    ) -> Result<Configuration> {
        let current_pose = self.kinematics.forward_pose(configuration);
        let twist = task_space_delta(&current_pose, target_pose);
        if !twist.iter().all(|v| v.is_finite()) {
            return Err(ControlError::NonFinite("forward pose"));
        }

        let q_dot = self.kinematics.inverse_velocity(configuration, &twist);
        check_dimension("joint velocity", self.dof(), q_dot.len())?;
        if !is_finite(&q_dot) {
            return Err(ControlError::NonFinite("joint velocity"));
        }

        let norm = q_dot.norm();
        if norm < self.config.delta {
            Ok(DVector::zeros(self.dof()))
        } else {
            Ok(q_dot / norm * self.config.delta)
        }
    }

    fn propagate(
        &self,
        particle: &Particle,
        q_dot: &Configuration,
        scaled_noise: &Configuration,
        noise: &NoiseModel,
    ) -> Result<PropagatedParticle> {
        let config = &particle.config + q_dot + scaled_noise;
        if !is_finite(&config) {
            return Err(ControlError::NonFinite("configuration"));
        }

        let within_limits = noise.is_valid(&self.kinematics, &config);
        let state = KinematicState::evaluate(&self.kinematics, &config)?;
        let singular =
            self.dof() > SINGULARITY_MIN_DOF && state.manipulability < SINGULARITY_THRESHOLD;
        let contacts = self.detector.contacts_at(&config)?;

        Ok(PropagatedParticle {
            config,
            within_limits,
            singular,
            contacts,
        })
    }
}
