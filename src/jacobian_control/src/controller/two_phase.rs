//! Two-phase belief controller.
//!
//! Phase 1 moves a single noiseless particle towards the target and records
//! the joint velocity of every step. Only if that succeeds does phase 2
//! repeat the recorded velocities open-loop for every particle of the
//! requested belief, each as its own single-particle run with its own initial
//! error and motion noise. Particles are not steered back onto the target, so
//! their error shows up as limit, singularity and contact failures.
//!
//! Only phase 1 reaches the observer.

use nalgebra::Isometry3;
use rayon::prelude::*;

use super::config::MoveSettings;
use super::result::BeliefResult;
use super::step::JacobianController;
use crate::collision::{CollisionDetector, CollisionTypes};
use crate::error::Result;
use crate::kinematics::{Configuration, Kinematics};

/// Golden-ratio increment used to spread per-particle seeds.
const SEED_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed of the phase-2 run of particle `index`.
fn particle_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64).wrapping_add(1).wrapping_mul(SEED_SPREAD)
}

impl<K: Kinematics, C: CollisionDetector> JacobianController<K, C> {
    /// Run the noiseless test and, if it succeeds, the full particle belief.
    pub fn move_belief(
        &self,
        initial_configuration: &Configuration,
        target_pose: &Isometry3<f64>,
        collision_types: &CollisionTypes,
        settings: &MoveSettings,
    ) -> Result<BeliefResult> {
        let dof = self.dof();
        settings.noise_model(dof)?;
        let base_seed = settings.seed.unwrap_or_else(rand::random);

        let phase_one = MoveSettings::no_uncertainty(dof).with_seed(base_seed);
        let no_noise_test_result =
            self.move_particles(initial_configuration, target_pose, collision_types, &phase_one)?;

        if !no_noise_test_result.is_success() {
            tracing::debug!(
                outcome = %no_noise_test_result.description(),
                "noiseless run failed, skipping particles"
            );
            return Ok(BeliefResult {
                no_noise_test_result,
                particle_results: None,
            });
        }

        tracing::debug!(
            particles = settings.number_of_particles,
            steps = no_noise_test_result.steps(),
            "noiseless run succeeded, replaying it with particles"
        );

        let q_dots = &no_noise_test_result.q_dots;
        let particle_results = (0..settings.number_of_particles)
            .into_par_iter()
            .map(|index| {
                let particle_settings = MoveSettings {
                    number_of_particles: 1,
                    initial_std_error: settings.initial_std_error.clone(),
                    joints_std_error: settings.joints_std_error.clone(),
                    seed: Some(particle_seed(base_seed, index)),
                };
                self.replay_q_dots(
                    initial_configuration,
                    q_dots,
                    collision_types,
                    &particle_settings,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let result = BeliefResult {
            no_noise_test_result,
            particle_results: Some(particle_results),
        };
        tracing::debug!(
            success_ratio = result.success_ratio(),
            "belief run finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionType, ContactPair, PartId};
    use crate::controller::{ControllerConfig, Outcome, TrajectoryRecorder};
    use crate::error::ControlError;
    use crate::test_utils::{PrismaticChain, ScriptedDetector};
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn controller(
        chain: PrismaticChain,
        detector: ScriptedDetector,
    ) -> JacobianController<PrismaticChain, ScriptedDetector> {
        let config = ControllerConfig::builder()
            .delta(0.01)
            .maximum_steps(50)
            .build()
            .unwrap();
        JacobianController::new(chain, detector, config).unwrap()
    }

    fn noisy_settings(particles: usize, seed: u64) -> MoveSettings {
        MoveSettings {
            number_of_particles: particles,
            initial_std_error: DVector::from_element(1, 0.001),
            joints_std_error: DVector::from_element(1, 0.001),
            seed: Some(seed),
        }
    }

    #[test]
    fn test_failed_noiseless_run_skips_particles() {
        let controller = controller(PrismaticChain::symmetric(1, 0.045), ScriptedDetector::empty());

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &CollisionTypes::new(),
                &noisy_settings(8, 1),
            )
            .unwrap();

        assert_eq!(
            result.no_noise_test_result.outcomes,
            BTreeSet::from([Outcome::JointLimit])
        );
        assert!(result.particle_results.is_none());
        assert!(!result.is_success());
        // Only the five noiseless steps touched the detector.
        assert_eq!(controller.detector().queries(), 5);
    }

    #[test]
    fn test_all_particles_reach() {
        let controller = controller(PrismaticChain::unbounded(1), ScriptedDetector::empty());

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &CollisionTypes::new(),
                &noisy_settings(8, 7),
            )
            .unwrap();

        assert!(result.no_noise_test_result.is_success());
        let particles = result.particle_results.as_ref().unwrap();
        assert_eq!(particles.len(), 8);
        assert!(particles.iter().all(|r| r.final_belief.len() == 1));
        assert!(result.is_success());
        assert_eq!(result.success_ratio(), 1.0);
    }

    #[test]
    fn test_particles_are_independent() {
        let controller = controller(PrismaticChain::unbounded(1), ScriptedDetector::empty());

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &CollisionTypes::new(),
                &noisy_settings(4, 99),
            )
            .unwrap();

        let particles = result.particle_results.unwrap();
        assert_ne!(particles[0].mean_trajectory[0], particles[1].mean_trajectory[0]);
    }

    #[test]
    fn test_seeded_belief_runs_are_identical() {
        let controller = controller(PrismaticChain::unbounded(1), ScriptedDetector::empty());
        let run = || {
            controller
                .move_belief(
                    &DVector::zeros(1),
                    &PrismaticChain::target(0.1, 0.0, 0.0),
                    &CollisionTypes::new(),
                    &noisy_settings(6, 42),
                )
                .unwrap()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_one_failing_particle_fails_belief() {
        // The noiseless run stops just inside the upper limit; noisy particles
        // overshoot it.
        let controller = controller(PrismaticChain::symmetric(1, 0.1), ScriptedDetector::empty());
        let settings = MoveSettings {
            number_of_particles: 32,
            initial_std_error: DVector::zeros(1),
            joints_std_error: DVector::from_element(1, 0.5),
            seed: Some(3),
        };

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &CollisionTypes::new(),
                &settings,
            )
            .unwrap();

        assert!(result.no_noise_test_result.is_success());
        assert!(!result.is_success());
        assert!(result.success_ratio() < 1.0);
        assert!(result
            .particle_results
            .unwrap()
            .iter()
            .any(|r| r.has_outcome(Outcome::JointLimit)));
    }

    #[test]
    fn test_invalid_settings_rejected_before_running() {
        let controller = controller(PrismaticChain::unbounded(1), ScriptedDetector::empty());
        let mut settings = noisy_settings(0, 1);

        let result = controller.move_belief(
            &DVector::zeros(1),
            &PrismaticChain::target(0.1, 0.0, 0.0),
            &CollisionTypes::new(),
            &settings,
        );
        assert!(matches!(result, Err(ControlError::InvalidSettings(_))));

        settings.number_of_particles = 2;
        settings.joints_std_error = DVector::from_element(1, -1.0);
        let result = controller.move_belief(
            &DVector::zeros(1),
            &PrismaticChain::target(0.1, 0.0, 0.0),
            &CollisionTypes::new(),
            &settings,
        );
        assert!(matches!(result, Err(ControlError::InvalidSettings(_))));
        assert_eq!(controller.detector().queries(), 0);
    }

    fn offset_only_settings(particles: usize, seed: u64) -> MoveSettings {
        MoveSettings {
            number_of_particles: particles,
            initial_std_error: DVector::from_element(1, 0.03),
            joints_std_error: DVector::zeros(1),
            seed: Some(seed),
        }
    }

    #[test]
    fn test_particles_replay_noiseless_velocities() {
        let controller = controller(PrismaticChain::unbounded(1), ScriptedDetector::empty());

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &CollisionTypes::new(),
                &offset_only_settings(8, 21),
            )
            .unwrap();

        let noiseless = &result.no_noise_test_result;
        assert_eq!(noiseless.q_dots.len(), 10);
        for particle in result.particle_results.as_ref().unwrap() {
            assert_eq!(particle.outcomes, BTreeSet::from([Outcome::Reached]));
            assert_eq!(particle.q_dots, noiseless.q_dots);
            // Open loop: the initial offset is carried to the end.
            let start = particle.mean_trajectory[0][0];
            assert_relative_eq!(
                particle.final_configuration().unwrap()[0],
                start + 0.1,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_initial_offset_reaches_prohibited_wall() {
        let wall = ContactPair::parse("palm_sensor", "wall").unwrap();
        let detector = ScriptedDetector::empty().with_contact(0, 0.12, wall);
        let controller = controller(PrismaticChain::unbounded(1), detector);
        let policy = CollisionTypes::new().with(
            PartId::parse("palm_sensor").unwrap(),
            PartId::parse("wall").unwrap(),
            CollisionType::prohibited(),
        );

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &policy,
                &offset_only_settings(64, 5),
            )
            .unwrap();

        assert!(result.no_noise_test_result.is_success());
        assert_eq!(result.no_noise_test_result.steps(), 10);
        assert!(!result.is_success());

        let particles = result.particle_results.unwrap();
        assert!(particles
            .iter()
            .any(|r| r.has_outcome(Outcome::UnacceptableCollision)));
        for particle in &particles {
            let start = particle.mean_trajectory[0][0];
            if particle.is_success() {
                assert!(start < 0.02 + 1e-9);
                assert_eq!(particle.steps(), 10);
            } else {
                assert_eq!(
                    particle.outcomes,
                    BTreeSet::from([Outcome::UnacceptableCollision])
                );
                assert!(start > 0.02 - 1e-9);
                assert!(particle.final_configuration().unwrap()[0] >= 0.12);
            }
        }
    }

    #[test]
    fn test_observer_sees_only_noiseless_run() {
        let recorder = Arc::new(TrajectoryRecorder::new());
        let controller = controller(PrismaticChain::unbounded(1), ScriptedDetector::empty())
            .with_observer(recorder.clone());

        let result = controller
            .move_belief(
                &DVector::zeros(1),
                &PrismaticChain::target(0.1, 0.0, 0.0),
                &CollisionTypes::new(),
                &noisy_settings(16, 12),
            )
            .unwrap();

        assert!(result.particle_results.is_some());
        assert_eq!(recorder.runs(), 1);
        assert_eq!(recorder.trajectory(), result.no_noise_test_result.mean_trajectory);
    }

    #[test]
    fn test_particle_seeds_differ() {
        assert_ne!(particle_seed(5, 0), 5);
        assert_ne!(particle_seed(5, 0), particle_seed(5, 1));
    }
}
