//! Outcomes and results of controller runs.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::belief::BeliefState;
use crate::kinematics::Configuration;

/// Why a run terminated.
///
/// The declaration order is the order used in descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Target pose reached with every required contact seen.
    Reached,
    /// Stopped on a terminating contact with every required contact seen.
    AcceptableCollision,
    /// A prohibited pair made contact.
    UnacceptableCollision,
    /// A part without sensors made a contact that is not ignored.
    UnsensorizedCollision,
    /// Manipulability dropped below the singularity threshold.
    Singularity,
    /// A particle left the joint limits.
    JointLimit,
    /// Step budget exhausted.
    StepsLimit,
    /// Target reached but a required contact never happened.
    MissedRequiredCollisions,
}

impl Outcome {
    pub const ALL: [Outcome; 8] = [
        Outcome::Reached,
        Outcome::AcceptableCollision,
        Outcome::UnacceptableCollision,
        Outcome::UnsensorizedCollision,
        Outcome::Singularity,
        Outcome::JointLimit,
        Outcome::StepsLimit,
        Outcome::MissedRequiredCollisions,
    ];

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Reached | Outcome::AcceptableCollision)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Outcome::Reached => "reached the goal frame",
            Outcome::AcceptableCollision => "ended on acceptable collision",
            Outcome::UnacceptableCollision => "ended on unacceptable collision",
            Outcome::UnsensorizedCollision => "ended on unsensorized collision",
            Outcome::Singularity => "ended in the singularity",
            Outcome::JointLimit => "violated the joint limit",
            Outcome::StepsLimit => "went over the steps limit",
            Outcome::MissedRequiredCollisions => "missing required collisions",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Result of one controller run.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionResult {
    /// Belief mean at the start and after every propagation step.
    pub mean_trajectory: Vec<Configuration>,
    /// Joint velocity commanded at every propagation step.
    pub q_dots: Vec<Configuration>,
    /// Belief after the last propagation step (the initial belief if the run
    /// stopped before propagating).
    pub final_belief: BeliefState,
    /// Either a single success outcome or one or more failure outcomes.
    pub outcomes: BTreeSet<Outcome>,
}

impl MotionResult {
    /// Start a result at `initial_belief`, recording its mean.
    pub fn start(initial_belief: BeliefState) -> Self {
        Self {
            mean_trajectory: vec![initial_belief.config_mean()],
            q_dots: Vec::new(),
            final_belief: initial_belief,
            outcomes: BTreeSet::new(),
        }
    }

    /// Replace all outcomes with `outcome`.
    pub fn with_single_outcome(mut self, outcome: Outcome) -> Self {
        self.outcomes.clear();
        self.outcomes.insert(outcome);
        self
    }

    /// Exactly one outcome, and it is `Reached` or `AcceptableCollision`.
    pub fn is_success(&self) -> bool {
        debug_assert!(!self.outcomes.is_empty());
        match self.outcomes.iter().next() {
            Some(outcome) => self.outcomes.len() == 1 && outcome.is_success(),
            None => false,
        }
    }

    pub fn has_outcome(&self, outcome: Outcome) -> bool {
        self.outcomes.contains(&outcome)
    }

    /// Number of propagation steps taken.
    pub fn steps(&self) -> usize {
        self.mean_trajectory.len().saturating_sub(1)
    }

    pub fn final_configuration(&self) -> Option<&Configuration> {
        self.mean_trajectory.last()
    }

    /// Comma-separated outcome descriptions.
    pub fn description(&self) -> String {
        self.outcomes
            .iter()
            .map(Outcome::description)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of the two-phase belief controller.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefResult {
    /// Deterministic single-particle run.
    pub no_noise_test_result: MotionResult,
    /// One result per particle; `None` if the noiseless run failed.
    pub particle_results: Option<Vec<MotionResult>>,
}

impl BeliefResult {
    /// Noiseless run succeeded and so did every particle.
    pub fn is_success(&self) -> bool {
        self.no_noise_test_result.is_success()
            && self
                .particle_results
                .as_ref()
                .is_some_and(|results| results.iter().all(MotionResult::is_success))
    }

    /// Fraction of successful particles (0 when particles were not run).
    pub fn success_ratio(&self) -> f64 {
        match &self.particle_results {
            Some(results) if !results.is_empty() => {
                let successes = results.iter().filter(|r| r.is_success()).count();
                successes as f64 / results.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn description(&self) -> String {
        match &self.particle_results {
            None => format!("noiseless run {}", self.no_noise_test_result.description()),
            Some(results) => format!(
                "noiseless run {}; {} of {} particles succeeded",
                self.no_noise_test_result.description(),
                results.iter().filter(|r| r.is_success()).count(),
                results.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn result_with(outcomes: &[Outcome]) -> MotionResult {
        let mut result = MotionResult::start(BeliefState::certain(DVector::zeros(2)));
        result.outcomes.extend(outcomes.iter().copied());
        result
    }

    #[test]
    fn test_success_semantics() {
        assert!(result_with(&[Outcome::Reached]).is_success());
        assert!(result_with(&[Outcome::AcceptableCollision]).is_success());
        for outcome in Outcome::ALL.iter().filter(|o| !o.is_success()) {
            assert!(!result_with(&[*outcome]).is_success());
        }
        assert!(!result_with(&[Outcome::JointLimit, Outcome::Singularity]).is_success());
        assert!(!result_with(&[Outcome::Reached, Outcome::JointLimit]).is_success());
    }

    #[test]
    fn test_with_single_outcome_replaces() {
        let result = result_with(&[Outcome::JointLimit, Outcome::Singularity])
            .with_single_outcome(Outcome::StepsLimit);
        assert_eq!(result.outcomes, BTreeSet::from([Outcome::StepsLimit]));
    }

    #[test]
    fn test_description_is_ordered() {
        let a = result_with(&[Outcome::JointLimit, Outcome::Singularity]);
        let b = result_with(&[Outcome::Singularity, Outcome::JointLimit]);
        assert_eq!(a, b);
        assert_eq!(
            a.description(),
            "ended in the singularity, violated the joint limit"
        );
    }

    #[test]
    fn test_start_records_initial_mean() {
        let result = MotionResult::start(BeliefState::certain(DVector::from_vec(vec![1.0, 2.0])));
        assert_eq!(result.mean_trajectory.len(), 1);
        assert_eq!(result.steps(), 0);
        assert_eq!(
            result.final_configuration(),
            Some(&DVector::from_vec(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn test_belief_result_success() {
        let failed = BeliefResult {
            no_noise_test_result: result_with(&[Outcome::JointLimit]),
            particle_results: None,
        };
        assert!(!failed.is_success());
        assert_eq!(failed.success_ratio(), 0.0);
        assert_eq!(failed.description(), "noiseless run violated the joint limit");

        let partial = BeliefResult {
            no_noise_test_result: result_with(&[Outcome::Reached]),
            particle_results: Some(vec![
                result_with(&[Outcome::Reached]),
                result_with(&[Outcome::UnacceptableCollision]),
            ]),
        };
        assert!(!partial.is_success());
        assert_eq!(partial.success_ratio(), 0.5);

        let complete = BeliefResult {
            no_noise_test_result: result_with(&[Outcome::Reached]),
            particle_results: Some(vec![
                result_with(&[Outcome::Reached]),
                result_with(&[Outcome::AcceptableCollision]),
            ]),
        };
        assert!(complete.is_success());
        assert_eq!(complete.success_ratio(), 1.0);
    }

    #[test]
    fn test_outcome_display_and_order() {
        assert_eq!(Outcome::MissedRequiredCollisions.to_string(), "missing required collisions");
        assert!(Outcome::Reached < Outcome::StepsLimit);
    }
}
