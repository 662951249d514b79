//! Particle belief over joint configurations.

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use super::noise::NoiseModel;
use crate::kinematics::Configuration;

/// A particle is one configuration hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub config: Configuration,
}

impl Particle {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }
}

/// Ordered set of particles approximating the distribution of the robot
/// configuration.
///
/// A belief is never updated in place; each control step builds a new one
/// from the propagated particles.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefState {
    particles: Vec<Particle>,
}

impl BeliefState {
    /// Build a belief from particles. Returns `None` if `particles` is empty
    /// or the configurations differ in length.
    pub fn new(particles: Vec<Particle>) -> Option<Self> {
        let dof = particles.first()?.config.len();
        if particles.iter().any(|p| p.config.len() != dof) {
            return None;
        }
        Some(Self { particles })
    }

    /// Belief concentrated on a single configuration.
    pub fn certain(config: Configuration) -> Self {
        Self {
            particles: vec![Particle::new(config)],
        }
    }

    /// Sample `count` particles around `center` using the initial error of
    /// `noise`.
    pub fn sample_around<R: Rng + ?Sized>(
        center: &Configuration,
        count: usize,
        noise: &NoiseModel,
        rng: &mut R,
    ) -> Self {
        let particles = (0..count.max(1))
            .map(|_| Particle::new(center + noise.sample_initial_error(rng)))
            .collect();
        Self { particles }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn dof(&self) -> usize {
        self.particles[0].config.len()
    }

    /// Component-wise mean configuration.
    pub fn config_mean(&self) -> Configuration {
        let mut sum = DVector::zeros(self.dof());
        for particle in &self.particles {
            sum += &particle.config;
        }
        sum / self.particles.len() as f64
    }

    /// Sample covariance of the particle configurations (zero for a single
    /// particle).
    pub fn config_covariance(&self) -> DMatrix<f64> {
        let dof = self.dof();
        let n = self.particles.len();
        if n < 2 {
            return DMatrix::zeros(dof, dof);
        }

        let mean = self.config_mean();
        let mut covariance = DMatrix::zeros(dof, dof);
        for particle in &self.particles {
            let centered = &particle.config - &mean;
            covariance += &centered * centered.transpose();
        }
        covariance / (n - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(values: &[f64]) -> Configuration {
        DVector::from_column_slice(values)
    }

    #[test]
    fn test_new_rejects_empty_and_ragged() {
        assert!(BeliefState::new(vec![]).is_none());
        assert!(BeliefState::new(vec![
            Particle::new(config(&[0.0, 1.0])),
            Particle::new(config(&[0.0])),
        ])
        .is_none());
    }

    #[test]
    fn test_config_mean() {
        let belief = BeliefState::new(vec![
            Particle::new(config(&[0.0, 1.0])),
            Particle::new(config(&[1.0, 3.0])),
            Particle::new(config(&[2.0, 5.0])),
        ])
        .unwrap();

        let mean = belief.config_mean();

        assert_relative_eq!(mean[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(mean[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_particle_mean_is_exact() {
        let belief = BeliefState::certain(config(&[0.09999999999999999]));
        assert_eq!(belief.config_mean()[0], 0.09999999999999999);
        assert_eq!(belief.config_covariance(), DMatrix::zeros(1, 1));
    }

    #[test]
    fn test_config_covariance() {
        let belief = BeliefState::new(vec![
            Particle::new(config(&[0.0, 0.0])),
            Particle::new(config(&[2.0, -2.0])),
        ])
        .unwrap();

        let covariance = belief.config_covariance();

        assert_relative_eq!(covariance[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(covariance[(1, 1)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(covariance[(0, 1)], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_around_without_error() {
        let noise = NoiseModel::noiseless(2);
        let mut rng = StdRng::seed_from_u64(1);
        let center = config(&[0.3, -0.4]);

        let belief = BeliefState::sample_around(&center, 4, &noise, &mut rng);

        assert_eq!(belief.len(), 4);
        assert!(belief.particles().iter().all(|p| p.config == center));
    }

    #[test]
    fn test_sample_around_spreads_particles() {
        let noise = NoiseModel::new(DVector::from_element(2, 0.05), DVector::zeros(2)).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let center = config(&[1.0, 1.0]);

        let belief = BeliefState::sample_around(&center, 500, &noise, &mut rng);

        let mean = belief.config_mean();
        assert!((mean - &center).norm() < 0.02);
        let covariance = belief.config_covariance();
        assert!((covariance[(0, 0)].sqrt() - 0.05).abs() < 0.01);
    }
}
