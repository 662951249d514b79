//! Gaussian joint noise model.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ControlError, Result};
use crate::kinematics::{Configuration, Kinematics};

/// Per-joint zero-mean Gaussian error on the initial configuration and on
/// every commanded motion.
///
/// Joints with a zero standard deviation are never sampled, so an all-zero
/// model consumes no randomness and executes deterministically.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    initial_error: DVector<f64>,
    motion_error: DVector<f64>,
    initial_distributions: Vec<Option<Normal<f64>>>,
    motion_distributions: Vec<Option<Normal<f64>>>,
}

impl NoiseModel {
    /// Create a noise model from per-joint standard deviations.
    pub fn new(initial_error: DVector<f64>, motion_error: DVector<f64>) -> Result<Self> {
        if initial_error.len() != motion_error.len() {
            return Err(ControlError::DimensionMismatch {
                what: "motion error",
                expected: initial_error.len(),
                actual: motion_error.len(),
            });
        }
        let initial_distributions = distributions("initial error", &initial_error)?;
        let motion_distributions = distributions("motion error", &motion_error)?;
        Ok(Self {
            initial_error,
            motion_error,
            initial_distributions,
            motion_distributions,
        })
    }

    /// Model without any error.
    pub fn noiseless(dof: usize) -> Self {
        Self {
            initial_error: DVector::zeros(dof),
            motion_error: DVector::zeros(dof),
            initial_distributions: vec![None; dof],
            motion_distributions: vec![None; dof],
        }
    }

    pub fn dof(&self) -> usize {
        self.motion_error.len()
    }

    pub fn initial_error(&self) -> &DVector<f64> {
        &self.initial_error
    }

    pub fn motion_error(&self) -> &DVector<f64> {
        &self.motion_error
    }

    pub fn is_noiseless(&self) -> bool {
        self.initial_distributions.iter().all(Option::is_none)
            && self.motion_distributions.iter().all(Option::is_none)
    }

    /// Draw an initial configuration offset.
    pub fn sample_initial_error<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        sample(&self.initial_distributions, rng)
    }

    /// Draw a motion error for one particle and one step.
    pub fn sample_motion_error<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        sample(&self.motion_distributions, rng)
    }

    /// Joint-limit validity of a configuration under `kinematics`.
    pub fn is_valid<K: Kinematics + ?Sized>(
        &self,
        kinematics: &K,
        configuration: &Configuration,
    ) -> bool {
        kinematics.is_within_joint_limits(configuration)
    }
}

fn distributions(what: &str, std_error: &DVector<f64>) -> Result<Vec<Option<Normal<f64>>>> {
    std_error
        .iter()
        .map(|&sigma| {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(ControlError::InvalidSettings(format!(
                    "{what} standard deviation must be finite and non-negative, got {sigma}"
                )));
            }
            if sigma == 0.0 {
                return Ok(None);
            }
            Normal::new(0.0, sigma)
                .map(Some)
                .map_err(|e| ControlError::InvalidSettings(format!("{what}: {e}")))
        })
        .collect()
}

fn sample<R: Rng + ?Sized>(distributions: &[Option<Normal<f64>>], rng: &mut R) -> DVector<f64> {
    DVector::from_iterator(
        distributions.len(),
        distributions.iter().map(|d| match d {
            Some(normal) => normal.sample(rng),
            None => 0.0,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_noiseless_does_not_consume_rng() {
        let model = NoiseModel::noiseless(3);
        let mut rng = StdRng::seed_from_u64(7);
        let mut reference = StdRng::seed_from_u64(7);

        assert!(model.is_noiseless());
        assert_eq!(model.sample_motion_error(&mut rng), DVector::zeros(3));
        assert_eq!(model.sample_initial_error(&mut rng), DVector::zeros(3));
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn test_zero_joint_stays_zero() {
        let model = NoiseModel::new(
            DVector::from_vec(vec![0.0, 0.1]),
            DVector::from_vec(vec![0.2, 0.0]),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let initial = model.sample_initial_error(&mut rng);
            let motion = model.sample_motion_error(&mut rng);
            assert_eq!(initial[0], 0.0);
            assert_eq!(motion[1], 0.0);
        }
        assert!(!model.is_noiseless());
    }

    #[test]
    fn test_sample_statistics() {
        let model = NoiseModel::new(DVector::zeros(1), DVector::from_element(1, 0.5)).unwrap();
        let mut rng = StdRng::seed_from_u64(123);
        let n = 20_000;

        let samples: Vec<f64> = (0..n).map(|_| model.sample_motion_error(&mut rng)[0]).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;

        assert!(mean.abs() < 0.02);
        assert!((variance.sqrt() - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let model = NoiseModel::new(DVector::from_element(4, 0.1), DVector::from_element(4, 0.1)).unwrap();
        let mut a = StdRng::seed_from_u64(5);
        let mut b = StdRng::seed_from_u64(5);

        for _ in 0..5 {
            assert_eq!(model.sample_motion_error(&mut a), model.sample_motion_error(&mut b));
        }
    }

    #[test]
    fn test_rejects_invalid_errors() {
        assert!(NoiseModel::new(DVector::from_element(2, -0.1), DVector::zeros(2)).is_err());
        assert!(NoiseModel::new(DVector::zeros(2), DVector::from_element(2, f64::NAN)).is_err());
        assert!(matches!(
            NoiseModel::new(DVector::zeros(2), DVector::zeros(3)),
            Err(ControlError::DimensionMismatch { .. })
        ));
    }
}
