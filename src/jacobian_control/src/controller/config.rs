//! Controller and run settings.

use nalgebra::DVector;

use crate::belief::NoiseModel;
use crate::error::{check_dimension, ControlError, Result};

/// Default step magnitude (and arrival threshold).
pub const DEFAULT_DELTA: f64 = 0.01;

/// Default maximum joint-space travel of a single run.
pub const DEFAULT_MAXIMUM_TRAVEL: f64 = 10.0;

/// Manipulability below which a configuration counts as singular.
pub const SINGULARITY_THRESHOLD: f64 = 1.0e-3;

/// Chains with at most this many joints are never checked for singularity.
pub const SINGULARITY_MIN_DOF: usize = 3;

/// Configuration of the step controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Joint-space magnitude of every step.
    ///
    /// Also the arrival threshold: the run stops as soon as the unscaled
    /// joint velocity towards the target is shorter than `delta`.
    pub delta: f64,

    /// Upper bound on propagation steps.
    pub maximum_steps: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_travel_distance(DEFAULT_DELTA, DEFAULT_MAXIMUM_TRAVEL)
    }
}

impl ControllerConfig {
    /// Step budget derived from a maximum travel distance.
    pub fn from_travel_distance(delta: f64, maximum_travel: f64) -> Self {
        Self {
            delta,
            maximum_steps: (maximum_travel / delta) as usize,
        }
    }

    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.delta.is_finite() && self.delta > 0.0) {
            return Err(ControlError::InvalidSettings(format!(
                "delta must be positive, got {}",
                self.delta
            )));
        }
        Ok(())
    }
}

/// Builder for [`ControllerConfig`].
#[derive(Debug, Clone)]
pub struct ControllerConfigBuilder {
    delta: f64,
    maximum_travel: f64,
    maximum_steps: Option<usize>,
}

impl ControllerConfigBuilder {
    pub fn new() -> Self {
        Self {
            delta: DEFAULT_DELTA,
            maximum_travel: DEFAULT_MAXIMUM_TRAVEL,
            maximum_steps: None,
        }
    }

    /// Set the step magnitude.
    pub fn delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Derive the step budget as `maximum_travel / delta`.
    pub fn maximum_travel(mut self, maximum_travel: f64) -> Self {
        self.maximum_travel = maximum_travel;
        self.maximum_steps = None;
        self
    }

    /// Set the step budget directly.
    pub fn maximum_steps(mut self, maximum_steps: usize) -> Self {
        self.maximum_steps = Some(maximum_steps);
        self
    }

    pub fn build(self) -> Result<ControllerConfig> {
        if !(self.maximum_travel.is_finite() && self.maximum_travel >= 0.0) {
            return Err(ControlError::InvalidSettings(format!(
                "maximum travel must be finite and non-negative, got {}",
                self.maximum_travel
            )));
        }
        let config = match self.maximum_steps {
            Some(maximum_steps) => ControllerConfig {
                delta: self.delta,
                maximum_steps,
            },
            None => ControllerConfig::from_travel_distance(self.delta, self.maximum_travel),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for ControllerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Particle count and noise of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSettings {
    pub number_of_particles: usize,
    /// Standard deviation of the initial configuration, per joint.
    pub initial_std_error: DVector<f64>,
    /// Standard deviation of the motion error per unit step, per joint.
    pub joints_std_error: DVector<f64>,
    /// Seed of the run's random source; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl MoveSettings {
    /// One particle, no noise.
    pub fn no_uncertainty(dof: usize) -> Self {
        Self {
            number_of_particles: 1,
            initial_std_error: DVector::zeros(dof),
            joints_std_error: DVector::zeros(dof),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate against the chain's DOF and build the noise model.
    pub fn noise_model(&self, dof: usize) -> Result<NoiseModel> {
        if self.number_of_particles == 0 {
            return Err(ControlError::InvalidSettings(
                "number of particles must be at least 1".to_string(),
            ));
        }
        check_dimension("initial error", dof, self.initial_std_error.len())?;
        check_dimension("motion error", dof, self.joints_std_error.len())?;
        NoiseModel::new(
            self.initial_std_error.clone(),
            self.joints_std_error.clone(),
        )
    }

    pub fn is_deterministic(&self) -> bool {
        self.number_of_particles == 1
            && self.initial_std_error.iter().all(|&s| s == 0.0)
            && self.joints_std_error.iter().all(|&s| s == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.delta, 0.01);
        assert_eq!(config.maximum_steps, 1000);
    }

    #[test]
    fn test_from_travel_distance() {
        let config = ControllerConfig::from_travel_distance(0.05, 2.0);
        assert_eq!(config.maximum_steps, 40);
    }

    #[test]
    fn test_builder_explicit_steps() {
        let config = ControllerConfig::builder()
            .delta(0.01)
            .maximum_steps(20)
            .build()
            .unwrap();
        assert_eq!(config.maximum_steps, 20);
        assert_eq!(config.delta, 0.01);
    }

    #[test]
    fn test_builder_travel_overrides_steps() {
        let config = ControllerConfig::builder()
            .maximum_steps(20)
            .delta(0.1)
            .maximum_travel(1.0)
            .build()
            .unwrap();
        assert_eq!(config.maximum_steps, 10);
    }

    #[test]
    fn test_builder_rejects_bad_delta() {
        assert!(ControllerConfig::builder().delta(0.0).build().is_err());
        assert!(ControllerConfig::builder().delta(-0.1).build().is_err());
        assert!(ControllerConfig::builder().delta(f64::NAN).build().is_err());
        assert!(ControllerConfig::builder()
            .maximum_travel(f64::INFINITY)
            .build()
            .is_err());
    }

    #[test]
    fn test_no_uncertainty() {
        let settings = MoveSettings::no_uncertainty(3);
        assert!(settings.is_deterministic());
        assert!(settings.noise_model(3).unwrap().is_noiseless());
    }

    #[test]
    fn test_noise_model_validation() {
        let mut settings = MoveSettings::no_uncertainty(3);
        assert!(matches!(
            settings.noise_model(2),
            Err(ControlError::DimensionMismatch { .. })
        ));

        settings.number_of_particles = 0;
        assert!(matches!(
            settings.noise_model(3),
            Err(ControlError::InvalidSettings(_))
        ));
    }
}
