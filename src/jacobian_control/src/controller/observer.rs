//! Run observers.
//!
//! The controller notifies an observer once per run start and once per mean
//! configuration added to the trajectory. Notifications are synchronous and
//! fire-and-forget. A belief run notifies for its noiseless phase only, so an
//! observer always sees one ordered run at a time.

use parking_lot::Mutex;

use crate::kinematics::Configuration;

/// Receiver of controller progress.
pub trait ControllerObserver: Send + Sync {
    /// A new run is starting.
    fn reset(&self) {}

    /// The belief mean of the current run moved to `configuration`.
    fn on_mean_configuration(&self, _configuration: &Configuration) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ControllerObserver for NullObserver {}

/// Observer that logs every notification through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ControllerObserver for TracingObserver {
    fn reset(&self) {
        tracing::debug!("controller run started");
    }

    fn on_mean_configuration(&self, configuration: &Configuration) {
        tracing::trace!(configuration = ?configuration.as_slice(), "mean configuration");
    }
}

/// Observer that keeps the mean configurations of the latest run.
#[derive(Debug, Default)]
pub struct TrajectoryRecorder {
    runs: Mutex<usize>,
    trajectory: Mutex<Vec<Configuration>>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resets seen.
    pub fn runs(&self) -> usize {
        *self.runs.lock()
    }

    /// Means recorded since the last reset.
    pub fn trajectory(&self) -> Vec<Configuration> {
        self.trajectory.lock().clone()
    }
}

impl ControllerObserver for TrajectoryRecorder {
    fn reset(&self) {
        *self.runs.lock() += 1;
        self.trajectory.lock().clear();
    }

    fn on_mean_configuration(&self, configuration: &Configuration) {
        self.trajectory.lock().push(configuration.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn test_recorder_resets() {
        let recorder = TrajectoryRecorder::new();
        recorder.reset();
        recorder.on_mean_configuration(&DVector::from_element(2, 1.0));
        recorder.on_mean_configuration(&DVector::from_element(2, 2.0));
        assert_eq!(recorder.trajectory().len(), 2);

        recorder.reset();
        assert_eq!(recorder.runs(), 2);
        assert!(recorder.trajectory().is_empty());
    }
}
