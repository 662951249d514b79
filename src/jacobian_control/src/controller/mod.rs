//! The approach controller: settings, the step loop, the two-phase belief
//! wrapper and their results.

pub mod config;
pub mod observer;
pub mod result;
pub mod step;
pub mod two_phase;

pub use config::{
    ControllerConfig, ControllerConfigBuilder, MoveSettings, DEFAULT_DELTA,
    DEFAULT_MAXIMUM_TRAVEL, SINGULARITY_MIN_DOF, SINGULARITY_THRESHOLD,
};
pub use observer::{ControllerObserver, NullObserver, TracingObserver, TrajectoryRecorder};
pub use result::{BeliefResult, MotionResult, Outcome};
pub use step::JacobianController;
