//! Jacobian-based approach controller with belief propagation.
//!
//! Drives a kinematic chain from a start configuration towards a target pose
//! in small joint-space steps while propagating configuration uncertainty as
//! a set of particles, and classifies every contact along the way against a
//! collision policy.
//!
//! # Architecture
//!
//! - [`Kinematics`] and [`CollisionDetector`]: adapters supplied by the caller
//! - [`NoiseModel`] and [`BeliefState`]: Gaussian joint noise and particles
//! - [`check_collision_constraints`]: per-step contact classification
//! - [`JacobianController`]: the step loop and the two-phase belief run
//! - [`MotionResult`] and [`BeliefResult`]: trajectories and [`Outcome`] sets
//!
//! # Usage
//!
//! ```no_run
//! use jacobian_control::test_utils::{PrismaticChain, ScriptedDetector};
//! use jacobian_control::{
//!     CollisionType, CollisionTypes, ControllerConfig, JacobianController, MoveSettings, PartId,
//! };
//! use nalgebra::{DVector, Isometry3};
//!
//! # fn main() -> jacobian_control::Result<()> {
//! let chain = PrismaticChain::symmetric(3, 1.0);
//! let dof = 3;
//! let controller = JacobianController::new(chain, ScriptedDetector::empty(), ControllerConfig::default())?;
//!
//! let policy = CollisionTypes::new().with(
//!     PartId::parse("finger_sensor")?,
//!     PartId::parse("object")?,
//!     CollisionType::terminating(),
//! );
//! let settings = MoveSettings {
//!     number_of_particles: 20,
//!     initial_std_error: DVector::from_element(dof, 0.005),
//!     joints_std_error: DVector::from_element(dof, 0.01),
//!     seed: Some(7),
//! };
//!
//! let start = DVector::zeros(dof);
//! let goal = Isometry3::translation(0.3, 0.1, 0.0);
//! let result = controller.move_belief(&start, &goal, &policy, &settings)?;
//! println!("{} ({:.0}% of particles)", result.description(), result.success_ratio() * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod belief;
pub mod collision;
pub mod controller;
pub mod error;
pub mod kinematics;
pub mod test_utils;

pub use belief::{BeliefState, NoiseModel, Particle};
pub use collision::{
    check_collision_constraints, CollisionConstraintsCheck, CollisionDetector, CollisionType,
    CollisionTypes, ContactPair, PartId, RequiredCollisionsCounter, UnorderedPair,
};
pub use controller::{
    BeliefResult, ControllerConfig, ControllerConfigBuilder, ControllerObserver,
    JacobianController, MotionResult, MoveSettings, NullObserver, Outcome, TracingObserver,
    TrajectoryRecorder,
};
pub use error::{ControlError, Result};
pub use kinematics::{task_space_delta, Configuration, KinematicState, Kinematics};
