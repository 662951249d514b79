//! Kinematics check configuration.
//!
//! Loaded from a TOML file. Every section and field has a default, so an
//! empty file describes a three-link planar arm asked to reach a nearby pose.

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use jacobian_control::collision::DEFAULT_SENSOR_MARKER;
use jacobian_control::controller::{DEFAULT_DELTA, DEFAULT_MAXIMUM_TRAVEL};
use jacobian_control::{CollisionType, CollisionTypes, ControllerConfig, MoveSettings, PartId};
use nalgebra::{DVector, Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::chain::PlanarChain;
use crate::scene::{CapsuleScene, SphereObstacle};

/// Default number of sampled goals tried after the exact goal.
pub const DEFAULT_SAMPLE_COUNT: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub chain: ChainParams,
    pub scene: SceneParams,
    pub policy: PolicyParams,
    pub request: RequestParams,
    pub controller: ControllerParams,
    pub belief: BeliefParams,
    pub sampling: SamplingParams,
}

/// Planar arm description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    pub link_lengths: Vec<f64>,
    /// Lower joint limits (radians)
    pub lower_limits: Vec<f64>,
    /// Upper joint limits (radians)
    pub upper_limits: Vec<f64>,
    /// Part identifier of every link; the sensor marker makes a link sensorized
    pub link_names: Vec<String>,
    /// Capsule radius of every link
    pub link_radius: f64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            link_lengths: vec![0.4, 0.3, 0.2],
            lower_limits: vec![-2.9; 3],
            upper_limits: vec![2.9; 3],
            link_names: vec![
                "link1".to_string(),
                "link2".to_string(),
                "link3_sensor".to_string(),
            ],
            link_radius: 0.03,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    pub obstacles: Vec<ObstacleParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleParams {
    pub name: String,
    pub center: [f64; 3],
    pub radius: f64,
}

/// Collision policy table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyParams {
    pub sensor_marker: String,
    /// Type of pairs without an entry
    pub default: CollisionType,
    pub pairs: Vec<PolicyEntry>,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            sensor_marker: DEFAULT_SENSOR_MARKER.to_string(),
            default: CollisionType::default(),
            pairs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub a: String,
    pub b: String,
    #[serde(flatten)]
    pub collision_type: CollisionType,
}

/// Start configuration, goal pose and the goal sampling box
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub initial_configuration: Vec<f64>,
    pub goal_position: [f64; 3],
    /// Goal orientation as roll, pitch, yaw (radians)
    pub goal_rpy: [f64; 3],
    /// Half extents of the position sampling box
    pub position_deltas: [f64; 3],
    /// Half ranges of the X, Y and Z rotation samples (radians)
    pub orientation_deltas: [f64; 3],
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            initial_configuration: vec![0.2, 0.9, 0.8],
            goal_position: [0.225, 0.626, 0.0],
            goal_rpy: [0.0, 0.0, 2.4],
            position_deltas: [0.02, 0.02, 0.0],
            orientation_deltas: [0.0, 0.0, 0.1],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerParams {
    pub delta: f64,
    pub maximum_travel: f64,
    /// Overrides the step budget derived from `maximum_travel`
    pub maximum_steps: Option<usize>,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
            maximum_travel: DEFAULT_MAXIMUM_TRAVEL,
            maximum_steps: None,
        }
    }
}

/// Particle belief settings; empty error vectors mean no noise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeliefParams {
    pub number_of_particles: usize,
    pub initial_std_error: Vec<f64>,
    pub joints_std_error: Vec<f64>,
    pub seed: Option<u64>,
}

impl Default for BeliefParams {
    fn default() -> Self {
        Self {
            number_of_particles: 1,
            initial_std_error: Vec::new(),
            joints_std_error: Vec::new(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub sample_count: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

impl CheckConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file {path:?}"))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let dof = self.chain.link_lengths.len();
        ensure!(dof > 0, "chain needs at least one link");
        ensure!(
            self.chain.lower_limits.len() == dof && self.chain.upper_limits.len() == dof,
            "chain has {dof} links but {} lower and {} upper limits",
            self.chain.lower_limits.len(),
            self.chain.upper_limits.len()
        );
        ensure!(
            self.chain.link_names.len() == dof,
            "chain has {dof} links but {} link names",
            self.chain.link_names.len()
        );
        ensure!(
            self.request.initial_configuration.len() == dof,
            "initial configuration has {} joints, chain has {dof}",
            self.request.initial_configuration.len()
        );
        for (name, deltas) in [
            ("position", &self.request.position_deltas),
            ("orientation", &self.request.orientation_deltas),
        ] {
            if deltas.iter().any(|d| !d.is_finite() || *d < 0.0) {
                bail!("{name} deltas must be finite and non-negative, got {deltas:?}");
            }
        }
        for (name, errors) in [
            ("initial", &self.belief.initial_std_error),
            ("joints", &self.belief.joints_std_error),
        ] {
            ensure!(
                errors.is_empty() || errors.len() == dof,
                "{name} std error has {} entries, chain has {dof}",
                errors.len()
            );
        }
        Ok(())
    }

    pub fn dof(&self) -> usize {
        self.chain.link_lengths.len()
    }

    pub fn build_chain(&self) -> Result<PlanarChain> {
        PlanarChain::new(
            self.chain.link_lengths.clone(),
            self.chain.lower_limits.clone(),
            self.chain.upper_limits.clone(),
        )
        .context("Chain link lengths and limits do not match")
    }

    pub fn build_scene(&self) -> Result<CapsuleScene> {
        let link_parts = self
            .chain
            .link_names
            .iter()
            .map(|name| PartId::parse(name))
            .collect::<Result<Vec<_>, _>>()?;
        let mut scene = CapsuleScene::new(self.build_chain()?, link_parts, self.chain.link_radius)?;
        for obstacle in &self.scene.obstacles {
            ensure!(
                obstacle.radius.is_finite() && obstacle.radius >= 0.0,
                "obstacle {:?} has invalid radius {}",
                obstacle.name,
                obstacle.radius
            );
            scene = scene.with_obstacle(SphereObstacle {
                part: PartId::parse(&obstacle.name)?,
                center: Vector3::from(obstacle.center),
                radius: obstacle.radius,
            });
        }
        Ok(scene)
    }

    pub fn build_policy(&self) -> Result<CollisionTypes> {
        let mut policy = CollisionTypes::new()
            .with_default(self.policy.default)
            .with_sensor_marker(self.policy.sensor_marker.clone());
        for entry in &self.policy.pairs {
            policy.insert(
                PartId::parse(&entry.a)?,
                PartId::parse(&entry.b)?,
                entry.collision_type,
            );
        }
        Ok(policy)
    }

    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let mut builder = ControllerConfig::builder()
            .delta(self.controller.delta)
            .maximum_travel(self.controller.maximum_travel);
        if let Some(maximum_steps) = self.controller.maximum_steps {
            builder = builder.maximum_steps(maximum_steps);
        }
        Ok(builder.build()?)
    }

    /// Run settings, with `seed_override` taking precedence over the file.
    pub fn move_settings(&self, seed_override: Option<u64>) -> MoveSettings {
        let dof = self.dof();
        let errors = |values: &[f64]| {
            if values.is_empty() {
                DVector::zeros(dof)
            } else {
                DVector::from_column_slice(values)
            }
        };
        MoveSettings {
            number_of_particles: self.belief.number_of_particles,
            initial_std_error: errors(self.belief.initial_std_error.as_slice()),
            joints_std_error: errors(self.belief.joints_std_error.as_slice()),
            seed: seed_override.or(self.belief.seed),
        }
    }

    pub fn initial_configuration(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.request.initial_configuration)
    }

    pub fn goal_pose(&self) -> Isometry3<f64> {
        let [x, y, z] = self.request.goal_position;
        let [roll, pitch, yaw] = self.request.goal_rpy;
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }
}

/// Example configuration printed by `--example`.
pub const EXAMPLE_CONFIG: &str = r#"# kinematics_check configuration

[chain]
link_lengths = [0.4, 0.3, 0.2]
lower_limits = [-2.9, -2.9, -2.9]
upper_limits = [2.9, 2.9, 2.9]
link_names = ["link1", "link2", "link3_sensor"]
link_radius = 0.03

[[scene.obstacles]]
name = "object"
center = [0.15, 0.7, 0.0]
radius = 0.04

[policy]
sensor_marker = "sensor"
default = { ignored = false, prohibited = false, terminating = false, required = false }

[[policy.pairs]]
a = "link3_sensor"
b = "object"
terminating = true

[request]
initial_configuration = [0.2, 0.9, 0.8]
goal_position = [0.225, 0.626, 0.0]
goal_rpy = [0.0, 0.0, 2.4]
position_deltas = [0.02, 0.02, 0.0]
orientation_deltas = [0.0, 0.0, 0.1]

[controller]
delta = 0.01
maximum_travel = 10.0
# maximum_steps = 500

[belief]
number_of_particles = 20
initial_std_error = [0.005, 0.005, 0.005]
joints_std_error = [0.01, 0.01, 0.01]
# seed = 7

[sampling]
sample_count = 20
"#;
