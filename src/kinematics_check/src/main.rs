//! kinematics_check - reachability check of a goal pose for a planar arm.
//!
//! Builds the arm and its collision scene from a TOML file, runs the Jacobian
//! controller towards the goal and, if that fails, towards goals sampled
//! around it. Prints (or writes) a JSON report.

mod chain;
mod goal_sampling;
mod params;
mod report;
mod scene;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jacobian_control::{JacobianController, TracingObserver};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use crate::goal_sampling::{check_kinematics, GoalRequest, GoalSampler};
use crate::params::{CheckConfig, EXAMPLE_CONFIG};
use crate::report::CheckReport;

#[derive(Parser)]
#[command(name = "kinematics_check")]
#[command(version)]
#[command(about = "Check whether a planar arm can reach a goal pose under a collision policy")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "kinematics_check.toml")]
    config: PathBuf,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for particle noise and goal sampling (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    example: bool,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if cli.example {
        println!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let config = CheckConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    let chain = config.build_chain()?;
    let scene = config.build_scene()?;
    tracing::debug!(
        links = scene.link_parts().len(),
        obstacles = scene.obstacles().len(),
        "Scene built"
    );
    let policy = config.build_policy()?;
    let settings = config.move_settings(cli.seed);

    let mut controller = JacobianController::new(chain, scene, config.controller_config()?)
        .context("Invalid controller settings")?;
    if cli.verbose {
        controller = controller.with_observer(Arc::new(TracingObserver));
    }

    let request = GoalRequest {
        initial_configuration: config.initial_configuration(),
        goal: config.goal_pose(),
        sampler: GoalSampler::new(
            config.request.position_deltas,
            config.request.orientation_deltas,
        )?,
        sample_count: config.sampling.sample_count,
    };

    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::info!(
        dof = config.dof(),
        particles = settings.number_of_particles,
        maximum_steps = controller.config().maximum_steps,
        "Receiving query"
    );
    let outcome = check_kinematics(&controller, &request, &policy, &settings, &mut rng)?;
    let report = CheckReport::from(&outcome);

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create report file {path:?}"))?;
            report.write_json(BufWriter::new(file))?;
            tracing::info!(path = ?path, "Report written");
        }
        None => {
            report.write_json(std::io::stdout().lock())?;
            println!();
        }
    }

    Ok(())
}
