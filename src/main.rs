// src/main.rs
// Entry point of the benchmark supervisor: plans the traversal path, starts one
// run and finalizes it once, whether it completed, failed or was interrupted.

use anyhow::Context as _;
use clap::Parser;
use env_logger::Env;
use global_planning_supervisor::{
    core::{Clock, SystemClock},
    navigation::NavigationClient,
    RunSupervisor, SupervisorConfig, YamlGraphSource,
};
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Global planning benchmark supervisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Supervisor configuration file
    #[arg(short, long, default_value = "config/supervisor.yaml")]
    config: PathBuf,

    /// Seed of the random source; overrides the config value
    #[arg(long)]
    seed: Option<u64>,

    /// Log goals and transforms instead of talking to ROS 2
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = SupervisorConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    let rng = match config.seed {
        Some(seed) => {
            info!("Using seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing the Ctrl-C handler")?;

    info!("Starting global planning benchmark supervisor");
    #[cfg(feature = "ros")]
    if !args.dry_run {
        return run_ros(config, rng, interrupted);
    }
    #[cfg(not(feature = "ros"))]
    if !args.dry_run {
        log::warn!("Built without the `ros` feature, running in dry-run mode");
    }
    run_dry(config, rng, interrupted)
}

fn run_dry(config: SupervisorConfig, rng: StdRng, interrupted: Arc<AtomicBool>) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let supervisor = RunSupervisor::create(
        config,
        clock,
        global_planning_supervisor::DryRunNavigator::new(),
        rng,
    )?
    .with_shutdown_flag(interrupted);
    supervise(supervisor)
}

#[cfg(feature = "ros")]
fn run_ros(config: SupervisorConfig, rng: StdRng, interrupted: Arc<AtomicBool>) -> anyhow::Result<()> {
    use global_planning_supervisor::core::GroundTruthRecorder;
    use global_planning_supervisor::ros_interface::RosInterface;

    let mut ros = RosInterface::new(&config.ros).context("creating the ROS 2 node")?;
    let recorder = GroundTruthRecorder::shared();
    ros.record_ground_truth(Arc::clone(&recorder))?;
    ros.observe_global_plans()?;

    let navigator = ros.navigation_client()?;
    let broadcaster = Arc::new(ros.tf_broadcaster()?);
    let path_publisher = Box::new(ros.path_publisher()?);
    ros.start_spinning()?;

    let supervisor = RunSupervisor::create(config, ros.clock(), navigator, rng)?
        .with_broadcaster(broadcaster)
        .with_path_publisher(path_publisher)
        .with_recorder(recorder)
        .with_shutdown_flag(interrupted);

    let result = supervise(supervisor);
    ros.shutdown();
    result
}

/// Runs one benchmark run to its end. Interrupts and the run timeout are
/// honoured at the supervisor's checkpoints; finalization happens exactly once,
/// whatever the outcome.
fn supervise<N: NavigationClient>(mut supervisor: RunSupervisor<N, StdRng>) -> anyhow::Result<()> {
    let source = YamlGraphSource::new(&supervisor.config().graph_path);
    let outcome = supervisor
        .initialize(&source)
        .and_then(|_| supervisor.start_run().map(|_| ()));

    supervisor.end_run();
    info!("Supervisor finished in state {:?}", supervisor.state());

    if let Err(e) = outcome {
        error!("{}", e);
        return Err(e.into());
    }
    if !supervisor.shutdown_requested() {
        anyhow::bail!("run ended in state {:?}", supervisor.state());
    }
    Ok(())
}
