//! armd - robotic arm daemon
//!
//! Serves one socket peer with move and gripper commands:
//! - Loads the configuration and the obstacle scene
//! - Dials the controlling PC, or waits for it with `--listen`
//! - Runs the request/reply loop until the peer exits or disconnects
//! - Stops the arm and releases the session

use armd::sim::{SimArm, SimGripper};
use armd::dispatcher::open_stream;
use armd::{scene, CartesianPlanner, CommandDispatcher, Config, MotionController, PlanRecorder, PlannerParams, SocketMode};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "armd")]
#[command(about = "Robotic arm daemon - Cartesian moves and gripper control over a socket")]
#[command(version)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer host, overrides socket.host
    #[arg(long)]
    host: Option<String>,

    /// Peer port, overrides socket.port
    #[arg(long)]
    port: Option<u16>,

    /// Wait for the peer instead of dialing it
    #[arg(long)]
    listen: bool,

    /// Seed for the retry jitter
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var("ARMD_CONFIG_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/armd.yaml"))
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.socket.host = host.clone();
        }
        if let Some(port) = self.port {
            config.socket.port = port;
        }
        if self.listen {
            config.socket.mode = SocketMode::Listen;
        }
    }
}

/// Per-run directory for planning diagnostics, if enabled
fn planning_recorder(config: &Config) -> Result<PlanRecorder> {
    if !config.diagnostics.save_planning_res {
        return Ok(PlanRecorder::disabled());
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dir = config.diagnostics.log_dir.join(timestamp).join("planning_res");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create diagnostics directory {}", dir.display()))?;
    info!("Saving planning results to {}", dir.display());

    Ok(PlanRecorder::new(dir))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("armd=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config_path = args.get_config_path();

    info!("Robotic arm daemon");
    info!("{}", "=".repeat(50));
    info!("Using config: {}", config_path.display());

    let mut config = Config::load_from_path(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    args.apply_overrides(&mut config);

    let mut arm = SimArm::new();
    if let Some(obstacles_path) = &config.obstacles.config_path {
        let obstacles = scene::load_obstacles(obstacles_path).context("Failed to load obstacles")?;
        scene::populate(&mut arm, &obstacles).await.context("Failed to populate planning scene")?;
    } else {
        warn!("No obstacles configured, planning scene is empty");
    }

    let planner = CartesianPlanner::new(PlannerParams::from(&config.move_l), planning_recorder(&config)?);
    let planner = match args.seed {
        Some(seed) => planner.with_seed(seed),
        None => planner,
    };
    let controller = MotionController::new(arm, SimGripper::new(&config.gripper), planner, &config);
    let mut dispatcher = CommandDispatcher::new(controller, &config)?;

    let stream = open_stream(&config.socket)
        .await
        .context("Failed to open the peer connection")?;
    let served = dispatcher.serve(stream).await;

    info!("Performing graceful shutdown");
    dispatcher
        .controller_mut()
        .shutdown()
        .await
        .context("Failed during shutdown")?;

    match served {
        Ok(end) => {
            info!("Session ended: {:?}", end);
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Session aborted: {}", e);
            Err(e).context("Command session failed")
        }
    }
}
