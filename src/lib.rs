//! armd - network-attached robotic arm controller
//!
//! Accepts tool-tip targets and gripper commands from a socket peer, turns
//! them into last-link straight-line moves with a retrying Cartesian planner,
//! and answers every command with the live arm state.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use armd::{CartesianPlanner, CommandDispatcher, Config, MotionController, PlanRecorder, PlannerParams};
//! use armd::sim::{SimArm, SimGripper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_from_path("config/armd.yaml")?;
//!
//!     let planner = CartesianPlanner::new(PlannerParams::from(&config.move_l), PlanRecorder::disabled());
//!     let controller = MotionController::new(SimArm::new(), SimGripper::new(&config.gripper), planner, &config);
//!     let mut dispatcher = CommandDispatcher::new(controller, &config)?;
//!
//!     let stream = tokio::net::TcpStream::connect(config.socket.address()).await?;
//!     let end = dispatcher.serve(stream).await?;
//!     println!("session ended: {:?}", end);
//!
//!     dispatcher.controller_mut().shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **CommandDispatcher**: request/reply loop over any async byte stream
//! - **CommandParser**: `>token<` framing and command classification
//! - **FrameConverter**: tool frame <-> last-link frame
//! - **OrientationNormalizer**: down-pointing check and yaw symmetry folding
//! - **MotionController**: line and joint moves, gripper, state queries
//! - **CartesianPlanner**: bounded retry loop with jittered parameters
//! - **ArmSession** / **GripperActuator**: backend seams, see [`sim`] for the in-process ones

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod gripper;
pub mod orientation;
pub mod planner;
pub mod pose;
pub mod protocol;
pub mod scene;
pub mod session;
pub mod sim;

#[cfg(test)]
mod test_support;

pub use config::{Config, SocketConfig, SocketMode};
pub use controller::{MotionController, MoveError};
pub use dispatcher::{CommandDispatcher, SessionEnd};
pub use error::{ArmError, CommandError, Result};
pub use frame::FrameConverter;
pub use gripper::{FingerJointState, GraspGoal, GripperActuator, MoveGoal};
pub use orientation::OrientationNormalizer;
pub use planner::{CartesianPlanner, PlanAttempt, PlanOutcome, PlanRecorder, PlannerParams};
pub use pose::Pose;
pub use protocol::{ArmState, Command, CommandParser, GripperAction};
pub use scene::Obstacle;
pub use session::{ArmSession, Trajectory};
