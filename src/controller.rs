//! Motion controller for the arm and its gripper
//!
//! Owns the arm session and the gripper actuator for the lifetime of the
//! daemon. Moves report planning and execution failures as `Ok(false)`;
//! only session or actuator errors come back as `Err`.

use std::fmt;
use tracing::{error, info, warn};
use crate::config::{Config, GripperConfig, MoveLineConfig};
use crate::gripper::{GraspGoal, GripperActuator, MoveGoal};
use crate::planner::CartesianPlanner;
use crate::pose::{pose_to_list, quaternion_distance, translation_distance, Pose};
use crate::session::ArmSession;
use crate::{ArmError, Result};

/// Position error above which a move is reported as inaccurate [cm]
pub const MAX_POSITION_ERROR_CM: f64 = 1.0;

/// Quaternion distance above which a move is reported as inaccurate
pub const MAX_QUATERNION_ERROR: f64 = 0.1;

/// Deviation between a requested target and the pose reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveError {
    pub position_cm: f64,
    pub quaternion: f64,
}

impl MoveError {
    pub fn between(target: &Pose, reached: &Pose) -> Self {
        Self {
            position_cm: 100.0 * translation_distance(target, reached),
            quaternion: quaternion_distance(&target.rotation, &reached.rotation),
        }
    }

    pub fn is_within_tolerance(&self) -> bool {
        self.position_cm <= MAX_POSITION_ERROR_CM && self.quaternion <= MAX_QUATERNION_ERROR
    }
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delta = [{:.2} cm], delta_q = [{:.3}]", self.position_cm, self.quaternion)
    }
}

/// Single owner of the arm session and the gripper
pub struct MotionController<S: ArmSession, G: GripperActuator> {
    session: S,
    gripper: G,
    planner: CartesianPlanner,
    move_l: MoveLineConfig,
    open_goal: MoveGoal,
    close_goal: GraspGoal,
    gripper_config: GripperConfig,
}

impl<S: ArmSession, G: GripperActuator> MotionController<S, G> {
    pub fn new(session: S, gripper: G, planner: CartesianPlanner, config: &Config) -> Self {
        Self {
            session,
            gripper,
            planner,
            move_l: config.move_l.clone(),
            open_goal: MoveGoal::from(&config.open_gripper),
            close_goal: GraspGoal::from(&config.close_gripper),
            gripper_config: config.gripper.clone(),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn gripper(&self) -> &G {
        &self.gripper
    }

    /// Joint-space move to `target` (last-link frame)
    pub async fn move_joint(&mut self, target: &Pose) -> Result<bool> {
        let result = self.session.go_to_pose(target).await;

        // No residual movement and no stale goal, whatever the outcome
        let stopped = self.session.stop().await;
        let cleared = self.session.clear_pose_targets().await;

        let success = result?;
        stopped?;
        cleared?;

        self.check_move_error(target, "move_j").await?;
        Ok(success)
    }

    /// Straight-line move to `target` (last-link frame)
    ///
    /// An incomplete plan is still executed: the path is followed as far as
    /// the planner got.
    pub async fn move_line(&mut self, target: &Pose) -> Result<bool> {
        self.session.limit_cartesian_speed(self.move_l.speed).await?;
        let start = self.session.current_pose().await?;

        let outcome = self.planner.plan(&mut self.session, &start, target).await?;
        let Some(trajectory) = outcome.trajectory() else {
            error!("move_l: no trajectory after {} trials", outcome.attempt_count());
            return Ok(false);
        };
        if !outcome.is_complete() {
            warn!(
                "move_l: executing incomplete path [{:.1}%]",
                outcome.fraction().unwrap_or_default() * 100.0
            );
        }

        let success = self.session.execute(trajectory).await?;
        if !success {
            error!("move_l: execution failed for target = {:?}", pose_to_list(target));
        }

        self.check_move_error(target, "move_l").await?;
        Ok(success)
    }

    /// Compare the reached pose with `target` and log the deviation
    pub async fn check_move_error(&self, target: &Pose, move_name: &str) -> Result<MoveError> {
        let reached = self.session.current_pose().await?;
        let move_error = MoveError::between(target, &reached);

        info!("after [{}]: delta = [{:.2} cm]", move_name, move_error.position_cm);
        info!("after [{}]: delta_q = [{:.3}]", move_name, move_error.quaternion);

        if move_error.position_cm > MAX_POSITION_ERROR_CM {
            error!(
                "after [{}]: delta_cm = [{:.2} cm] between target and current pose",
                move_name, move_error.position_cm
            );
        }
        if move_error.quaternion > MAX_QUATERNION_ERROR {
            error!(
                "after [{}]: delta_q = [{:.3}] between target and current pose",
                move_name, move_error.quaternion
            );
        }
        Ok(move_error)
    }

    pub async fn open_gripper(&mut self) -> Result<bool> {
        info!("open gripper: width={:.3} m speed={:.3} m/s", self.open_goal.width, self.open_goal.speed);
        self.gripper.move_fingers(&self.open_goal).await
    }

    pub async fn close_gripper(&mut self) -> Result<bool> {
        info!(
            "close gripper: width={:.3} m force={:.1} N speed={:.3} m/s",
            self.close_goal.width, self.close_goal.force, self.close_goal.speed
        );
        self.gripper.grasp(&self.close_goal).await
    }

    /// Current pose of the last link
    pub async fn current_pose(&self) -> Result<Pose> {
        self.session.current_pose().await
    }

    pub async fn current_joints(&self) -> Result<Vec<f64>> {
        self.session.current_joints().await
    }

    /// Opening between the fingers [mm]
    pub async fn gripper_width_mm(&self) -> Result<f64> {
        let timeout = self.gripper_config.state_timeout();
        let state = tokio::time::timeout(timeout, self.gripper.finger_joint_state())
            .await
            .map_err(|_| ArmError::ActuatorTimeout(format!(
                "no finger joint state within {:.1} s", timeout.as_secs_f64()
            )))??;

        if state.names != self.gripper_config.finger_joints {
            error!("[gripper] msg.name = {:?}", state.names);
        }
        info!("[gripper] joint_positions = {:?}", state.positions);

        Ok(state.width_mm())
    }

    /// Stop residual motion and release the session
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down motion controller");
        let stopped = self.session.stop().await;
        self.session.close().await?;
        stopped
    }
}
