//! Scripted session and gripper doubles for unit tests

use async_trait::async_trait;
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::Serialize;
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::Duration;
use crate::gripper::{FingerJointState, GraspGoal, GripperActuator, MoveGoal};
use crate::pose::Pose;
use crate::scene::Obstacle;
use crate::session::{ArmSession, Trajectory};
use crate::{ArmError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ScriptedTrajectory {
    pub target: Pose,
    pub points: usize,
}

impl Trajectory for ScriptedTrajectory {
    fn point_count(&self) -> usize {
        self.points
    }
}

/// Downward-pointing pose at the given position
pub fn down_pose(x: f64, y: f64, z: f64) -> Pose {
    Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_euler_angles(PI, 0.0, -PI / 4.0),
    )
}

/// Session that replays a fixed list of plan fractions and counts calls
pub struct ScriptedSession {
    pub pose: Pose,
    pub joints: Vec<f64>,
    pub fractions: VecDeque<f64>,
    pub default_fraction: f64,
    pub plan_calls: Vec<(f64, f64)>,
    pub waypoint_counts: Vec<usize>,
    pub speed_limits: Vec<f64>,
    pub execute_result: bool,
    pub executed: Vec<ScriptedTrajectory>,
    pub go_result: bool,
    pub go_calls: usize,
    pub stop_calls: usize,
    pub clear_calls: usize,
    pub boxes: Vec<String>,
    pub closed: bool,
    pub fail_queries: bool,
}

impl ScriptedSession {
    pub fn new(fractions: &[f64]) -> Self {
        Self {
            pose: down_pose(0.4, 0.0, 0.5),
            joints: vec![0.0, -0.785, 0.0, -2.356, 0.0, 1.571, 0.785],
            fractions: fractions.iter().copied().collect(),
            default_fraction: 1.0,
            plan_calls: Vec::new(),
            waypoint_counts: Vec::new(),
            speed_limits: Vec::new(),
            execute_result: true,
            executed: Vec::new(),
            go_result: true,
            go_calls: 0,
            stop_calls: 0,
            clear_calls: 0,
            boxes: Vec::new(),
            closed: false,
            fail_queries: false,
        }
    }
}

#[async_trait]
impl ArmSession for ScriptedSession {
    type Trajectory = ScriptedTrajectory;

    async fn current_pose(&self) -> Result<Pose> {
        if self.fail_queries {
            return Err(ArmError::Backend("robot state unavailable".to_string()));
        }
        Ok(self.pose)
    }

    async fn current_joints(&self) -> Result<Vec<f64>> {
        if self.fail_queries {
            return Err(ArmError::Backend("robot state unavailable".to_string()));
        }
        Ok(self.joints.clone())
    }

    async fn limit_cartesian_speed(&mut self, speed: f64) -> Result<()> {
        self.speed_limits.push(speed);
        Ok(())
    }

    async fn compute_cartesian_path(
        &mut self,
        waypoints: &[Pose],
        eef_step: f64,
        jump_threshold: f64,
    ) -> Result<(ScriptedTrajectory, f64)> {
        self.plan_calls.push((eef_step, jump_threshold));
        self.waypoint_counts.push(waypoints.len());
        let fraction = self.fractions.pop_front().unwrap_or(self.default_fraction);
        let target = waypoints.last().copied().unwrap_or(self.pose);
        let points = if fraction < 0.0 { 0 } else { 10 };
        Ok((ScriptedTrajectory { target, points }, fraction))
    }

    async fn execute(&mut self, trajectory: &ScriptedTrajectory) -> Result<bool> {
        self.executed.push(trajectory.clone());
        if self.execute_result {
            self.pose = trajectory.target;
        }
        Ok(self.execute_result)
    }

    async fn go_to_pose(&mut self, target: &Pose) -> Result<bool> {
        self.go_calls += 1;
        if self.go_result {
            self.pose = *target;
        }
        Ok(self.go_result)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_calls += 1;
        Ok(())
    }

    async fn clear_pose_targets(&mut self) -> Result<()> {
        self.clear_calls += 1;
        Ok(())
    }

    async fn add_box(&mut self, obstacle: &Obstacle) -> Result<()> {
        self.boxes.push(obstacle.name.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Gripper with fixed action results and an optional state delay
pub struct ScriptedGripper {
    pub move_result: bool,
    pub grasp_result: bool,
    pub fail_actions: bool,
    pub state: FingerJointState,
    pub state_delay: Option<Duration>,
    pub move_goals: Vec<MoveGoal>,
    pub grasp_goals: Vec<GraspGoal>,
}

impl ScriptedGripper {
    pub fn new() -> Self {
        Self {
            move_result: true,
            grasp_result: true,
            fail_actions: false,
            state: FingerJointState {
                names: vec!["panda_finger_joint1".to_string(), "panda_finger_joint2".to_string()],
                positions: vec![0.02, 0.02],
            },
            state_delay: None,
            move_goals: Vec::new(),
            grasp_goals: Vec::new(),
        }
    }
}

#[async_trait]
impl GripperActuator for ScriptedGripper {
    async fn move_fingers(&mut self, goal: &MoveGoal) -> Result<bool> {
        if self.fail_actions {
            return Err(ArmError::ActuatorTimeout("move action did not finish".to_string()));
        }
        self.move_goals.push(goal.clone());
        Ok(self.move_result)
    }

    async fn grasp(&mut self, goal: &GraspGoal) -> Result<bool> {
        if self.fail_actions {
            return Err(ArmError::ActuatorTimeout("grasp action did not finish".to_string()));
        }
        self.grasp_goals.push(goal.clone());
        Ok(self.grasp_result)
    }

    async fn finger_joint_state(&self) -> Result<FingerJointState> {
        if let Some(delay) = self.state_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state.clone())
    }
}
