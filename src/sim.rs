//! In-process arm and gripper backends
//!
//! [`SimArm`] moves the last link straight to wherever a trajectory ends. It
//! has no kinematics: joints stay at the ready configuration and obstacles are
//! only used to cut Cartesian paths short. [`SimGripper`] jumps to the
//! commanded width.

use async_trait::async_trait;
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use serde::Serialize;
use std::f64::consts::PI;
use tracing::{debug, info, warn};
use crate::config::GripperConfig;
use crate::gripper::{FingerJointState, GraspGoal, GripperActuator, MoveGoal};
use crate::pose::{pose_to_list, translation_distance, Pose};
use crate::scene::Obstacle;
use crate::session::{ArmSession, Trajectory};
use crate::{ArmError, Result};

/// Joint positions of the ready configuration [rad]
pub const READY_JOINTS: [f64; 7] = [0.0, -0.785, 0.0, -2.356, 0.0, 1.571, 0.785];

/// Longest path the simulated planner interpolates
pub const MAX_PATH_POINTS: usize = 100_000;

/// Largest opening of the fingers [m]
pub const MAX_GRIPPER_WIDTH: f64 = 0.08;

/// Last-link pose of the ready configuration, pointing down
pub fn ready_pose() -> Pose {
    Isometry3::from_parts(
        Translation3::new(0.307, 0.0, 0.59),
        UnitQuaternion::from_euler_angles(PI, 0.0, -PI / 4.0),
    )
}

/// Sequence of last-link poses
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimTrajectory {
    pub poses: Vec<Pose>,
}

impl Trajectory for SimTrajectory {
    fn point_count(&self) -> usize {
        self.poses.len()
    }
}

pub struct SimArm {
    pose: Pose,
    joints: Vec<f64>,
    obstacles: Vec<Obstacle>,
    speed_limit: Option<f64>,
}

impl SimArm {
    /// Arm resting in the ready configuration
    pub fn new() -> Self {
        Self {
            pose: ready_pose(),
            joints: READY_JOINTS.to_vec(),
            obstacles: Vec::new(),
            speed_limit: None,
        }
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn speed_limit(&self) -> Option<f64> {
        self.speed_limit
    }

    fn blocked_by(&self, pose: &Pose) -> Option<&Obstacle> {
        self.obstacles
            .iter()
            .find(|obstacle| obstacle.contains(&pose.translation.vector))
    }

    /// Number of interpolation steps for `from -> to`, or `None` past [`MAX_PATH_POINTS`]
    fn step_count(from: &Pose, to: &Pose, eef_step: f64) -> Option<usize> {
        let steps = (translation_distance(from, to) / eef_step).ceil();
        if steps.is_finite() && steps <= MAX_PATH_POINTS as f64 {
            Some((steps as usize).max(1))
        } else {
            None
        }
    }

    /// Interpolate `from -> to` in `steps` equal steps, start excluded
    fn interpolate(from: &Pose, to: &Pose, steps: usize) -> Vec<Pose> {
        (1..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                let translation = from.translation.vector.lerp(&to.translation.vector, t);
                let rotation = from
                    .rotation
                    .try_slerp(&to.rotation, t, 1.0e-9)
                    .unwrap_or(to.rotation);
                Isometry3::from_parts(Translation3::from(translation), rotation)
            })
            .collect()
    }
}

impl Default for SimArm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArmSession for SimArm {
    type Trajectory = SimTrajectory;

    async fn current_pose(&self) -> Result<Pose> {
        Ok(self.pose)
    }

    async fn current_joints(&self) -> Result<Vec<f64>> {
        Ok(self.joints.clone())
    }

    async fn limit_cartesian_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ArmError::Backend(format!("invalid cartesian speed limit: {}", speed)));
        }
        self.speed_limit = Some(speed);
        Ok(())
    }

    async fn compute_cartesian_path(
        &mut self,
        waypoints: &[Pose],
        eef_step: f64,
        _jump_threshold: f64,
    ) -> Result<(SimTrajectory, f64)> {
        if waypoints.is_empty() || !eef_step.is_finite() || eef_step <= 0.0 {
            warn!("cartesian path computation failed: {} waypoints, eef_step = {}", waypoints.len(), eef_step);
            return Ok((SimTrajectory::default(), -1.0));
        }

        let mut steps = Vec::with_capacity(waypoints.len());
        let mut from = self.pose;
        for waypoint in waypoints {
            steps.push(Self::step_count(&from, waypoint, eef_step));
            from = *waypoint;
        }
        let total = steps
            .iter()
            .copied()
            .try_fold(0usize, |total, n| n.and_then(|n| total.checked_add(n)))
            .filter(|&total| total <= MAX_PATH_POINTS);
        let Some(total) = total else {
            warn!(
                "cartesian path computation failed: more than {} points at eef_step = {}",
                MAX_PATH_POINTS, eef_step
            );
            return Ok((SimTrajectory::default(), -1.0));
        };

        let mut segments = Vec::with_capacity(waypoints.len());
        let mut from = self.pose;
        for (waypoint, n) in waypoints.iter().zip(steps.into_iter().flatten()) {
            segments.push(Self::interpolate(&from, waypoint, n));
            from = *waypoint;
        }

        let mut poses = Vec::with_capacity(total);
        for pose in segments.into_iter().flatten() {
            if let Some(obstacle) = self.blocked_by(&pose) {
                debug!("path blocked by [{}] at {:?}", obstacle.name, pose_to_list(&pose));
                break;
            }
            poses.push(pose);
        }

        let fraction = poses.len() as f64 / total as f64;
        Ok((SimTrajectory { poses }, fraction))
    }

    async fn execute(&mut self, trajectory: &SimTrajectory) -> Result<bool> {
        match trajectory.poses.last() {
            Some(last) => {
                self.pose = *last;
                Ok(true)
            }
            None => {
                warn!("refusing to execute an empty trajectory");
                Ok(false)
            }
        }
    }

    async fn go_to_pose(&mut self, target: &Pose) -> Result<bool> {
        if let Some(obstacle) = self.blocked_by(target) {
            warn!("target {:?} is inside [{}]", pose_to_list(target), obstacle.name);
            return Ok(false);
        }
        self.pose = *target;
        Ok(true)
    }

    async fn stop(&mut self) -> Result<()> {
        debug!("stop");
        Ok(())
    }

    async fn clear_pose_targets(&mut self) -> Result<()> {
        debug!("clear pose targets");
        Ok(())
    }

    async fn add_box(&mut self, obstacle: &Obstacle) -> Result<()> {
        self.obstacles.retain(|existing| existing.name != obstacle.name);
        self.obstacles.push(obstacle.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        info!("Simulated arm session closed");
        Ok(())
    }
}

/// Reject goals the fingers cannot be driven to
fn check_goal(width: f64, speed: f64) -> Result<()> {
    if !width.is_finite() || !speed.is_finite() || speed <= 0.0 {
        return Err(ArmError::Actuator(format!(
            "invalid gripper goal: width = {}, speed = {}", width, speed
        )));
    }
    Ok(())
}

/// Parallel gripper with an optional object between the fingers
pub struct SimGripper {
    width: f64,
    finger_joints: Vec<String>,
    /// Width of a held object; grasps cannot close past it [m]
    pub object_width: Option<f64>,
}

impl SimGripper {
    /// Fully open gripper
    pub fn new(config: &GripperConfig) -> Self {
        Self {
            width: MAX_GRIPPER_WIDTH,
            finger_joints: config.finger_joints.clone(),
            object_width: None,
        }
    }

    /// Opening between the fingers [m]
    pub fn width(&self) -> f64 {
        self.width
    }
}

#[async_trait]
impl GripperActuator for SimGripper {
    async fn move_fingers(&mut self, goal: &MoveGoal) -> Result<bool> {
        check_goal(goal.width, goal.speed)?;
        self.width = goal.width.clamp(0.0, MAX_GRIPPER_WIDTH);
        Ok(true)
    }

    async fn grasp(&mut self, goal: &GraspGoal) -> Result<bool> {
        check_goal(goal.width, goal.speed)?;
        let commanded = goal.width.clamp(0.0, MAX_GRIPPER_WIDTH);
        self.width = match self.object_width {
            Some(object) => object.clamp(commanded, MAX_GRIPPER_WIDTH),
            None => commanded,
        };

        let success = goal.width - goal.epsilon_inner < self.width
            && self.width < goal.width + goal.epsilon_outer;
        Ok(success)
    }

    async fn finger_joint_state(&self) -> Result<FingerJointState> {
        Ok(FingerJointState {
            names: self.finger_joints.clone(),
            positions: vec![self.width / 2.0; self.finger_joints.len()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{parse_obstacles, populate};

    const TABLE: &str = r#"{
        "obstacles": [
            {"name": "table", "type": "static_box", "x": 0.5, "y": 0.0, "z": -0.01,
             "size_x": 1.2, "size_y": 1.6, "size_z": 0.02}
        ]
    }"#;

    fn down_at(x: f64, y: f64, z: f64) -> Pose {
        Isometry3::from_parts(Translation3::new(x, y, z), ready_pose().rotation)
    }

    async fn arm_with_table() -> SimArm {
        let mut arm = SimArm::new();
        populate(&mut arm, &parse_obstacles(TABLE).unwrap()).await.unwrap();
        arm
    }

    #[tokio::test]
    async fn test_free_path_is_complete() {
        let mut arm = SimArm::new();
        let target = down_at(0.4, 0.1, 0.4);

        let (trajectory, fraction) = arm.compute_cartesian_path(&[target], 0.01, 5.0).await.unwrap();

        assert_eq!(fraction, 1.0);
        assert!(trajectory.point_count() > 20);
        let last = trajectory.poses.last().unwrap();
        assert!(translation_distance(last, &target) < 1e-12);
    }

    #[tokio::test]
    async fn test_path_into_obstacle_is_truncated() {
        let mut arm = arm_with_table().await;
        let target = down_at(0.4, 0.0, -0.2);

        let (trajectory, fraction) = arm.compute_cartesian_path(&[target], 0.01, 5.0).await.unwrap();

        assert!(fraction > 0.0 && fraction < 1.0, "fraction {}", fraction);
        assert!(trajectory.poses.iter().all(|pose| pose.translation.z > 0.0));
    }

    #[tokio::test]
    async fn test_non_positive_step_is_a_computation_error() {
        let mut arm = SimArm::new();

        let (trajectory, fraction) = arm
            .compute_cartesian_path(&[down_at(0.4, 0.0, 0.4)], 0.0, 5.0)
            .await
            .unwrap();

        assert_eq!(fraction, -1.0);
        assert_eq!(trajectory.point_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_moves_to_last_point() {
        let mut arm = SimArm::new();
        let target = down_at(0.35, -0.1, 0.3);
        let (trajectory, _) = arm.compute_cartesian_path(&[target], 0.05, 5.0).await.unwrap();

        assert!(arm.execute(&trajectory).await.unwrap());
        assert!(translation_distance(&arm.current_pose().await.unwrap(), &target) < 1e-12);
        assert!(!arm.execute(&SimTrajectory::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_joint_move_into_obstacle_is_rejected() {
        let mut arm = arm_with_table().await;
        let start = arm.current_pose().await.unwrap();

        assert!(!arm.go_to_pose(&down_at(0.4, 0.0, -0.01)).await.unwrap());
        assert_eq!(arm.current_pose().await.unwrap(), start);
        assert!(arm.go_to_pose(&down_at(0.4, 0.0, 0.2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_adding_a_box_twice_replaces_it() {
        let mut arm = arm_with_table().await;
        populate(&mut arm, &parse_obstacles(TABLE).unwrap()).await.unwrap();

        assert_eq!(arm.obstacles().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_speed_limit_is_rejected() {
        let mut arm = SimArm::new();

        assert!(arm.limit_cartesian_speed(0.0).await.is_err());
        arm.limit_cartesian_speed(0.1).await.unwrap();
        assert_eq!(arm.speed_limit(), Some(0.1));
    }

    #[tokio::test]
    async fn test_grasp_stops_at_object() {
        let mut gripper = SimGripper::new(&GripperConfig::default());
        gripper.object_width = Some(0.03);
        let goal = GraspGoal {
            width: 0.0,
            epsilon_inner: 0.08,
            epsilon_outer: 0.08,
            speed: 0.1,
            force: 20.0,
        };

        assert!(gripper.grasp(&goal).await.unwrap());
        assert!((gripper.width() - 0.03).abs() < 1e-12);

        let state = gripper.finger_joint_state().await.unwrap();
        assert!((state.width_mm() - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_grasp_outside_tolerance_fails() {
        let mut gripper = SimGripper::new(&GripperConfig::default());
        gripper.object_width = Some(0.05);
        let goal = GraspGoal {
            width: 0.0,
            epsilon_inner: 0.01,
            epsilon_outer: 0.01,
            speed: 0.1,
            force: 20.0,
        };

        assert!(!gripper.grasp(&goal).await.unwrap());
    }

    #[tokio::test]
    async fn test_move_fingers_clamps_width() {
        let mut gripper = SimGripper::new(&GripperConfig::default());

        assert!(gripper.move_fingers(&MoveGoal { width: 0.2, speed: 0.1 }).await.unwrap());
        assert_eq!(gripper.width(), MAX_GRIPPER_WIDTH);
    }

    #[tokio::test]
    async fn test_path_beyond_point_limit_is_a_computation_error() {
        let mut arm = SimArm::new();

        for x in [1.0e30, 1.0e4] {
            let (trajectory, fraction) = arm
                .compute_cartesian_path(&[down_at(x, 0.0, 0.3)], 0.01, 5.0)
                .await
                .unwrap();

            assert_eq!(fraction, -1.0);
            assert_eq!(trajectory.point_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_path_at_point_limit_is_planned() {
        let mut arm = SimArm::new();
        let start = arm.current_pose().await.unwrap();
        let step = 1.0e-5;
        let target = down_at(start.translation.x, start.translation.y, start.translation.z - 0.5);

        let (trajectory, fraction) = arm.compute_cartesian_path(&[target], step, 5.0).await.unwrap();

        assert_eq!(fraction, 1.0);
        assert!(trajectory.point_count() <= MAX_PATH_POINTS);
    }

    #[tokio::test]
    async fn test_non_finite_gripper_goal_is_an_actuator_error() {
        let mut gripper = SimGripper::new(&GripperConfig::default());

        let result = gripper.move_fingers(&MoveGoal { width: f64::NAN, speed: 0.1 }).await;

        assert!(matches!(result, Err(ArmError::Actuator(_))));
        assert_eq!(gripper.width(), MAX_GRIPPER_WIDTH);
    }
}
