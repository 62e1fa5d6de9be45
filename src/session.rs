//! Arm session abstraction
//!
//! The motion planner, its collision scene and the trajectory driver live
//! outside this crate. [`ArmSession`] is the narrow interface the controller
//! drives them through, so any planning stack can be plugged in with an
//! adapter.

use async_trait::async_trait;
use serde::Serialize;
use crate::pose::Pose;
use crate::scene::Obstacle;
use crate::Result;

/// A planned joint trajectory, opaque to the controller
pub trait Trajectory: Clone + Serialize + Send + Sync + 'static {
    /// Number of trajectory points
    fn point_count(&self) -> usize;
}

/// Long-lived handle to the connected arm
///
/// Poses are those of the last link in the robot base frame. Every query goes
/// to the live robot state.
#[async_trait]
pub trait ArmSession: Send + Sync {
    type Trajectory: Trajectory;

    /// Current pose of the last link
    async fn current_pose(&self) -> Result<Pose>;

    /// Current joint positions [rad]
    async fn current_joints(&self) -> Result<Vec<f64>>;

    /// Limit the Cartesian speed of the last link for subsequent plans [m/s]
    async fn limit_cartesian_speed(&mut self, speed: f64) -> Result<()>;

    /// Plan a Cartesian path from the current pose through `waypoints`
    ///
    /// Returns the trajectory and the fraction of the path achieved, or
    /// `-1.0` if the computation failed.
    async fn compute_cartesian_path(
        &mut self,
        waypoints: &[Pose],
        eef_step: f64,
        jump_threshold: f64,
    ) -> Result<(Self::Trajectory, f64)>;

    /// Execute a trajectory and wait for it to finish
    async fn execute(&mut self, trajectory: &Self::Trajectory) -> Result<bool>;

    /// Plan and execute a joint-space move to `target`
    async fn go_to_pose(&mut self, target: &Pose) -> Result<bool>;

    /// Stop any residual motion
    async fn stop(&mut self) -> Result<()>;

    /// Drop pending pose goals
    async fn clear_pose_targets(&mut self) -> Result<()>;

    /// Add a static obstacle to the planning scene
    async fn add_box(&mut self, obstacle: &Obstacle) -> Result<()>;

    /// Release the session
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
