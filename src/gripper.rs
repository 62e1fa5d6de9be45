//! Gripper actuator abstraction and goals

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::config::{CloseGripperConfig, OpenGripperConfig};
use crate::Result;

/// Move the fingers to a width without force control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveGoal {
    /// Intended opening width [m]
    pub width: f64,
    /// Closing speed [m/s]
    pub speed: f64,
}

/// Grasp an object of a known width with a given force
///
/// The grasp succeeds if the final width `w` satisfies
/// `width - epsilon_inner < w < width + epsilon_outer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraspGoal {
    /// Size of the object to grasp [m]
    pub width: f64,
    /// Maximum tolerated deviation when the actual width is smaller [m]
    pub epsilon_inner: f64,
    /// Maximum tolerated deviation when the actual width is larger [m]
    pub epsilon_outer: f64,
    /// Closing speed [m/s]
    pub speed: f64,
    /// Grasping force [N]
    pub force: f64,
}

/// Positions of the finger joints as reported by the gripper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerJointState {
    pub names: Vec<String>,
    /// Finger positions [m]
    pub positions: Vec<f64>,
}

impl From<&OpenGripperConfig> for MoveGoal {
    fn from(config: &OpenGripperConfig) -> Self {
        Self {
            width: config.width,
            speed: config.speed,
        }
    }
}

impl From<&CloseGripperConfig> for GraspGoal {
    fn from(config: &CloseGripperConfig) -> Self {
        Self {
            width: config.width,
            epsilon_inner: config.epsilon_inner,
            epsilon_outer: config.epsilon_outer,
            speed: config.speed,
            force: config.force,
        }
    }
}

impl FingerJointState {
    /// Opening between the fingers [mm]
    pub fn width_mm(&self) -> f64 {
        1000.0 * self.positions.iter().sum::<f64>()
    }
}

/// Action interface of the gripper
///
/// Both actions block until the gripper reports completion.
#[async_trait]
pub trait GripperActuator: Send + Sync {
    async fn move_fingers(&mut self, goal: &MoveGoal) -> Result<bool>;

    async fn grasp(&mut self, goal: &GraspGoal) -> Result<bool>;

    /// Wait for the next finger joint state message
    async fn finger_joint_state(&self) -> Result<FingerJointState>;
}
