//! Configuration loading for the arm daemon

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::{ArmError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub socket: SocketConfig,
    pub move_l: MoveLineConfig,
    pub open_gripper: OpenGripperConfig,
    pub close_gripper: CloseGripperConfig,
    pub gripper: GripperConfig,
    pub tool: ToolConfig,
    pub orientation: OrientationConfig,
    pub obstacles: ObstaclesConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Whether the daemon dials the peer or waits for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketMode {
    Connect,
    Listen,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    pub mode: SocketMode,
    /// Pause after each reply before reading the next command
    pub reply_delay_ms: u64,
    /// Append `[success=...]` to every reply
    pub include_success: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MoveLineConfig {
    pub resolution_m: f64,
    pub jump_threshold: f64,
    /// Cartesian link speed limit [m/s]
    pub speed: f64,
    pub max_attempts: u32,
    pub resolution_jitter_m: f64,
    pub jump_threshold_jitter: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenGripperConfig {
    pub width: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloseGripperConfig {
    pub width: f64,
    pub epsilon_inner: f64,
    pub epsilon_outer: f64,
    pub speed: f64,
    pub force: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GripperConfig {
    pub finger_joints: Vec<String>,
    pub state_timeout_s: f64,
}

/// Rigid transform from the last link to the tool tip
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub offset_m: f64,
    pub rotation_deg: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrientationConfig {
    pub normalize: bool,
    pub tolerance_deg: f64,
    /// Yaw of the tool relative to the last link
    pub frame_offset_deg: f64,
    /// Rotational symmetry of the tool; the band is +/- half of it
    pub period_deg: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ObstaclesConfig {
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub save_planning_res: bool,
    pub log_dir: PathBuf,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            host: "192.168.125.5".to_string(),
            port: 65432,
            mode: SocketMode::Connect,
            reply_delay_ms: 100,
            include_success: false,
        }
    }
}

impl Default for MoveLineConfig {
    fn default() -> Self {
        Self {
            resolution_m: 0.01,
            jump_threshold: 5.0,
            speed: 0.1,
            max_attempts: 20,
            resolution_jitter_m: 0.002,
            jump_threshold_jitter: 1.0,
        }
    }
}

impl Default for OpenGripperConfig {
    fn default() -> Self {
        Self { width: 0.08, speed: 0.1 }
    }
}

impl Default for CloseGripperConfig {
    fn default() -> Self {
        Self {
            width: 0.0,
            epsilon_inner: 0.08,
            epsilon_outer: 0.08,
            speed: 0.1,
            force: 20.0,
        }
    }
}

impl Default for GripperConfig {
    fn default() -> Self {
        Self {
            finger_joints: vec![
                "panda_finger_joint1".to_string(),
                "panda_finger_joint2".to_string(),
            ],
            state_timeout_s: 5.0,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            offset_m: 0.1034,
            rotation_deg: -45.0,
        }
    }
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            tolerance_deg: 3.0,
            frame_offset_deg: 45.0,
            period_deg: 90.0,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            save_planning_res: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ArmError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::load_from_str(&contents)
    }

    /// Parse and validate a configuration string
    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the planner or the gripper query cannot work with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.float_fields() {
            if !value.is_finite() {
                return Err(ArmError::Config(format!("{} must be a finite number, got {}", name, value)));
            }
        }

        let move_l = &self.move_l;
        if move_l.resolution_m <= 0.0 {
            return Err(ArmError::Config(format!(
                "move_l.resolution_m must be positive, got {}", move_l.resolution_m
            )));
        }
        if move_l.resolution_jitter_m < 0.0 || move_l.jump_threshold_jitter < 0.0 {
            return Err(ArmError::Config("move_l jitters must not be negative".to_string()));
        }
        if move_l.resolution_jitter_m >= move_l.resolution_m {
            return Err(ArmError::Config(format!(
                "move_l.resolution_jitter_m ({}) must be smaller than resolution_m ({})",
                move_l.resolution_jitter_m, move_l.resolution_m
            )));
        }
        if move_l.speed <= 0.0 {
            return Err(ArmError::Config("move_l.speed must be positive".to_string()));
        }
        if move_l.max_attempts == 0 {
            return Err(ArmError::Config("move_l.max_attempts must be at least 1".to_string()));
        }
        if self.orientation.tolerance_deg <= 0.0 {
            return Err(ArmError::Config("orientation.tolerance_deg must be positive".to_string()));
        }
        if self.orientation.period_deg <= 0.0 {
            return Err(ArmError::Config("orientation.period_deg must be positive".to_string()));
        }
        if self.gripper.finger_joints.len() != 2 {
            return Err(ArmError::Config(format!(
                "gripper.finger_joints needs exactly two names, got {:?}", self.gripper.finger_joints
            )));
        }
        if self.gripper.state_timeout_s <= 0.0 {
            return Err(ArmError::Config("gripper.state_timeout_s must be positive".to_string()));
        }
        Ok(())
    }

    fn float_fields(&self) -> [(&'static str, f64); 18] {
        [
            ("move_l.resolution_m", self.move_l.resolution_m),
            ("move_l.jump_threshold", self.move_l.jump_threshold),
            ("move_l.speed", self.move_l.speed),
            ("move_l.resolution_jitter_m", self.move_l.resolution_jitter_m),
            ("move_l.jump_threshold_jitter", self.move_l.jump_threshold_jitter),
            ("open_gripper.width", self.open_gripper.width),
            ("open_gripper.speed", self.open_gripper.speed),
            ("close_gripper.width", self.close_gripper.width),
            ("close_gripper.epsilon_inner", self.close_gripper.epsilon_inner),
            ("close_gripper.epsilon_outer", self.close_gripper.epsilon_outer),
            ("close_gripper.speed", self.close_gripper.speed),
            ("close_gripper.force", self.close_gripper.force),
            ("gripper.state_timeout_s", self.gripper.state_timeout_s),
            ("tool.offset_m", self.tool.offset_m),
            ("tool.rotation_deg", self.tool.rotation_deg),
            ("orientation.tolerance_deg", self.orientation.tolerance_deg),
            ("orientation.frame_offset_deg", self.orientation.frame_offset_deg),
            ("orientation.period_deg", self.orientation.period_deg),
        ]
    }
}

impl SocketConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

impl GripperConfig {
    pub fn state_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.state_timeout_s)
    }
}
