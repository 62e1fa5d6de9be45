//! Error types for arm control and command dispatch

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArmError>;

/// Failures of the daemon, the arm session or the gripper actuator
#[derive(Error, Debug)]
pub enum ArmError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Planning backend error: {0}")]
    Backend(String),

    #[error("Gripper actuator error: {0}")]
    Actuator(String),

    #[error("Gripper actuator timed out: {0}")]
    ActuatorTimeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Failure of a single socket command
///
/// Everything except [`CommandError::UnknownCommand`] is answered with a
/// `success=false` reply and the session continues.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Malformed command payload: {0}")]
    Parse(String),

    #[error("Unsupported target orientation: {0}")]
    Orientation(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Arm(#[from] ArmError),
}

impl CommandError {
    /// Whether the session must be dropped instead of replying
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::UnknownCommand(_))
    }
}
