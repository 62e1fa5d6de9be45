//! Socket command protocol
//!
//! Messages are sequences of `>value<` tokens with no newline framing:
//!
//! - `>exit<` closes the connection
//! - `>move<>x<>y<>z<>rx<>ry<>rz<` moves the tool tip (meters, rotation vector in radians)
//! - `>gripper<>1<` opens and `>gripper<>0<` closes the gripper
//!
//! Every other message is answered with a state reply made of bracketed
//! fields: `[gripper_gap_mm=..]`, `[j_0=..]`..`[j_5=..]`, `[p_0=..]`..`[p_5=..]`.

use regex::Regex;
use serde::Serialize;
use std::fmt::Write;
use crate::error::CommandError;
use crate::Result;

pub const EXIT_MESSAGE: &str = ">exit<";
pub const MOVE_TOKEN: &str = ">move<";
pub const GRIPPER_TOKEN: &str = ">gripper<";
pub const GRIPPER_OPEN_MESSAGE: &str = ">gripper<>1<";
pub const GRIPPER_CLOSE_MESSAGE: &str = ">gripper<>0<";

/// Joints and pose components reported per reply
pub const REPLY_FIELDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperAction {
    Open,
    Close,
}

/// A parsed socket message
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exit,
    /// Tool-frame target in the robot base frame
    Move {
        position: [f64; 3],
        rotation_vector: [f64; 3],
    },
    Gripper(GripperAction),
}

/// Splits messages into tokens and classifies them
#[derive(Debug, Clone)]
pub struct CommandParser {
    token_pattern: Regex,
}

impl CommandParser {
    pub fn new() -> Result<Self> {
        let token_pattern = Regex::new(r">([^<>]*)<")?;
        Ok(Self { token_pattern })
    }

    /// Token values, or `None` if anything lies between or around the tokens
    pub fn tokens<'a>(&self, message: &'a str) -> Option<Vec<&'a str>> {
        let mut end = 0;
        let mut values = Vec::new();
        for captures in self.token_pattern.captures_iter(message) {
            let whole = captures.get(0)?;
            if whole.start() != end {
                return None;
            }
            end = whole.end();
            values.push(captures.get(1)?.as_str());
        }
        (end == message.len() && !values.is_empty()).then_some(values)
    }

    /// Parse one message, ignoring trailing whitespace
    pub fn parse(&self, message: &str) -> std::result::Result<Command, CommandError> {
        let message = message.trim_end();

        if message == EXIT_MESSAGE {
            return Ok(Command::Exit);
        }

        if message.contains(MOVE_TOKEN) {
            return self.parse_move(message);
        }

        if message.contains(GRIPPER_TOKEN) {
            return match message {
                GRIPPER_OPEN_MESSAGE => Ok(Command::Gripper(GripperAction::Open)),
                GRIPPER_CLOSE_MESSAGE => Ok(Command::Gripper(GripperAction::Close)),
                _ => Err(CommandError::Protocol(format!("about gripper: data={}", message))),
            };
        }

        Err(CommandError::UnknownCommand(message.to_string()))
    }

    fn parse_move(&self, message: &str) -> std::result::Result<Command, CommandError> {
        let tokens = self.tokens(message).ok_or_else(|| {
            CommandError::Parse(format!("[move] not a sequence of >value< tokens: {}", message))
        })?;

        if tokens.first() != Some(&"move") {
            return Err(CommandError::Parse(format!("[move] must start with {}: {}", MOVE_TOKEN, message)));
        }

        let values = tokens[1..]
            .iter()
            .map(|token| {
                let value: f64 = token.trim().parse().map_err(|e| {
                    CommandError::Parse(format!("[move] invalid number [{}]: {}", token, e))
                })?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(CommandError::Parse(format!("[move] non-finite number [{}]", token)))
                }
            })
            .collect::<std::result::Result<Vec<f64>, CommandError>>()?;

        if values.len() != 6 {
            return Err(CommandError::Parse(format!(
                "[move] expected 6 values, got {}: {}", values.len(), message
            )));
        }

        Ok(Command::Move {
            position: [values[0], values[1], values[2]],
            rotation_vector: [values[3], values[4], values[5]],
        })
    }
}

/// State of the arm sent back after every command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmState {
    pub gripper_gap_mm: f64,
    pub joints: Vec<f64>,
    /// `[x, y, z, rx, ry, rz]` of the tool tip
    pub tool_pose: [f64; 6],
    pub success: bool,
}

impl ArmState {
    pub fn to_reply(&self, include_success: bool) -> String {
        let mut reply = format!("[gripper_gap_mm={:?}]", self.gripper_gap_mm);
        for (i, joint) in self.joints.iter().take(REPLY_FIELDS).enumerate() {
            let _ = write!(reply, "[j_{}={:?}]", i, joint);
        }
        for (i, component) in self.tool_pose.iter().enumerate() {
            let _ = write!(reply, "[p_{}={:?}]", i, component);
        }
        if include_success {
            let _ = write!(reply, "[success={}]", self.success);
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::new().unwrap()
    }

    #[test]
    fn test_parse_move() {
        let command = parser().parse(">move<>0.5<>0.0<>0.3<>3.14<>0<>0<").unwrap();

        assert_eq!(
            command,
            Command::Move {
                position: [0.5, 0.0, 0.3],
                rotation_vector: [3.14, 0.0, 0.0],
            }
        );
    }

    #[test]
    fn test_parse_exit_and_trailing_newline() {
        assert_eq!(parser().parse(">exit<").unwrap(), Command::Exit);
        assert_eq!(parser().parse(">exit<\n").unwrap(), Command::Exit);
    }

    #[test]
    fn test_move_with_bad_number_is_parse_error() {
        let result = parser().parse(">move<>0.5<>abc<>0.3<>3.14<>0<>0<");
        assert!(matches!(result, Err(CommandError::Parse(_))));
    }

    #[test]
    fn test_move_with_five_values_is_parse_error() {
        let result = parser().parse(">move<>0.5<>0.0<>0.3<>3.14<>0<");
        assert!(matches!(result, Err(CommandError::Parse(_))));
    }

    #[test]
    fn test_move_with_junk_between_tokens_is_parse_error() {
        let result = parser().parse(">move<>0.5<x>0.0<>0.3<>3.14<>0<>0<");
        assert!(matches!(result, Err(CommandError::Parse(_))));
    }

    #[test]
    fn test_move_with_nan_is_parse_error() {
        let result = parser().parse(">move<>NaN<>0.0<>0.3<>3.14<>0<>0<");
        assert!(matches!(result, Err(CommandError::Parse(_))));
    }

    #[test]
    fn test_parse_gripper() {
        assert_eq!(parser().parse(">gripper<>1<").unwrap(), Command::Gripper(GripperAction::Open));
        assert_eq!(parser().parse(">gripper<>0<").unwrap(), Command::Gripper(GripperAction::Close));
    }

    #[test]
    fn test_unknown_gripper_payload_is_recoverable() {
        let error = parser().parse(">gripper<>2<").unwrap_err();
        assert!(matches!(error, CommandError::Protocol(_)));
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_unknown_command_is_fatal() {
        let error = parser().parse(">home<").unwrap_err();
        assert!(matches!(error, CommandError::UnknownCommand(_)));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_tokens_require_full_coverage() {
        let parser = parser();
        assert_eq!(parser.tokens(">a<>b<"), Some(vec!["a", "b"]));
        assert_eq!(parser.tokens(" >a<"), None);
        assert_eq!(parser.tokens(">a<tail"), None);
        assert_eq!(parser.tokens(""), None);
    }

    #[test]
    fn test_reply_layout() {
        let state = ArmState {
            gripper_gap_mm: 40.0,
            joints: vec![0.0, -0.5, 0.0, -2.0, 0.0, 1.5, 0.75],
            tool_pose: [0.5, 0.0, 0.3, 3.14, 0.0, 0.0],
            success: true,
        };

        assert_eq!(
            state.to_reply(false),
            "[gripper_gap_mm=40.0]\
             [j_0=0.0][j_1=-0.5][j_2=0.0][j_3=-2.0][j_4=0.0][j_5=1.5]\
             [p_0=0.5][p_1=0.0][p_2=0.3][p_3=3.14][p_4=0.0][p_5=0.0]"
        );
        assert!(state.to_reply(true).ends_with("[p_5=0.0][success=true]"));
    }
}
