//! Command dispatcher for the socket peer
//!
//! A single request/reply loop: read one message, run it to completion, send
//! the resulting arm state back, pause, repeat. There is no pipelining and no
//! cancellation. A peer must wait for the reply before sending again.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use crate::config::{Config, SocketConfig, SocketMode};
use crate::controller::MotionController;
use crate::error::CommandError;
use crate::frame::FrameConverter;
use crate::gripper::GripperActuator;
use crate::orientation::OrientationNormalizer;
use crate::pose::{pose_from_rotation_vector, pose_to_list, pose_to_rotation_vector, Pose};
use crate::protocol::{ArmState, Command, CommandParser, GripperAction};
use crate::session::ArmSession;
use crate::{ArmError, Result};

/// Largest message read in one go
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent the exit message
    Exit,
    /// The peer closed the connection
    PeerClosed,
}

/// Open the peer connection, dialing or waiting as `socket.mode` says
pub async fn open_stream(config: &SocketConfig) -> Result<TcpStream> {
    let address = config.address();
    match config.mode {
        SocketMode::Connect => {
            info!("Connecting to {}", address);
            TcpStream::connect(&address)
                .await
                .map_err(|e| ArmError::Connection(format!("Failed to connect to {}: {}", address, e)))
        }
        SocketMode::Listen => {
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|e| ArmError::Connection(format!("Failed to bind {}: {}", address, e)))?;
            info!("Waiting for a peer on {}", address);
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| ArmError::Connection(format!("Failed to accept peer: {}", e)))?;
            info!("Accepted peer {}", peer);
            Ok(stream)
        }
    }
}

/// Routes socket commands to the motion controller and answers with the arm state
pub struct CommandDispatcher<S: ArmSession, G: GripperActuator> {
    controller: MotionController<S, G>,
    parser: CommandParser,
    frames: FrameConverter,
    normalizer: Option<OrientationNormalizer>,
    reply_delay: Duration,
    include_success: bool,
}

impl<S: ArmSession, G: GripperActuator> CommandDispatcher<S, G> {
    pub fn new(controller: MotionController<S, G>, config: &Config) -> Result<Self> {
        let normalizer = config
            .orientation
            .normalize
            .then(|| OrientationNormalizer::from_config(&config.orientation));

        Ok(Self {
            controller,
            parser: CommandParser::new()?,
            frames: FrameConverter::from_config(&config.tool),
            normalizer,
            reply_delay: config.socket.reply_delay(),
            include_success: config.socket.include_success,
        })
    }

    pub fn controller(&self) -> &MotionController<S, G> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MotionController<S, G> {
        &mut self.controller
    }

    /// Last-link target for a tool-frame position and rotation vector
    pub fn link_target(
        &self,
        position: [f64; 3],
        rotation_vector: [f64; 3],
    ) -> std::result::Result<Pose, CommandError> {
        let tool_pose = pose_from_rotation_vector(position, rotation_vector);
        let mut link_pose = self.frames.to_link_frame(&tool_pose);
        debug!("l8: target = {:?}", pose_to_list(&link_pose));

        if let Some(normalizer) = &self.normalizer {
            link_pose.rotation = normalizer.normalize(&link_pose.rotation)?;
        }
        Ok(link_pose)
    }

    /// Run one command; the flag is the backend's success report
    pub async fn dispatch(&mut self, command: &Command) -> std::result::Result<bool, CommandError> {
        match command {
            // Handled by the transport loop
            Command::Exit => Ok(true),
            Command::Move { position, rotation_vector } => {
                debug!("target_pose_ee_in_base: {:?} {:?}", position, rotation_vector);
                let target = self.link_target(*position, *rotation_vector)?;
                Ok(self.controller.move_line(&target).await?)
            }
            Command::Gripper(action) => {
                let success = match action {
                    GripperAction::Open => {
                        info!("trying to open");
                        self.controller.open_gripper().await?
                    }
                    GripperAction::Close => {
                        info!("trying to close");
                        self.controller.close_gripper().await?
                    }
                };
                let width = self.controller.gripper_width_mm().await?;
                info!("width_mm = {:.1}", width);
                Ok(success)
            }
        }
    }

    /// Live arm state with the pose converted to the tool frame
    pub async fn arm_state(&self, success: bool) -> Result<ArmState> {
        let link_pose = self.controller.current_pose().await?;
        let tool_pose = self.frames.to_tool_frame(&link_pose);
        debug!("l8_in_base_out = {:?}", pose_to_list(&link_pose));
        debug!("ee_in_base_out = {:?}", pose_to_list(&tool_pose));

        Ok(ArmState {
            gripper_gap_mm: self.controller.gripper_width_mm().await?,
            joints: self.controller.current_joints().await?,
            tool_pose: pose_to_rotation_vector(&tool_pose),
            success,
        })
    }

    /// Handle one message
    ///
    /// `Ok(None)` ends the session. Unknown commands and failed state
    /// queries are errors; every other failure becomes `success = false`.
    pub async fn handle_message(&mut self, message: &str) -> Result<Option<ArmState>> {
        info!("received {:?}", message);

        let success = match self.parser.parse(message) {
            Ok(Command::Exit) => {
                info!("closing client socket - bye");
                return Ok(None);
            }
            Ok(command) => match self.dispatch(&command).await {
                Ok(success) => success,
                Err(e) => {
                    error!("data=[{}] error={}", message, e);
                    false
                }
            },
            Err(e) if e.is_fatal() => {
                error!("data=[{}] error={}", message, e);
                return Err(ArmError::Protocol(e.to_string()));
            }
            Err(e) => {
                error!("data=[{}] error={}", message, e);
                false
            }
        };

        info!("success = [{}] for cmd [{}]", success, message.trim_end());
        Ok(Some(self.arm_state(success).await?))
    }

    /// Serve one peer until it exits, disconnects or breaks the protocol
    pub async fn serve<T>(&mut self, mut stream: T) -> Result<SessionEnd>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = [0u8; MAX_MESSAGE_BYTES];

        loop {
            let n = stream.read(&mut buffer).await?;
            if n == 0 {
                warn!("Peer closed the connection");
                return Ok(SessionEnd::PeerClosed);
            }

            let message = String::from_utf8_lossy(&buffer[..n]);
            match self.handle_message(&message).await? {
                None => {
                    let _ = stream.shutdown().await;
                    return Ok(SessionEnd::Exit);
                }
                Some(state) => {
                    let reply = state.to_reply(self.include_success);
                    stream.write_all(reply.as_bytes()).await?;
                    stream.flush().await?;
                    tokio::time::sleep(self.reply_delay).await;
                }
            }
        }
    }
}
