//! Conversion between the tool frame and the last-link frame
//!
//! The peer talks about the tip of the gripper, the planner about the last
//! mechanical link. The two are related by a fixed transform: an offset along
//! the link's z axis and a rotation about that same axis.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use crate::config::ToolConfig;
use crate::pose::Pose;

/// Converts poses between the tool tip and the last link
#[derive(Debug, Clone)]
pub struct FrameConverter {
    /// Transformation from the last link to the tool tip
    link_to_tool: Isometry3<f64>,
}

impl FrameConverter {
    pub fn new(offset_m: f64, rotation_deg: f64) -> Self {
        let link_to_tool = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, offset_m),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rotation_deg.to_radians()),
        );
        Self { link_to_tool }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.offset_m, config.rotation_deg)
    }

    /// Pose of the last link that puts the tool tip at `tool_pose`
    pub fn to_link_frame(&self, tool_pose: &Pose) -> Pose {
        tool_pose * self.link_to_tool.inverse()
    }

    /// Pose of the tool tip when the last link is at `link_pose`
    pub fn to_tool_frame(&self, link_pose: &Pose) -> Pose {
        link_pose * self.link_to_tool
    }
}

impl Default for FrameConverter {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{pose_from_rotation_vector, wrap_to_pi};
    use std::f64::consts::PI;

    fn assert_pose_eq(a: &Pose, b: &Pose, epsilon: f64) {
        let dt = (a.translation.vector - b.translation.vector).abs().max();
        let dq = (a.rotation.coords - b.rotation.coords).abs().max();
        assert!(dt <= epsilon, "position differs by {}: {:?} vs {:?}", dt, a, b);
        assert!(dq <= epsilon, "quaternion differs by {}: {:?} vs {:?}", dq, a, b);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let converter = FrameConverter::default();
        let poses = [
            pose_from_rotation_vector([0.5, 0.0, 0.3], [3.14, 0.0, 0.0]),
            pose_from_rotation_vector([0.561, -0.487, 0.348], [2.786, -0.586, 0.509]),
            pose_from_rotation_vector([-0.2, 0.7, 1.1], [0.0, 0.0, 0.0]),
            pose_from_rotation_vector([0.0, 0.0, 0.0], [0.1, -1.2, 2.0]),
        ];

        for pose in &poses {
            let back = converter.to_tool_frame(&converter.to_link_frame(pose));
            assert_pose_eq(&back, pose, 1e-9);

            let back = converter.to_link_frame(&converter.to_tool_frame(pose));
            assert_pose_eq(&back, pose, 1e-9);
        }
    }

    #[test]
    fn test_tool_tip_hangs_below_downward_link() {
        let converter = FrameConverter::default();
        let link = Isometry3::from_parts(
            Translation3::new(0.4, 0.1, 0.5),
            UnitQuaternion::from_euler_angles(PI, 0.0, 0.0),
        );

        let tool = converter.to_tool_frame(&link);
        let t = tool.translation.vector;
        assert!((t.x - 0.4).abs() < 1e-12);
        assert!((t.y - 0.1).abs() < 1e-12);
        assert!((t.z - (0.5 - 0.1034)).abs() < 1e-12);
    }

    #[test]
    fn test_tool_yaw_leads_link_yaw_by_45_degrees() {
        let converter = FrameConverter::default();
        let link_yaw = 10f64.to_radians();
        let link = Isometry3::from_parts(
            Translation3::new(0.5, 0.0, 0.4),
            UnitQuaternion::from_euler_angles(PI, 0.0, link_yaw),
        );

        let (roll, pitch, yaw) = converter.to_tool_frame(&link).rotation.euler_angles();
        assert!(wrap_to_pi(roll - PI).abs() < 1e-9);
        assert!(pitch.abs() < 1e-9);
        assert!(wrap_to_pi(yaw - 55f64.to_radians()).abs() < 1e-9);
    }
}
