//! Pose representation and small geometry helpers
//!
//! Poses are rigid transforms of the arm's control frame relative to the robot
//! base. Orientation is a unit quaternion, so a non-normalized rotation can't
//! be constructed. On the wire, orientation travels as a rotation vector
//! (axis scaled by angle, radians).

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Position [m] and orientation of a frame in the robot base frame
pub type Pose = Isometry3<f64>;

/// Build a pose from a position and a rotation vector
pub fn pose_from_rotation_vector(position: [f64; 3], rotation_vector: [f64; 3]) -> Pose {
    Isometry3::from_parts(
        Translation3::new(position[0], position[1], position[2]),
        UnitQuaternion::from_scaled_axis(Vector3::from(rotation_vector)),
    )
}

/// `[x, y, z, rx, ry, rz]` with the orientation as a rotation vector
pub fn pose_to_rotation_vector(pose: &Pose) -> [f64; 6] {
    let t = pose.translation.vector;
    let r = pose.rotation.scaled_axis();
    [t.x, t.y, t.z, r.x, r.y, r.z]
}

/// `[x, y, z, qx, qy, qz, qw]` rounded for log lines
pub fn pose_to_list(pose: &Pose) -> Vec<f64> {
    let t = pose.translation.vector;
    let q = pose.rotation.coords;
    [t.x, t.y, t.z, q.x, q.y, q.z, q.w]
        .iter()
        .map(|v| (v * 1000.0).round() / 1000.0)
        .collect()
}

/// Straight-line distance between two positions [m]
pub fn translation_distance(a: &Pose, b: &Pose) -> f64 {
    (a.translation.vector - b.translation.vector).norm()
}

/// Euclidean distance between the raw quaternion coefficients
///
/// `q` and `-q` are the same rotation but are 2 apart here.
pub fn quaternion_distance(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    (a.coords - b.coords).norm()
}

/// Wrap an angle into `(-period / 2, period / 2]`
pub fn wrap_symmetric(angle: f64, period: f64) -> f64 {
    let half = period / 2.0;
    angle - period * ((angle - half) / period).ceil()
}

/// Wrap an angle into `(-pi, pi]`
pub fn wrap_to_pi(angle: f64) -> f64 {
    wrap_symmetric(angle, 2.0 * PI)
}
