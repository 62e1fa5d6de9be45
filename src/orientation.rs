//! Orientation normalization for a downward-pointing symmetric tool
//!
//! The arm only accepts targets where the gripper points straight down, with
//! the yaw about the vertical axis as the only free parameter. The planner is
//! reliable for a narrow yaw band, and the tool looks the same every 90°, so a
//! yaw outside the band is swapped for its symmetric equivalent inside it.

use nalgebra::UnitQuaternion;
use std::f64::consts::PI;
use tracing::{error, info, warn};
use crate::config::OrientationConfig;
use crate::error::CommandError;
use crate::pose::{wrap_symmetric, wrap_to_pi};

/// Validates link-frame orientations and folds their yaw into the symmetry band
#[derive(Debug, Clone)]
pub struct OrientationNormalizer {
    tolerance: f64,
    frame_offset: f64,
    period: f64,
}

impl OrientationNormalizer {
    pub fn new(tolerance_deg: f64, frame_offset_deg: f64, period_deg: f64) -> Self {
        Self {
            tolerance: tolerance_deg.to_radians(),
            frame_offset: frame_offset_deg.to_radians(),
            period: period_deg.to_radians(),
        }
    }

    pub fn from_config(config: &OrientationConfig) -> Self {
        Self::new(config.tolerance_deg, config.frame_offset_deg, config.period_deg)
    }

    /// Half width of the band, in the tool frame [rad]
    pub fn band_limit(&self) -> f64 {
        self.period / 2.0
    }

    /// Yaw of a link orientation shaped like Euler xyz `(180°, 0, yaw)`
    pub fn yaw_from_orientation(&self, q: &UnitQuaternion<f64>) -> Result<f64, CommandError> {
        let (roll, pitch, yaw) = q.euler_angles();

        if wrap_to_pi(roll - PI).abs() < self.tolerance && wrap_to_pi(pitch).abs() < self.tolerance {
            return Ok(yaw);
        }

        let triplet = format!(
            "[{:.1} {:.1} {:.1}]",
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees()
        );
        error!("cannot derive rz from {}", triplet);
        Err(CommandError::Orientation(format!(
            "expected euler [180 0 rz] within {:.1} deg, got {}",
            self.tolerance.to_degrees(),
            triplet
        )))
    }

    /// Downward-pointing link orientation with the given yaw
    pub fn orientation_from_yaw(yaw: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(PI, 0.0, yaw)
    }

    /// Fold a tool-frame yaw into `(-period / 2, period / 2]`
    pub fn wrap_to_band(&self, tool_yaw: f64) -> f64 {
        wrap_symmetric(tool_yaw, self.period)
    }

    /// Validate `q` and return it, or its symmetric equivalent inside the band
    pub fn normalize(&self, q: &UnitQuaternion<f64>) -> Result<UnitQuaternion<f64>, CommandError> {
        let link_yaw = self.yaw_from_orientation(q)?;
        info!("{:.1} = target_rz", link_yaw.to_degrees());

        let tool_yaw = link_yaw + self.frame_offset;
        let limit = self.band_limit();
        if (-limit..=limit).contains(&tool_yaw) {
            return Ok(*q);
        }

        warn!(
            "target_rz_ee={:.1} not in [{:.0}, {:.0}]:",
            tool_yaw.to_degrees(),
            -limit.to_degrees(),
            limit.to_degrees()
        );
        let wrapped_tool_yaw = self.wrap_to_band(tool_yaw);
        let wrapped_link_yaw = wrapped_tool_yaw - self.frame_offset;
        warn!(
            "setting rz_ee={:.1} => rz_l8={:.1} deg",
            wrapped_tool_yaw.to_degrees(),
            wrapped_link_yaw.to_degrees()
        );

        Ok(Self::orientation_from_yaw(wrapped_link_yaw))
    }
}

impl Default for OrientationNormalizer {
    fn default() -> Self {
        Self::from_config(&OrientationConfig::default())
    }
}
