//! Planning scene bootstrap from an obstacle file

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use crate::session::ArmSession;
use crate::{ArmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    StaticBox,
}

/// Axis-aligned obstacle, centered at `(x, y, z)` in the robot base frame
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Obstacle {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
}

#[derive(Debug, Deserialize, Serialize)]
struct ObstacleFile {
    obstacles: Vec<Obstacle>,
}

impl Obstacle {
    pub fn center(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn size(&self) -> Vector3<f64> {
        Vector3::new(self.size_x, self.size_y, self.size_z)
    }

    /// Whether `point` lies inside the box, borders included
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        let offset = (point - self.center()).abs();
        let half = self.size() / 2.0;
        offset.x <= half.x && offset.y <= half.y && offset.z <= half.z
    }
}

/// Parse an obstacle file
pub fn load_obstacles<P: AsRef<Path>>(path: P) -> Result<Vec<Obstacle>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ArmError::Config(format!(
            "obstacles file not found: [{}]", path.display()
        )));
    }
    let contents = fs::read_to_string(path)?;
    parse_obstacles(&contents)
}

pub fn parse_obstacles(contents: &str) -> Result<Vec<Obstacle>> {
    let file: ObstacleFile = serde_json::from_str(contents)
        .map_err(|e| ArmError::Config(format!("invalid obstacles file: {}", e)))?;
    Ok(file.obstacles)
}

/// Add every obstacle to the session's planning scene
pub async fn populate<S: ArmSession>(session: &mut S, obstacles: &[Obstacle]) -> Result<()> {
    for obstacle in obstacles {
        info!("Adding obstacle [{}] at ({:.3}, {:.3}, {:.3})", obstacle.name, obstacle.x, obstacle.y, obstacle.z);
        session.add_box(obstacle).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static_box() {
        let obstacles = parse_obstacles(include_str!("../config/obstacles.json")).unwrap();

        assert_eq!(obstacles.len(), 1);
        assert_eq!(obstacles[0].name, "table");
        assert_eq!(obstacles[0].kind, ObstacleKind::StaticBox);
    }

    #[test]
    fn test_unknown_obstacle_type_is_a_config_error() {
        let contents = r#"{"obstacles": [{"name": "ball", "type": "sphere", "x": 0, "y": 0, "z": 0,
            "size_x": 1, "size_y": 1, "size_z": 1}]}"#;

        assert!(matches!(parse_obstacles(contents), Err(ArmError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        assert!(matches!(load_obstacles("does/not/exist.json"), Err(ArmError::Config(_))));
    }

    #[test]
    fn test_box_contains() {
        let table = Obstacle {
            name: "table".to_string(),
            kind: ObstacleKind::StaticBox,
            x: 0.5,
            y: 0.0,
            z: -0.01,
            size_x: 1.2,
            size_y: 1.6,
            size_z: 0.02,
        };

        assert!(table.contains(&Vector3::new(0.5, 0.3, -0.015)));
        assert!(!table.contains(&Vector3::new(0.5, 0.3, 0.1)));
        assert!(!table.contains(&Vector3::new(1.5, 0.0, -0.01)));
    }
}
