//! Commands sent to the RCI control server.
//!
//! Each command is a JSON object tagged by its `command` field:
//!
//! ```json
//! {"command": "set_azimuth_position", "position": 182.5}
//! {"command": "stop"}
//! ```

use serde::{Deserialize, Serialize};

/// Every command the bridge can issue to the RCI server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RciCommand {
    /// Slew the azimuth axis to `position` degrees.
    SetAzimuthPosition { position: f64 },
    /// Slew the elevation axis to `position` degrees.
    SetElevationPosition { position: f64 },
    /// Drive the azimuth axis at `velocity` degrees per second.
    SetAzimuthVelocity { velocity: f64 },
    /// Drive the elevation axis at `velocity` degrees per second.
    SetElevationVelocity { velocity: f64 },
    /// Angle subtracted from every commanded azimuth.
    SetAzimuthOffset { position: f64 },
    /// Angle subtracted from every commanded elevation.
    SetElevationOffset { position: f64 },
    /// Stop commanding movement.
    Stop,
}

impl RciCommand {
    /// The `command` tag, for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            RciCommand::SetAzimuthPosition { .. } => "set_azimuth_position",
            RciCommand::SetElevationPosition { .. } => "set_elevation_position",
            RciCommand::SetAzimuthVelocity { .. } => "set_azimuth_velocity",
            RciCommand::SetElevationVelocity { .. } => "set_elevation_velocity",
            RciCommand::SetAzimuthOffset { .. } => "set_azimuth_offset",
            RciCommand::SetElevationOffset { .. } => "set_elevation_offset",
            RciCommand::Stop => "stop",
        }
    }
}
