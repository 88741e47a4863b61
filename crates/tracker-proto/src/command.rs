use serde::{Deserialize, Serialize};

/// Component id the setpoint is addressed to (the autopilot).
pub const AUTOPILOT_COMPONENT: u8 = 1;

/// One-time request asking the vehicle to start streaming all telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub target_system: u8,
    pub target_component: u8,
}

/// Position + yaw-rate setpoint in the global frame, altitude relative to home.
/// Only latitude, longitude, altitude and yaw rate are meaningful; the link
/// marks velocity, acceleration and yaw as ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSetpoint {
    pub target_system: u8,
    pub target_component: u8,
    pub lat_e7: i32,
    pub lon_e7: i32,
    pub alt_m: f32,
    /// rad/s
    pub yaw_rate: f32,
}
