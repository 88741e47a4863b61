pub mod battery;
pub mod doctor;
pub mod margins;
pub mod state;
pub mod target;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlightError {
    /// Caller asked for takeoff timing before a takeoff was seen.
    #[error("no takeoff recorded on this connection")]
    NoTakeoffRecorded,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightConfig {
    /// Nominal flight endurance, seconds.
    pub endurance_s: Option<f64>,

    /// Nominal cruise speed used for return-time estimates, m/s.
    pub cruise_speed_mps: Option<f64>,

    /// Charge level the battery turnback estimate aims to land with.
    pub battery_target_pct: Option<f64>,
}

/// Fixed airframe figures. These are configured, never estimated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightProfile {
    pub endurance_s: f64,
    pub cruise_speed_mps: f64,
}

impl Default for FlightProfile {
    fn default() -> Self {
        Self { endurance_s: 1800.0, cruise_speed_mps: 10.0 }
    }
}

impl FlightConfig {
    pub fn profile(&self) -> FlightProfile {
        let d = FlightProfile::default();
        FlightProfile {
            endurance_s: self.endurance_s.unwrap_or(d.endurance_s),
            cruise_speed_mps: self.cruise_speed_mps.unwrap_or(d.cruise_speed_mps),
        }
    }

    pub fn battery_target_pct(&self) -> f64 {
        self.battery_target_pct.unwrap_or(30.0)
    }
}
