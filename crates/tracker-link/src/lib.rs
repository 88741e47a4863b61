pub mod cadence;
pub mod mav;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// mavlink connection string, e.g. "tcpout:127.0.0.1:5760",
    /// "udpin:0.0.0.0:14550" or "serial:/dev/ttyUSB0:57600".
    pub connect: String,

    /// MAVLink ids we use (ground station side). 255/190 is the usual GCS pair.
    pub sys_id: u8,
    pub comp_id: u8,

    /// Rate requested for all telemetry streams, Hz. Default 4.
    pub stream_rate_hz: Option<u16>,

    /// GCS heartbeat send rate. Default 1Hz, 0 disables.
    pub send_heartbeat_hz: Option<f32>,
}

impl LinkConfig {
    pub fn stream_rate_hz(&self) -> u16 {
        self.stream_rate_hz.unwrap_or(4)
    }

    pub fn heartbeat_hz(&self) -> f32 {
        self.send_heartbeat_hz.unwrap_or(1.0)
    }
}
