use serde::{Deserialize, Serialize};

/// Heartbeat status code the flight state treats as airborne.
pub const STATUS_ACTIVE: u8 = 4;

/// Sentinel used by the autopilot for "heading unknown".
pub const HEADING_UNKNOWN: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Heartbeat,
    GlobalPosition,
    BatteryStatus,
}

/// A decoded telemetry message together with the ids of the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub system_id: u8,
    pub component_id: u8,
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    Heartbeat(Heartbeat),
    GlobalPosition(GlobalPosition),
    BatteryStatus(BatteryStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub system_status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub lat_e7: i32,
    pub lon_e7: i32,
    pub relative_alt_mm: i32,
    pub alt_mm: i32,
    pub hdg_cdeg: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub current_consumed_mah: i32,
    /// Percent 0-100, None when the autopilot reports it as unknown.
    pub remaining_pct: Option<u8>,
    /// Instantaneous current in link units; multiply by 10 for mA.
    pub current_battery: Option<i16>,
}

impl TelemetryMessage {
    pub fn new(system_id: u8, component_id: u8, body: MessageBody) -> Self {
        Self { system_id, component_id, body }
    }

    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Heartbeat(_) => MessageKind::Heartbeat,
            MessageBody::GlobalPosition(_) => MessageKind::GlobalPosition,
            MessageBody::BatteryStatus(_) => MessageKind::BatteryStatus,
        }
    }
}

impl GlobalPosition {
    pub fn lat_deg(&self) -> f64 {
        self.lat_e7 as f64 / 1e7
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon_e7 as f64 / 1e7
    }

    /// Height above home, meters.
    pub fn relative_alt_m(&self) -> f64 {
        self.relative_alt_mm as f64 / 1e3
    }

    /// Height above sea level, meters.
    pub fn alt_m(&self) -> f64 {
        self.alt_mm as f64 / 1e3
    }

    pub fn heading_deg(&self) -> Option<f64> {
        if self.hdg_cdeg == HEADING_UNKNOWN {
            None
        } else {
            Some(self.hdg_cdeg as f64 / 1e2)
        }
    }
}
