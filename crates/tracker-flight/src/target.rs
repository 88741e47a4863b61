use tracker_proto::command::{PositionSetpoint, AUTOPILOT_COMPONENT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightTarget {
    pub lat: f64,
    pub lon: f64,
    /// Meters above home.
    pub alt_m: f64,
    /// rad/s
    pub yaw_rate: f64,
}

/// Pending outbound setpoint. Set by whoever is steering, drained by the
/// slow send loop; an empty channel sends nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetChannel {
    target: Option<FlightTarget>,
}

impl TargetChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target(&mut self, lat: f64, lon: f64, alt_m: f64, yaw_rate: f64) {
        self.target = Some(FlightTarget { lat, lon, alt_m, yaw_rate });
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&FlightTarget> {
        self.target.as_ref()
    }

    /// Setpoint for the current target addressed to `target_system`, or None
    /// when nothing is pending.
    pub fn serialize_for_transmission(&self, target_system: u8) -> Option<PositionSetpoint> {
        let t = self.target?;
        Some(PositionSetpoint {
            target_system,
            target_component: AUTOPILOT_COMPONENT,
            lat_e7: (t.lat * 1.0e7) as i32,
            lon_e7: (t.lon * 1.0e7) as i32,
            alt_m: t.alt_m as f32,
            yaw_rate: t.yaw_rate as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_channel_sends_nothing() {
        let ch = TargetChannel::new();
        assert!(!ch.has_target());
        assert_eq!(ch.serialize_for_transmission(1), None);
    }

    #[test]
    fn set_replaces_and_clear_empties() {
        let mut ch = TargetChannel::new();
        ch.set_target(52.0, -4.0, 60.0, 0.0);
        ch.set_target(52.5, -4.25, 80.0, 0.25);
        let sp = ch.serialize_for_transmission(3).unwrap();
        assert_eq!(sp.target_system, 3);
        assert_eq!(sp.target_component, 1);
        assert_eq!(sp.lat_e7, 525_000_000);
        assert_eq!(sp.lon_e7, -42_500_000);
        assert_eq!(sp.alt_m, 80.0);
        assert_eq!(sp.yaw_rate, 0.25);

        ch.clear_target();
        assert!(ch.target().is_none());
        assert_eq!(ch.serialize_for_transmission(3), None);
    }
}
