use time::OffsetDateTime;

use crate::state::TelemetryState;

/// Safety figures for the slow loop. Anything that depends on data we have
/// not seen yet stays None.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlightMargins {
    pub height_above_ground_m: Option<f64>,
    pub home_distance_m: Option<f64>,
    pub time_home_s: Option<f64>,
    pub endurance_turnback_s: Option<f64>,
    pub battery_turnback_s: Option<f64>,
}

impl FlightMargins {
    pub fn evaluate(
        state: &TelemetryState,
        ground_elevation_m: Option<f64>,
        battery_target_pct: f64,
        now: OffsetDateTime,
    ) -> Self {
        let height_above_ground_m = match (state.current_alt_asl(), ground_elevation_m) {
            (Some(alt), Some(ground)) => Some(alt - ground),
            _ => None,
        };

        let home_distance_m = match (state.current_lat_lon(), state.takeoff_lat_lon()) {
            (Some((lat, lon)), Some((home_lat, home_lon))) => Some(haversine_m(home_lat, home_lon, lat, lon)),
            _ => None,
        };

        let speed = state.speed();
        let time_home_s = home_distance_m.filter(|_| speed > 0.0).map(|d| d / speed);

        let endurance_turnback_s = match (state.time_since_takeoff_at(now), time_home_s) {
            (Ok(elapsed), Some(home)) => Some(state.endurance() - elapsed.as_seconds_f64() - home),
            _ => None,
        };

        let battery_turnback_s = match (state.battery_time_remaining(battery_target_pct), time_home_s) {
            (Some(batt), Some(home)) => Some(batt - home),
            _ => None,
        };

        Self { height_above_ground_m, home_distance_m, time_home_s, endurance_turnback_s, battery_turnback_s }
    }

    /// Seconds until we must head home, whichever limit comes first.
    pub fn turnback_s(&self) -> Option<f64> {
        match (self.endurance_turnback_s, self.battery_turnback_s) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = 6_371_000.0_f64;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    r * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlightProfile;
    use time::macros::datetime;
    use time::Duration;
    use tracker_proto::telemetry::{BatteryStatus, GlobalPosition, Heartbeat, MessageBody, TelemetryMessage};

    const T0: OffsetDateTime = datetime!(2024-05-01 10:00 UTC);

    fn at(lat: f64, lon: f64, alt_mm: i32) -> TelemetryMessage {
        TelemetryMessage::new(3, 1, MessageBody::GlobalPosition(GlobalPosition {
            lat_e7: (lat * 1e7) as i32,
            lon_e7: (lon * 1e7) as i32,
            relative_alt_mm: 0,
            alt_mm,
            hdg_cdeg: 0,
        }))
    }

    fn hb(status: u8) -> TelemetryMessage {
        TelemetryMessage::new(3, 1, MessageBody::Heartbeat(Heartbeat { system_status: status }))
    }

    #[test]
    fn nothing_known_yields_nothing() {
        let st = TelemetryState::default();
        let m = FlightMargins::evaluate(&st, Some(10.0), 30.0, T0);
        assert_eq!(m, FlightMargins::default());
        assert_eq!(m.turnback_s(), None);
    }

    #[test]
    fn height_above_ground() {
        let mut st = TelemetryState::default();
        st.ingest_at(at(52.0, -4.0, 150_000), T0);
        let m = FlightMargins::evaluate(&st, Some(40.0), 30.0, T0);
        assert_eq!(m.height_above_ground_m, Some(110.0));
        assert_eq!(FlightMargins::evaluate(&st, None, 30.0, T0).height_above_ground_m, None);
    }

    #[test]
    fn endurance_and_battery_turnback() {
        let mut st = TelemetryState::new(FlightProfile { endurance_s: 1800.0, cruise_speed_mps: 10.0 });
        st.ingest_at(at(52.0, -4.0, 100_000), T0);
        st.ingest_at(hb(3), T0);
        st.ingest_at(hb(4), T0);
        // ~1 km north of the takeoff point
        st.ingest_at(at(52.009, -4.0, 100_000), T0);
        st.ingest_at(TelemetryMessage::new(3, 1, MessageBody::BatteryStatus(BatteryStatus {
            current_consumed_mah: 500,
            remaining_pct: Some(70),
            current_battery: Some(50),
        })), T0);

        let m = FlightMargins::evaluate(&st, None, 30.0, T0 + Duration::seconds(600));
        let d = m.home_distance_m.unwrap();
        assert!((d - 1000.8).abs() < 1.0, "distance {d}");
        let home = m.time_home_s.unwrap();
        assert!((m.endurance_turnback_s.unwrap() - (1200.0 - home)).abs() < 1e-9);
        assert!((m.battery_turnback_s.unwrap() - (4800.0 - home)).abs() < 1e-6);
        assert_eq!(m.turnback_s(), m.endurance_turnback_s);
    }

    #[test]
    fn unknown_consumption_leaves_battery_turnback_open() {
        let mut st = TelemetryState::default();
        st.ingest_at(at(52.0, -4.0, 100_000), T0);
        st.ingest_at(hb(3), T0);
        st.ingest_at(hb(4), T0);
        st.ingest_at(at(52.009, -4.0, 100_000), T0);
        st.ingest_at(TelemetryMessage::new(3, 1, MessageBody::BatteryStatus(BatteryStatus {
            current_consumed_mah: -1,
            remaining_pct: Some(70),
            current_battery: Some(50),
        })), T0);

        let m = FlightMargins::evaluate(&st, None, 30.0, T0 + Duration::seconds(60));
        assert!(m.time_home_s.is_some());
        assert_eq!(m.battery_turnback_s, None);
        assert_eq!(m.turnback_s(), m.endurance_turnback_s);
    }

    #[test]
    fn haversine_is_symmetric() {
        let there = haversine_m(52.0, -4.0, 52.5, -3.0);
        let back = haversine_m(52.5, -3.0, 52.0, -4.0);
        assert!((there - back).abs() < 1e-6);
        assert_eq!(haversine_m(52.0, -4.0, 52.0, -4.0), 0.0);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1.0);
    }
}
