use once_cell::unsync::OnceCell;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use tracker_proto::command::StreamRequest;
use tracker_proto::telemetry::{
    BatteryStatus, GlobalPosition, Heartbeat, MessageBody, TelemetryMessage, STATUS_ACTIVE,
};

use crate::{battery, FlightError, FlightProfile};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    /// Meters above home.
    pub relative_alt_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeoffSnapshot {
    /// Unknown when no position had arrived before the vehicle went airborne.
    pub position: Option<Position>,
    pub alt_asl_m: Option<f64>,
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirState {
    Ground,
    Air,
}

impl AirState {
    fn from_status(system_status: u8) -> Self {
        if system_status == STATUS_ACTIVE { AirState::Air } else { AirState::Ground }
    }
}

/// Things `ingest` wants the outside world to know about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// First message on this connection; ask the vehicle to stream.
    RequestStreams(StreamRequest),
    /// Monitoring began with the vehicle already in the air.
    AlreadyAirborne,
    TakeoffCaptured(TakeoffSnapshot),
}

/// Newest message of each kind we track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestMessages {
    pub heartbeat: Option<Heartbeat>,
    pub global_position: Option<GlobalPosition>,
    pub battery: Option<BatteryStatus>,
}

/// Flight state derived from one vehicle's telemetry. Build a new one per
/// connection; the takeoff snapshot lives as long as the value does.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryState {
    profile: FlightProfile,
    locked_system: Option<u8>,
    position: Option<Position>,
    heading_deg: Option<f64>,
    latest: LatestMessages,
    /// None until the first heartbeat arrives.
    air_state: Option<AirState>,
    takeoff: OnceCell<TakeoffSnapshot>,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new(FlightProfile::default())
    }
}

impl TelemetryState {
    pub fn new(profile: FlightProfile) -> Self {
        Self {
            profile,
            locked_system: None,
            position: None,
            heading_deg: None,
            latest: LatestMessages::default(),
            air_state: None,
            takeoff: OnceCell::new(),
        }
    }

    pub fn ingest(&mut self, msg: TelemetryMessage) -> Vec<Signal> {
        self.ingest_at(msg, OffsetDateTime::now_utc())
    }

    /// Same as [`ingest`](Self::ingest) with an explicit clock.
    pub fn ingest_at(&mut self, msg: TelemetryMessage, now: OffsetDateTime) -> Vec<Signal> {
        let mut signals = Vec::new();

        match self.locked_system {
            None => {
                info!("telemetry: locked onto system {} (component {})", msg.system_id, msg.component_id);
                self.locked_system = Some(msg.system_id);
                signals.push(Signal::RequestStreams(StreamRequest {
                    target_system: msg.system_id,
                    target_component: msg.component_id,
                }));
            }
            Some(id) if id != msg.system_id => {
                debug!("telemetry: ignoring message from system {}", msg.system_id);
                return signals;
            }
            Some(_) => {}
        }

        match msg.body {
            MessageBody::GlobalPosition(p) => {
                self.position = Some(Position {
                    lat: p.lat_deg(),
                    lon: p.lon_deg(),
                    relative_alt_m: p.relative_alt_m(),
                });
                self.heading_deg = p.heading_deg();
                self.latest.global_position = Some(p);
            }
            MessageBody::BatteryStatus(b) => {
                self.latest.battery = Some(b);
            }
            MessageBody::Heartbeat(hb) => {
                self.on_heartbeat(hb, now, &mut signals);
            }
        }

        signals
    }

    fn on_heartbeat(&mut self, hb: Heartbeat, now: OffsetDateTime, signals: &mut Vec<Signal>) {
        let next = AirState::from_status(hb.system_status);
        let edge = match (self.air_state, next) {
            (None, AirState::Air) => {
                warn!("telemetry: vehicle already airborne when monitoring began");
                signals.push(Signal::AlreadyAirborne);
                true
            }
            (Some(AirState::Ground), AirState::Air) => true,
            _ => false,
        };

        if edge && self.takeoff.get().is_none() {
            let snapshot = TakeoffSnapshot {
                position: self.position,
                alt_asl_m: self.current_alt_asl(),
                at: now,
            };
            if self.takeoff.set(snapshot).is_ok() {
                info!("telemetry: takeoff captured at {:?}", snapshot.position);
                signals.push(Signal::TakeoffCaptured(snapshot));
            }
        }

        self.air_state = Some(next);
        self.latest.heartbeat = Some(hb);
    }

    pub fn locked_system(&self) -> Option<u8> {
        self.locked_system
    }

    pub fn latest(&self) -> &LatestMessages {
        &self.latest
    }

    pub fn air_state(&self) -> Option<AirState> {
        self.air_state
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn current_position(&self) -> Option<Position> {
        self.position
    }

    /// (latitude, longitude) in decimal degrees.
    pub fn current_lat_lon(&self) -> Option<(f64, f64)> {
        self.position.map(|p| (p.lat, p.lon))
    }

    pub fn current_heading_deg(&self) -> Option<f64> {
        self.heading_deg
    }

    /// Meters above sea level.
    pub fn current_alt_asl(&self) -> Option<f64> {
        self.latest.global_position.map(|p| p.alt_m())
    }

    pub fn takeoff(&self) -> Option<&TakeoffSnapshot> {
        self.takeoff.get()
    }

    pub fn takeoff_lat_lon(&self) -> Option<(f64, f64)> {
        self.takeoff().and_then(|t| t.position).map(|p| (p.lat, p.lon))
    }

    pub fn takeoff_alt_asl(&self) -> Option<f64> {
        self.takeoff().and_then(|t| t.alt_asl_m)
    }

    /// Time since the takeoff snapshot. Asking before a takeoff has been seen
    /// is a caller bug and is reported as [`FlightError::NoTakeoffRecorded`].
    pub fn time_since_takeoff(&self) -> Result<Duration, FlightError> {
        self.time_since_takeoff_at(OffsetDateTime::now_utc())
    }

    pub fn time_since_takeoff_at(&self, now: OffsetDateTime) -> Result<Duration, FlightError> {
        let t = self.takeoff().ok_or(FlightError::NoTakeoffRecorded)?;
        Ok(now - t.at)
    }

    pub fn last_status(&self) -> Option<u8> {
        self.latest.heartbeat.map(|hb| hb.system_status)
    }

    /// Off the ground according to the last heartbeat.
    pub fn in_air(&self) -> bool {
        self.last_status().map(|s| s > 3).unwrap_or(false)
    }

    /// Seconds.
    pub fn endurance(&self) -> f64 {
        self.profile.endurance_s
    }

    /// m/s
    pub fn speed(&self) -> f64 {
        self.profile.cruise_speed_mps
    }

    /// Seconds until the battery reaches `target_pct`; None while undetermined.
    pub fn battery_time_remaining(&self, target_pct: f64) -> Option<f64> {
        self.latest.battery.as_ref().and_then(|b| battery::time_to_target(b, target_pct))
    }
}
