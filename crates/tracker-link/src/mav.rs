use std::sync::Arc;

use anyhow::{Context, Result};
use mavlink::{
    common::{
        MavAutopilot, MavDataStream, MavFrame, MavMessage, MavModeFlag, MavState, MavType,
        PositionTargetTypemask, HEARTBEAT_DATA, REQUEST_DATA_STREAM_DATA, SET_POSITION_TARGET_GLOBAL_INT_DATA,
    },
    error::MessageReadError,
    MavConnection, MavHeader,
};
use tracing::{debug, info};

use tracker_proto::command::{PositionSetpoint, StreamRequest};
use tracker_proto::telemetry::{BatteryStatus, GlobalPosition, Heartbeat, MessageBody, TelemetryMessage};

use crate::LinkConfig;

type Conn = Arc<dyn MavConnection<MavMessage> + Send + Sync>;

/// Open the link and split it into a blocking reader and a sender.
pub fn connect(cfg: &LinkConfig) -> Result<(LinkReader, LinkSender)> {
    let conn = mavlink::connect::<MavMessage>(&cfg.connect)
        .with_context(|| format!("mavlink connect {}", cfg.connect))?;
    let conn: Conn = Arc::from(conn);
    info!("link: connected to {}", cfg.connect);

    let reader = LinkReader { conn: conn.clone() };
    let sender = LinkSender {
        conn,
        hdr: MavHeader { system_id: cfg.sys_id, component_id: cfg.comp_id, sequence: 0 },
        stream_rate_hz: cfg.stream_rate_hz(),
    };
    Ok((reader, sender))
}

pub struct LinkReader {
    conn: Conn,
}

impl LinkReader {
    /// Blocks for the next frame. Ok(None) for frames the flight state does
    /// not track or that failed to parse; Err only when the transport fails.
    /// Run it on a dedicated thread.
    pub fn recv(&self) -> Result<Option<TelemetryMessage>> {
        match self.conn.recv() {
            Ok((hdr, msg)) => Ok(decode(&hdr, &msg)),
            Err(MessageReadError::Io(e)) => Err(e).context("mavlink recv"),
            Err(e) => {
                debug!("link: dropped unparseable frame: {:?}", e);
                Ok(None)
            }
        }
    }
}

pub struct LinkSender {
    conn: Conn,
    hdr: MavHeader,
    stream_rate_hz: u16,
}

impl LinkSender {
    pub fn request_streams(&mut self, req: &StreamRequest) -> Result<()> {
        info!(
            "link: requesting all streams at {}Hz from {}/{}",
            self.stream_rate_hz, req.target_system, req.target_component
        );
        self.send(stream_request_message(req, self.stream_rate_hz))
    }

    pub fn send_setpoint(&mut self, sp: &PositionSetpoint) -> Result<()> {
        debug!("link: setpoint {:?}", sp);
        self.send(setpoint_message(sp))
    }

    pub fn send_heartbeat(&mut self) -> Result<()> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GCS,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.send(MavMessage::HEARTBEAT(hb))
    }

    fn send(&mut self, msg: MavMessage) -> Result<()> {
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn.send(&self.hdr, &msg).context("mavlink send")?;
        Ok(())
    }
}

/// Map the three message kinds the flight state tracks; everything else is None.
pub fn decode(hdr: &MavHeader, msg: &MavMessage) -> Option<TelemetryMessage> {
    let body = match msg {
        MavMessage::HEARTBEAT(hb) => MessageBody::Heartbeat(Heartbeat {
            system_status: hb.system_status as u8,
        }),
        MavMessage::GLOBAL_POSITION_INT(p) => MessageBody::GlobalPosition(GlobalPosition {
            lat_e7: p.lat,
            lon_e7: p.lon,
            relative_alt_mm: p.relative_alt,
            alt_mm: p.alt,
            hdg_cdeg: p.hdg,
        }),
        MavMessage::BATTERY_STATUS(b) => MessageBody::BatteryStatus(BatteryStatus {
            current_consumed_mah: b.current_consumed,
            // -1 means the autopilot does not know
            remaining_pct: u8::try_from(b.battery_remaining).ok().filter(|p| *p <= 100),
            current_battery: Some(b.current_battery).filter(|c| *c != -1),
        }),
        _ => return None,
    };
    Some(TelemetryMessage::new(hdr.system_id, hdr.component_id, body))
}

pub fn stream_request_message(req: &StreamRequest, rate_hz: u16) -> MavMessage {
    MavMessage::REQUEST_DATA_STREAM(REQUEST_DATA_STREAM_DATA {
        req_message_rate: rate_hz,
        target_system: req.target_system,
        target_component: req.target_component,
        req_stream_id: MavDataStream::MAV_DATA_STREAM_ALL as u8,
        start_stop: 1,
    })
}

pub fn setpoint_message(sp: &PositionSetpoint) -> MavMessage {
    let ignore = PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VX_IGNORE
        | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VY_IGNORE
        | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VZ_IGNORE
        | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AX_IGNORE
        | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AY_IGNORE
        | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AZ_IGNORE
        | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_YAW_IGNORE;

    MavMessage::SET_POSITION_TARGET_GLOBAL_INT(SET_POSITION_TARGET_GLOBAL_INT_DATA {
        time_boot_ms: 0,
        lat_int: sp.lat_e7,
        lon_int: sp.lon_e7,
        alt: sp.alt_m,
        vx: 0.0,
        vy: 0.0,
        vz: 0.0,
        afx: 0.0,
        afy: 0.0,
        afz: 0.0,
        yaw: 0.0,
        yaw_rate: sp.yaw_rate,
        type_mask: ignore,
        target_system: sp.target_system,
        target_component: sp.target_component,
        coordinate_frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
    })
}
