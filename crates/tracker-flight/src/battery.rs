use tracker_proto::telemetry::BatteryStatus;

/// Seconds until the battery reaches `target_pct`, projected from the charge
/// used so far and the instantaneous current draw.
///
/// Returns `None` while the estimate is undetermined: nothing used yet
/// (100% remaining), no current flowing, or the autopilot reporting any
/// input as unknown (`current_consumed_mah == -1` included). A negative result
/// means the target is already behind us.
pub fn time_to_target(status: &BatteryStatus, target_pct: f64) -> Option<f64> {
    let remaining = status.remaining_pct?;
    if remaining >= 100 || status.current_consumed_mah < 0 {
        return None;
    }
    let used_mah = status.current_consumed_mah as f64;
    let pct_used = 100.0 - remaining as f64;
    let capacity_mah = used_mah * 100.0 / pct_used;

    let current_ma = status.current_battery? as f64 * 10.0;
    if current_ma == 0.0 {
        return None;
    }

    let above_target_mah = capacity_mah - used_mah - 0.01 * target_pct * capacity_mah;
    Some(above_target_mah / current_ma * 3600.0)
}
