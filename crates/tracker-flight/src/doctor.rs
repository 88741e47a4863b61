use anyhow::Result;
use crate::FlightConfig;

pub fn check_profile(cfg: &FlightConfig) -> Result<()> {
    let p = cfg.profile();
    anyhow::ensure!(p.endurance_s > 0.0, "flight.endurance_s must be positive");
    anyhow::ensure!(p.cruise_speed_mps > 0.0, "flight.cruise_speed_mps must be positive");
    let target = cfg.battery_target_pct();
    anyhow::ensure!((0.0..100.0).contains(&target), "flight.battery_target_pct should be 0..100");
    Ok(())
}
