use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use tracker_flight::margins::FlightMargins;
use tracker_flight::state::{Signal, TelemetryState};
use tracker_flight::target::TargetChannel;
use tracker_flight::{doctor as flight_doctor, FlightConfig};
use tracker_link::cadence::Cadence;
use tracker_link::mav::{self, LinkSender};
use tracker_link::LinkConfig;
use tracker_proto::command::PositionSetpoint;
use tracker_proto::telemetry::TelemetryMessage;
use tracker_terrain::{doctor as terrain_doctor, Terrain, TerrainConfig};

use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "tracker", version, about = "tracker - drone telemetry and terrain clearance monitor")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Doctor,
    Terrain { #[command(subcommand)] cmd: TerrainCmd },
    Run(RunArgs),
}

#[derive(Debug, Subcommand)]
enum TerrainCmd {
    /// List loaded tiles and their extents.
    Info,
    /// Ground elevation under a WGS84 position.
    Query {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Fly-to target latitude; sent as a position setpoint once locked on.
    #[arg(long, allow_negative_numbers = true, requires_all = ["target_lon", "target_alt"])]
    target_lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true, requires = "target_lat")]
    target_lon: Option<f64>,
    /// Meters above home.
    #[arg(long, requires = "target_lat")]
    target_alt: Option<f64>,
    /// rad/s
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    yaw_rate: f64,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    link: Option<LinkConfig>,
    #[serde(default)]
    flight: FlightConfig,
    terrain: TerrainConfig,
    #[serde(default)]
    cadence: CadenceCfg,
}

#[derive(Debug, serde::Deserialize)]
struct CadenceCfg {
    fast_ms: u64,
    slow_ms: u64,
}

impl Default for CadenceCfg {
    fn default() -> Self {
        Self { fast_ms: 2, slow_ms: 500 }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Terrain { cmd } => terrain_cmd(&cfg, cmd)?,
        Command::Run(args) => run(&cfg, args).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    if let Some(link) = &cfg.link {
        anyhow::ensure!(!link.connect.is_empty(), "link.connect missing");
        anyhow::ensure!(link.stream_rate_hz() > 0, "link.stream_rate_hz must be > 0");
    } else {
        warn!("doctor: no [link] section; run will only serve terrain");
    }

    flight_doctor::check_profile(&cfg.flight)?;
    anyhow::ensure!(cfg.cadence.fast_ms > 0, "cadence.fast_ms must be > 0");
    anyhow::ensure!(cfg.cadence.slow_ms >= cfg.cadence.fast_ms, "cadence.slow_ms should be >= cadence.fast_ms");

    let mosaic = terrain_doctor::check_tiles(&cfg.terrain)?;
    info!("doctor: {} terrain tiles OK", mosaic.len());

    info!("doctor: OK");
    Ok(())
}

fn terrain_cmd(cfg: &Config, cmd: TerrainCmd) -> Result<()> {
    let mosaic = cfg.terrain.load_mosaic().context("load terrain")?;
    match cmd {
        TerrainCmd::Info => {
            println!("tiles={} grid={:?}", mosaic.len(), cfg.terrain.grid);
            for (path, tile) in mosaic.paths().iter().zip(mosaic.tiles()) {
                let b = tile.bounds();
                println!(
                    "{} {}x{} cell={} x=[{}, {}] y=[{}, {}]",
                    path.display(), tile.ncols(), tile.nrows(), tile.cellsize(),
                    b.min_x, b.max_x, b.min_y, b.max_y
                );
            }
            Ok(())
        }
        TerrainCmd::Query { lat, lon } => {
            let (x, y) = cfg.terrain.grid.project(lat, lon);
            match mosaic.lookup(x, y) {
                Some(z) => println!("x={:.1} y={:.1} elevation={:.2}m", x, y, z),
                None => println!("x={:.1} y={:.1} elevation=none", x, y),
            }
            Ok(())
        }
    }
}

async fn run(cfg: &Config, args: RunArgs) -> Result<()> {
    info!("run: starting");

    let mosaic = cfg.terrain.load_mosaic().context("load terrain")?;
    let terrain = Terrain::new(mosaic, cfg.terrain.grid);

    let mut state = TelemetryState::new(cfg.flight.profile());
    let mut targets = TargetChannel::new();
    if let (Some(lat), Some(lon), Some(alt)) = (args.target_lat, args.target_lon, args.target_alt) {
        targets.set_target(lat, lon, alt, args.yaw_rate);
        info!("run: target set to {:.6},{:.6} alt {}m", lat, lon, alt);
    }

    let (tx, mut rx) = mpsc::channel::<TelemetryMessage>(256);
    let mut sender: Option<LinkSender> = None;
    let mut heartbeat: Option<Cadence> = None;

    if let Some(link_cfg) = cfg.link.as_ref() {
        match mav::connect(link_cfg) {
            Ok((reader, link_sender)) => {
                sender = Some(link_sender);
                heartbeat = Cadence::from_hz(link_cfg.heartbeat_hz());

                spawn_reader(move || reader.recv(), tx).context("spawn link reader")?;
            }
            Err(e) => {
                // telemetry stays unknown; terrain still works
                warn!("run: link unavailable: {:#}", e);
            }
        }
    }

    let mut fast = tokio::time::interval(Duration::from_millis(cfg.cadence.fast_ms.max(1)));
    fast.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut slow = Cadence::new(Duration::from_millis(cfg.cadence.slow_ms));
    let battery_target = cfg.flight.battery_target_pct();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("run: stopping");
                break;
            }
            _ = fast.tick() => {}
        }

        while let Ok(msg) = rx.try_recv() {
            for signal in state.ingest(msg) {
                handle_signal(signal, sender.as_mut());
            }
        }

        if let (Some(hb), Some(s)) = (heartbeat.as_mut(), sender.as_mut()) {
            if hb.due() {
                if let Err(e) = s.send_heartbeat() { warn!("link: heartbeat send failed: {:#}", e); }
            }
        }

        if slow.due() {
            slow_tick(&state, &terrain, &targets, sender.as_mut(), battery_target);
        }
    }

    Ok(())
}

/// Pump a blocking receive into the channel on a detached OS thread.
/// mavlink `recv` cannot be interrupted, so the thread is never joined and
/// process exit does not wait on a silent link.
fn spawn_reader<F>(mut recv: F, tx: mpsc::Sender<TelemetryMessage>) -> Result<std::thread::JoinHandle<()>>
where
    F: FnMut() -> Result<Option<TelemetryMessage>> + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("mav-reader".into())
        .spawn(move || loop {
            match recv() {
                Ok(Some(msg)) => {
                    if tx.blocking_send(msg).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("link: reader stopped: {:#}", e);
                    break;
                }
            }
        })?;
    Ok(handle)
}

fn handle_signal(signal: Signal, sender: Option<&mut LinkSender>) {
    match signal {
        Signal::RequestStreams(req) => {
            if let Some(s) = sender {
                if let Err(e) = s.request_streams(&req) { warn!("link: stream request failed: {:#}", e); }
            }
        }
        // already warned by the state
        Signal::AlreadyAirborne => {}
        Signal::TakeoffCaptured(snap) => {
            info!("run: takeoff at {:?} alt_asl={:?}", snap.position, snap.alt_asl_m);
        }
    }
}

fn slow_tick(
    state: &TelemetryState,
    terrain: &Terrain,
    targets: &TargetChannel,
    sender: Option<&mut LinkSender>,
    battery_target: f64,
) {
    if let (Some(s), Some(sp)) = (sender, pending_setpoint(state, targets)) {
        if let Err(e) = s.send_setpoint(&sp) { warn!("link: setpoint send failed: {:#}", e); }
    }

    let Some((lat, lon)) = state.current_lat_lon() else {
        debug!("run: waiting for position");
        return;
    };

    let ground = terrain.elevation_at(lat, lon);
    let m = FlightMargins::evaluate(state, ground, battery_target, time::OffsetDateTime::now_utc());
    info!(
        "pos={:.6},{:.6} hdg={} in_air={} agl={} home={} turnback={} battery={}",
        lat,
        lon,
        fmt_opt(state.current_heading_deg(), "deg"),
        state.in_air(),
        fmt_opt(m.height_above_ground_m, "m"),
        fmt_opt(m.home_distance_m, "m"),
        fmt_opt(m.turnback_s(), "s"),
        fmt_opt(state.battery_time_remaining(battery_target), "s"),
    );
}

/// Setpoint due this slow tick: needs a locked system, not a position fix.
fn pending_setpoint(state: &TelemetryState, targets: &TargetChannel) -> Option<PositionSetpoint> {
    targets.serialize_for_transmission(state.locked_system()?)
}

fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{:.0}{}", v, unit),
        None => "?".to_string(),
    }
}
