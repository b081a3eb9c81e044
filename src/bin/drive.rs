//! Drive the car.
//!
//! Usage:
//!   drive [--config config.yml] [--model model.json] [--max-loops N] [--mode user]
//!
//! Operator commands are read from stdin, one per line:
//! `angle F`, `throttle F`, `center`, `mode user|local_angle|local`,
//! `record on|off|toggle`, `stop`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use donkey_car::config::CarConfig;
use donkey_car::drive::assemble;
use donkey_car::logging;
use donkey_car::parts::{LinearPilot, SimPwm, SyntheticConfig, SyntheticFrames};
use donkey_car_core::mode::DriveMode;
use tokio::io::BufReader;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "drive", about = "Run the donkey car drive loop")]
struct Args {
    /// Car config file (YAML). Defaults to ./config.yml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pilot model to load.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Stop after this many ticks.
    #[arg(long)]
    max_loops: Option<u64>,

    /// Starting drive mode (user, local_angle, local).
    #[arg(long)]
    mode: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<CarConfig> {
    let default_path = PathBuf::from("config.yml");
    let path = match path {
        Some(p) => p.clone(),
        None if default_path.is_file() => default_path,
        None => {
            info!("No config file, using defaults");
            let config = CarConfig::default();
            config.validate()?;
            return Ok(config);
        }
    };
    CarConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(logging::DEFAULT_DIRECTIVE);
    let args = Args::parse();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(label) = &args.mode {
        config.default_mode = label
            .parse::<DriveMode>()
            .map_err(|e| anyhow::anyhow!("--mode {}: {}", label, e))?;
    }
    if args.max_loops.is_some() {
        config.max_loop_count = args.max_loops;
    }

    let model = match &args.model {
        Some(path) => LinearPilot::load(donkey_car::config::expand_home(path))
            .with_context(|| format!("loading model {}", path.display()))?,
        None => {
            warn!("No model given, pilot predicts neutral");
            LinearPilot::default()
        }
    };

    let (height, width) = config.camera.resolution;
    let frames = SyntheticFrames::new(SyntheticConfig {
        width,
        height,
        channels: config.camera.channels,
        ..SyntheticConfig::default()
    });
    let pwm = SimPwm::new(config.pwm.frequency_hz);
    let commands = BufReader::new(tokio::io::stdin());

    let mut vehicle = assemble(&config, frames, commands, model, pwm).context("wiring drive pipeline")?;

    info!(
        rate_hz = config.drive_loop_hz,
        mode = %config.default_mode,
        tub = %config.tub_path.display(),
        "Starting vehicle"
    );
    let summary = vehicle
        .start(config.drive_loop_hz, config.max_loop_count)
        .await
        .context("drive loop failed")?;
    info!(
        ticks = summary.ticks,
        overruns = summary.stats.total_overruns,
        "Stopped: {:?}",
        summary.reason
    );
    Ok(())
}
