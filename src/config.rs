//! Car configuration
//!
//! A single YAML file describes the car: loop rate, camera, PWM
//! calibration and training defaults. Every field has a default matching a
//! stock donkey car, so an empty file is a valid configuration.
//!
//! ```yaml
//! drive_loop_hz: 20
//! camera:
//!   resolution: [120, 160]   # height, width
//! steering:
//!   channel: 1
//!   left_pwm: 420
//!   right_pwm: 360
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use donkey_car_core::mode::DriveMode;
use donkey_car_core::scheduler::LoopTiming;
use donkey_car_core::servo::{SteeringCalibration, ThrottleCalibration, MAX_TICKS};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level car configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    /// Directory holding the config file, tubs and models.
    pub car_path: PathBuf,
    /// Recording directory. Relative paths resolve against `car_path`.
    pub tub_path: PathBuf,
    /// Drive loop rate in Hz.
    pub drive_loop_hz: u32,
    /// Stop after this many ticks (None = run until interrupted).
    pub max_loop_count: Option<u64>,
    /// Mode the controller starts in.
    #[serde(with = "mode_label")]
    pub default_mode: DriveMode,
    pub camera: CameraConfig,
    pub steering: SteeringConfig,
    pub throttle: ThrottleConfig,
    pub pwm: PwmConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// (height, width)
    pub resolution: (u32, u32),
    pub framerate: u32,
    /// 1 = grayscale, 3 = RGB
    pub channels: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            resolution: (120, 160),
            framerate: 20,
            channels: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub channel: u8,
    pub left_pwm: u16,
    pub right_pwm: u16,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        let cal = SteeringCalibration::default();
        Self {
            channel: cal.channel,
            left_pwm: cal.left_pulse,
            right_pwm: cal.right_pulse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub channel: u8,
    pub forward_pwm: u16,
    pub stopped_pwm: u16,
    pub reverse_pwm: u16,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        let cal = ThrottleCalibration::default();
        Self {
            channel: cal.channel,
            forward_pwm: cal.forward_pulse,
            stopped_pwm: cal.stopped_pulse,
            reverse_pwm: cal.reverse_pulse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub frequency_hz: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self { frequency_hz: 60 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    /// Fraction of records used for training; the rest validates.
    pub train_split: f32,
    pub epochs: usize,
    pub learning_rate: f32,
    /// Epochs without validation improvement before stopping.
    pub early_stop_patience: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            train_split: 0.8,
            epochs: 100,
            learning_rate: 0.001,
            early_stop_patience: 5,
        }
    }
}

impl Default for CarConfig {
    fn default() -> Self {
        let car_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            tub_path: car_path.join("tub"),
            car_path,
            drive_loop_hz: 20,
            max_loop_count: None,
            default_mode: DriveMode::User,
            camera: CameraConfig::default(),
            steering: SteeringConfig::default(),
            throttle: ThrottleConfig::default(),
            pwm: PwmConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl CarConfig {
    /// Load and validate a YAML config file.
    ///
    /// `car_path` defaults to the file's directory; a relative `tub_path`
    /// resolves against it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_yaml(&contents, &base).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse a YAML document, resolving paths against `base`.
    pub fn from_yaml(contents: &str, base: &Path) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Paths {
            car_path: Option<PathBuf>,
            tub_path: Option<PathBuf>,
        }

        let mut config: CarConfig = if contents.trim().is_empty() {
            CarConfig::default()
        } else {
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: base.to_path_buf(),
                source,
            })?
        };
        let paths: Option<Paths> = serde_yaml::from_str(contents).ok();
        let (car_path, tub_path) = paths
            .map(|p| (p.car_path, p.tub_path))
            .unwrap_or((None, None));

        config.car_path = match car_path.map(|p| expand_home(p)) {
            Some(path) if path.is_relative() => base.join(path),
            Some(path) => path,
            None => base.to_path_buf(),
        };
        let tub_path = expand_home(tub_path.unwrap_or_else(|| PathBuf::from("tub")));
        config.tub_path = if tub_path.is_absolute() {
            tub_path
        } else {
            config.car_path.join(tub_path)
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and channel assignments.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drive_loop_hz == 0 || self.drive_loop_hz > LoopTiming::MAX_RATE_HZ {
            return Err(invalid(
                "drive_loop_hz",
                format!("must be 1..={}", LoopTiming::MAX_RATE_HZ),
            ));
        }
        let (height, width) = self.camera.resolution;
        if height == 0 || width == 0 {
            return Err(invalid("camera.resolution", "height and width must be non-zero"));
        }
        if self.camera.framerate == 0 {
            return Err(invalid("camera.framerate", "must be non-zero"));
        }
        if !matches!(self.camera.channels, 1 | 3) {
            return Err(invalid("camera.channels", "must be 1 or 3"));
        }
        for (field, ticks) in [
            ("steering.left_pwm", self.steering.left_pwm),
            ("steering.right_pwm", self.steering.right_pwm),
            ("throttle.forward_pwm", self.throttle.forward_pwm),
            ("throttle.stopped_pwm", self.throttle.stopped_pwm),
            ("throttle.reverse_pwm", self.throttle.reverse_pwm),
        ] {
            if ticks > MAX_TICKS {
                return Err(invalid(field, format!("{} exceeds {}", ticks, MAX_TICKS)));
            }
        }
        if self.steering.channel == self.throttle.channel {
            return Err(invalid(
                "throttle.channel",
                format!("collides with steering channel {}", self.steering.channel),
            ));
        }
        if self.pwm.frequency_hz == 0 {
            return Err(invalid("pwm.frequency_hz", "must be non-zero"));
        }
        let split = self.training.train_split;
        if !(split > 0.0 && split < 1.0) {
            return Err(invalid("training.train_split", "must be between 0 and 1"));
        }
        if self.training.batch_size == 0 {
            return Err(invalid("training.batch_size", "must be non-zero"));
        }
        Ok(())
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming::new(self.drive_loop_hz)
    }

    pub fn steering_calibration(&self) -> SteeringCalibration {
        SteeringCalibration {
            channel: self.steering.channel,
            left_pulse: self.steering.left_pwm,
            right_pulse: self.steering.right_pwm,
        }
    }

    pub fn throttle_calibration(&self) -> ThrottleCalibration {
        ThrottleCalibration {
            channel: self.throttle.channel,
            forward_pulse: self.throttle.forward_pwm,
            stopped_pulse: self.throttle.stopped_pwm,
            reverse_pulse: self.throttle.reverse_pwm,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

mod mode_label {
    use donkey_car_core::mode::DriveMode;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &DriveMode, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(mode.label())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DriveMode, D::Error> {
        let label = String::deserialize(d)?;
        label
            .parse()
            .map_err(|e| D::Error::custom(format!("{}: `{}`", e, label)))
    }
}
