//! Servo and ESC abstraction for steering and throttle
//!
//! Steering and throttle commands travel through three representations:
//! - Normalized commands (-1.0 to +1.0) from the state controller
//! - Calibration in 12-bit PWM board ticks (PCA9685 style, 0-4095)
//! - Tick conversion to duty cycle and pulse width
//!
//! # Design
//!
//! Pure `no_std` with no feature gates. The component that actually drives
//! the PWM board lives in the runtime crate.
//!
//! ## Calibration direction
//!
//! Calibrations do not have to be ascending. A steering servo mounted
//! mirrored has `left_pulse > right_pulse`; interpolation follows whatever
//! direction the endpoints give.

use core::fmt;

/// Resolution of the PWM board counter (12 bit)
pub const PWM_RESOLUTION: u16 = 4096;

/// Largest tick value the PWM board accepts
pub const MAX_TICKS: u16 = PWM_RESOLUTION - 1;

/// Errors raised by actuator implementations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorError {
    /// Command was NaN or infinite
    NotFinite,
    /// Writing to the output channel failed
    OutputFailed {
        /// PWM channel index
        channel: u8,
    },
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::NotFinite => write!(f, "actuator command is not a finite number"),
            ActuatorError::OutputFailed { channel } => {
                write!(f, "failed to write PWM channel {}", channel)
            }
        }
    }
}

/// Actuator interface for steering and throttle
///
/// Commands are normalized (-1.0 to +1.0); implementations clamp.
pub trait ActuatorInterface {
    /// Set steering command (-1.0 left, 0.0 center, +1.0 right)
    fn set_steering(&mut self, normalized: f32) -> Result<(), ActuatorError>;

    /// Set throttle command (-1.0 reverse, 0.0 stop, +1.0 forward)
    fn set_throttle(&mut self, normalized: f32) -> Result<(), ActuatorError>;

    /// Get current steering value
    fn steering(&self) -> f32;

    /// Get current throttle value
    fn throttle(&self) -> f32;

    /// Center steering and stop throttle
    fn set_neutral(&mut self) -> Result<(), ActuatorError> {
        self.set_steering(0.0)?;
        self.set_throttle(0.0)
    }
}

/// Steering servo calibration (ticks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringCalibration {
    pub channel: u8,
    /// Ticks for full left (-1.0)
    pub left_pulse: u16,
    /// Ticks for full right (+1.0)
    pub right_pulse: u16,
}

impl SteeringCalibration {
    /// Ticks for centered steering (midpoint of left and right)
    pub fn center_pulse(&self) -> u16 {
        ((self.left_pulse as u32 + self.right_pulse as u32) / 2) as u16
    }

    /// Convert a normalized angle to ticks
    pub fn pulse(&self, angle: f32) -> u16 {
        normalized_to_pulse(angle, self.left_pulse, self.center_pulse(), self.right_pulse)
    }
}

impl Default for SteeringCalibration {
    fn default() -> Self {
        Self {
            channel: 1,
            left_pulse: 420,
            right_pulse: 360,
        }
    }
}

/// ESC throttle calibration (ticks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleCalibration {
    pub channel: u8,
    /// Ticks for full forward (+1.0)
    pub forward_pulse: u16,
    /// Ticks for stopped (0.0)
    pub stopped_pulse: u16,
    /// Ticks for full reverse (-1.0)
    pub reverse_pulse: u16,
}

impl ThrottleCalibration {
    /// Convert a normalized throttle to ticks
    pub fn pulse(&self, throttle: f32) -> u16 {
        normalized_to_pulse(
            throttle,
            self.reverse_pulse,
            self.stopped_pulse,
            self.forward_pulse,
        )
    }
}

impl Default for ThrottleCalibration {
    fn default() -> Self {
        Self {
            channel: 0,
            forward_pulse: 400,
            stopped_pulse: 360,
            reverse_pulse: 310,
        }
    }
}

/// Convert a normalized value to a pulse
///
/// # Arguments
///
/// * `normalized` - Normalized value (-1.0 to +1.0), clamped
/// * `negative` - Pulse at -1.0
/// * `neutral` - Pulse at 0.0
/// * `positive` - Pulse at +1.0
///
/// Negative values interpolate between `neutral` and `negative`, positive
/// values between `neutral` and `positive`. NaN maps to `neutral`.
pub fn normalized_to_pulse(normalized: f32, negative: u16, neutral: u16, positive: u16) -> u16 {
    if normalized.is_nan() {
        return neutral;
    }
    let clamped = normalized.clamp(-1.0, 1.0);
    let end = if clamped < 0.0 { negative } else { positive };
    let span = end as f32 - neutral as f32;
    let pulse = neutral as f32 + span * abs(clamped);
    round(pulse) as u16
}

/// Convert board ticks to duty cycle (0.0 to 1.0)
pub fn ticks_to_duty_cycle(ticks: u16) -> f32 {
    ticks.min(PWM_RESOLUTION) as f32 / PWM_RESOLUTION as f32
}

/// Convert board ticks to pulse width in microseconds
///
/// At 60 Hz one period is 16 667 us, so 360 ticks ≈ 1465 us.
pub fn ticks_to_pulse_us(ticks: u16, frequency_hz: u32) -> u32 {
    if frequency_hz == 0 {
        return 0;
    }
    let period_us = 1_000_000.0 / frequency_hz as f32;
    round(ticks_to_duty_cycle(ticks) * period_us) as u32
}

// core has no f32::abs/round without std
#[inline]
fn abs(v: f32) -> f32 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}

#[inline]
fn round(v: f32) -> f32 {
    (v + 0.5) as i32 as f32
}
