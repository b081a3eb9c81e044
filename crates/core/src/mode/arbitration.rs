//! Run-condition gate and control arbitration
//!
//! Both functions are total: every mode maps to exactly one outcome and
//! neither can fail.

use super::DriveMode;

/// Steering angle and throttle pair, both normalized to -1.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlSample {
    /// Steering (-1.0 full left, +1.0 full right)
    pub angle: f32,
    /// Throttle (-1.0 full reverse, +1.0 full forward)
    pub throttle: f32,
}

impl ControlSample {
    /// Centered steering, stopped throttle
    pub const NEUTRAL: ControlSample = ControlSample {
        angle: 0.0,
        throttle: 0.0,
    };

    pub const fn new(angle: f32, throttle: f32) -> Self {
        Self { angle, throttle }
    }
}

/// Whether the pilot model should run this tick.
///
/// The pilot is skipped while the operator has full manual control.
#[inline]
pub const fn pilot_enabled(mode: DriveMode) -> bool {
    !matches!(mode, DriveMode::User)
}

/// Select the control sample forwarded to the actuators.
///
/// - `User`: operator angle and throttle
/// - `LocalAngle`: pilot angle, operator throttle
/// - `LocalPilot`: pilot angle and throttle
#[inline]
pub fn arbitrate(mode: DriveMode, user: ControlSample, pilot: ControlSample) -> ControlSample {
    match mode {
        DriveMode::User => user,
        DriveMode::LocalAngle => ControlSample {
            angle: pilot.angle,
            throttle: user.throttle,
        },
        DriveMode::LocalPilot => pilot,
    }
}
