//! Parts wired into the drive loop
//!
//! | Part | Inputs | Outputs | Threaded |
//! |------|--------|---------|----------|
//! | [`Timestamp`] | - | `timestamp` | no |
//! | [`Camera`] | - | `cam/image_array` | yes |
//! | [`ConsoleController`] | - | `user/angle`, `user/throttle`, `user/mode`, `recording` | yes |
//! | [`RunConditionGate`] | `user/mode` | `run_pilot` | no |
//! | [`Pilot`] | `cam/image_array` | `pilot/angle`, `pilot/throttle` | no |
//! | [`StateController`] | mode, user and pilot samples | `angle`, `throttle` | no |
//! | [`PwmActuator`] | `angle`, `throttle` | - | no |
//!
//! The tub writer lives in [`crate::tub`].

pub mod actuator;
pub mod camera;
pub mod clock;
pub mod controller;
pub mod pilot;
pub mod state;

pub use actuator::{PwmActuator, PwmOutput, SimPwm};
pub use camera::{Camera, FrameSource, SyntheticConfig, SyntheticFrames};
pub use clock::Timestamp;
pub use controller::{parse_command, Command, ConsoleController, ControllerState};
pub use pilot::{LinearPilot, Pilot, PilotModel};
pub use state::{RunConditionGate, StateController};
