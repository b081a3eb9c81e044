//! Drive mode selection and control arbitration
//!
//! The operator picks a drive mode on the controller. Each tick the mode
//! decides two things:
//!
//! - whether the pilot model runs at all ([`pilot_enabled`])
//! - which source drives steering and throttle ([`arbitrate`])
//!
//! # Modes
//!
//! | Mode          | Steering | Throttle | Pilot runs |
//! |---------------|----------|----------|------------|
//! | `user`        | operator | operator | no         |
//! | `local_angle` | pilot    | operator | yes        |
//! | `local`       | pilot    | pilot    | yes        |

mod arbitration;
mod drive_mode;

pub use arbitration::{arbitrate, pilot_enabled, ControlSample};
pub use drive_mode::{DriveMode, ParseModeError};
