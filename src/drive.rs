//! Standard drive pipeline
//!
//! ```text
//! timestamp → camera → controller → pilot_condition → pilot (run_pilot)
//!   → state_controller → actuator → tub_writer (recording)
//! ```
//!
//! The camera source, controller input and PWM board are passed in so the
//! same wiring runs on the bench (synthetic frames, console input,
//! [`SimPwm`]) and in tests.

use tokio::io::AsyncBufRead;

use crate::config::CarConfig;
use crate::error::TubError;
use crate::parts::{
    Camera, ConsoleController, FrameSource, Pilot, PilotModel, PwmActuator, PwmOutput, RunConditionGate,
    StateController, Timestamp,
};
use crate::tub::TubWriter;
use crate::vehicle::{Vehicle, Wiring};

/// Channels recorded by the tub writer and their types.
pub const RECORDED_INPUTS: [&str; 5] = ["cam/image_array", "user/angle", "user/throttle", "user/mode", "timestamp"];
pub const RECORDED_TYPES: [&str; 5] = ["image_array", "float", "float", "str", "str"];

/// Wire the full drive pipeline for `config`.
pub fn assemble<S, R, O>(
    config: &CarConfig,
    frames: S,
    commands: R,
    model: impl PilotModel + 'static,
    pwm: O,
) -> Result<Vehicle, TubError>
where
    S: FrameSource,
    R: AsyncBufRead + Unpin + Send + 'static,
    O: PwmOutput + 'static,
{
    let mut v = Vehicle::new();

    v.add(Timestamp::new(), Wiring::new().outputs(&["timestamp"]));

    v.add(
        Camera::new(frames, config.camera.framerate),
        Wiring::new().outputs(&["cam/image_array"]).threaded(),
    );

    v.add(
        ConsoleController::new(commands, config.default_mode),
        Wiring::new()
            .outputs(&["user/angle", "user/throttle", "user/mode", "recording"])
            .threaded(),
    );

    v.add(
        RunConditionGate::new(),
        Wiring::new().inputs(&["user/mode"]).outputs(&["run_pilot"]),
    );

    v.add(
        Pilot::new(model),
        Wiring::new()
            .inputs(&["cam/image_array"])
            .outputs(&["pilot/angle", "pilot/throttle"])
            .run_condition("run_pilot"),
    );

    v.add(
        StateController::new(),
        Wiring::new()
            .inputs(&["user/mode", "user/angle", "user/throttle", "pilot/angle", "pilot/throttle"])
            .outputs(&["angle", "throttle"]),
    );

    v.add(
        PwmActuator::new(pwm, config.steering_calibration(), config.throttle_calibration()),
        Wiring::new().inputs(&["angle", "throttle"]),
    );

    let tub = TubWriter::new(&config.tub_path, &RECORDED_INPUTS, &RECORDED_TYPES)?;
    v.add(
        tub,
        Wiring::new().inputs(&RECORDED_INPUTS).run_condition("recording"),
    );

    Ok(v)
}
