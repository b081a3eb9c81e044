//! Mode-driven parts: the pilot run-condition gate and the state controller
//!
//! Both wrap the pure functions in `donkey_car_core::mode`. The mode arrives
//! as the label string the controller publishes; labels other than `user`
//! and `local_angle` mean full autonomy.

use async_trait::async_trait;
use donkey_car_core::mode::{arbitrate, pilot_enabled, ControlSample, DriveMode};
use tracing::info;

use crate::error::PartError;
use crate::memory::Value;
use crate::vehicle::{expect_inputs, Part};

fn mode_input(value: &Value) -> Result<DriveMode, PartError> {
    match value {
        Value::Str(label) => Ok(DriveMode::from_label(label)),
        // Only the exact label `user` is manual; a missing mode is not
        Value::Null => Ok(DriveMode::from_label("")),
        _ => Err(PartError::InputType("user/mode")),
    }
}

fn float_input(value: &Value, name: &'static str) -> Result<f32, PartError> {
    match value {
        Value::Null => Ok(0.0),
        other => other.as_f32().ok_or(PartError::InputType(name)),
    }
}

/// `user/mode` → `run_pilot`
#[derive(Debug, Default)]
pub struct RunConditionGate;

impl RunConditionGate {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Part for RunConditionGate {
    fn name(&self) -> &str {
        "pilot_condition"
    }

    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        expect_inputs(inputs, 1)?;
        let mode = mode_input(&inputs[0])?;
        Ok(vec![Value::Bool(pilot_enabled(mode))])
    }
}

/// `user/mode`, `user/angle`, `user/throttle`, `pilot/angle`,
/// `pilot/throttle` → `angle`, `throttle`
///
/// Missing samples (pilot skipped, controller not started) count as
/// neutral.
#[derive(Debug, Default)]
pub struct StateController {
    last_mode: Option<DriveMode>,
}

impl StateController {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Part for StateController {
    fn name(&self) -> &str {
        "state_controller"
    }

    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        expect_inputs(inputs, 5)?;
        let mode = mode_input(&inputs[0])?;
        let user = ControlSample::new(
            float_input(&inputs[1], "user/angle")?,
            float_input(&inputs[2], "user/throttle")?,
        );
        let pilot = ControlSample::new(
            float_input(&inputs[3], "pilot/angle")?,
            float_input(&inputs[4], "pilot/throttle")?,
        );

        if self.last_mode != Some(mode) {
            info!(mode = %mode, "Actuators now follow mode");
            self.last_mode = Some(mode);
        }

        let out = arbitrate(mode, user, pilot);
        Ok(vec![Value::Float(out.angle), Value::Float(out.throttle)])
    }
}
