//! Steering servo and ESC output
//!
//! [`PwmActuator`] implements the core [`ActuatorInterface`] on top of any
//! [`PwmOutput`] (a 12-bit PWM board). As a part it consumes `angle` and
//! `throttle` and writes the calibrated tick values every tick.
//!
//! ## Safety
//!
//! - Missing inputs drive neutral
//! - Non-finite commands drive neutral and log a warning
//! - `shutdown` centers steering and stops the throttle

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use donkey_car_core::servo::{
    ticks_to_duty_cycle, ticks_to_pulse_us, ActuatorError, ActuatorInterface, SteeringCalibration,
    ThrottleCalibration, MAX_TICKS,
};
use tracing::{info, warn};

use crate::error::PartError;
use crate::memory::Value;
use crate::vehicle::{expect_inputs, Part};

/// A PWM board with addressable channels.
pub trait PwmOutput: Send {
    /// Write the on-time of `channel` in board ticks.
    fn set_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), ActuatorError>;
}

/// In-memory PWM board.
///
/// Clones share the same channel table, so a test or the bench runner can
/// keep a handle while the actuator owns another.
#[derive(Debug, Clone)]
pub struct SimPwm {
    frequency_hz: u32,
    channels: Arc<Mutex<HashMap<u8, u16>>>,
}

impl SimPwm {
    pub fn new(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Last ticks written to `channel`.
    pub fn ticks(&self, channel: u8) -> Option<u16> {
        self.channels.lock().ok()?.get(&channel).copied()
    }

    /// Duty cycle of `channel` (0.0 to 1.0).
    pub fn duty_cycle(&self, channel: u8) -> Option<f32> {
        self.ticks(channel).map(ticks_to_duty_cycle)
    }

    /// Pulse width of `channel` in microseconds.
    pub fn pulse_us(&self, channel: u8) -> Option<u32> {
        self.ticks(channel)
            .map(|t| ticks_to_pulse_us(t, self.frequency_hz))
    }

    pub fn frequency(&self) -> u32 {
        self.frequency_hz
    }
}

impl PwmOutput for SimPwm {
    fn set_ticks(&mut self, channel: u8, ticks: u16) -> Result<(), ActuatorError> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| ActuatorError::OutputFailed { channel })?;
        channels.insert(channel, ticks.min(MAX_TICKS));
        Ok(())
    }
}

/// Steering servo plus ESC on one PWM board.
pub struct PwmActuator<O: PwmOutput> {
    output: O,
    steering_cal: SteeringCalibration,
    throttle_cal: ThrottleCalibration,
    steering: f32,
    throttle: f32,
}

impl<O: PwmOutput> PwmActuator<O> {
    pub fn new(output: O, steering_cal: SteeringCalibration, throttle_cal: ThrottleCalibration) -> Self {
        info!(
            steering_channel = steering_cal.channel,
            throttle_channel = throttle_cal.channel,
            "PWM actuator ready"
        );
        Self {
            output,
            steering_cal,
            throttle_cal,
            steering: 0.0,
            throttle: 0.0,
        }
    }
}

impl<O: PwmOutput> ActuatorInterface for PwmActuator<O> {
    fn set_steering(&mut self, normalized: f32) -> Result<(), ActuatorError> {
        if !normalized.is_finite() {
            return Err(ActuatorError::NotFinite);
        }
        let value = normalized.clamp(-1.0, 1.0);
        self.output
            .set_ticks(self.steering_cal.channel, self.steering_cal.pulse(value))?;
        self.steering = value;
        Ok(())
    }

    fn set_throttle(&mut self, normalized: f32) -> Result<(), ActuatorError> {
        if !normalized.is_finite() {
            return Err(ActuatorError::NotFinite);
        }
        let value = normalized.clamp(-1.0, 1.0);
        self.output
            .set_ticks(self.throttle_cal.channel, self.throttle_cal.pulse(value))?;
        self.throttle = value;
        Ok(())
    }

    fn steering(&self) -> f32 {
        self.steering
    }

    fn throttle(&self) -> f32 {
        self.throttle
    }
}

fn command(value: &Value, name: &'static str) -> Result<f32, PartError> {
    match value {
        Value::Null => Ok(0.0),
        other => other.as_f32().ok_or(PartError::InputType(name)),
    }
}

#[async_trait]
impl<O: PwmOutput> Part for PwmActuator<O> {
    fn name(&self) -> &str {
        "actuator"
    }

    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        expect_inputs(inputs, 2)?;
        let angle = command(&inputs[0], "angle")?;
        let throttle = command(&inputs[1], "throttle")?;

        let result = self
            .set_steering(angle)
            .and_then(|_| self.set_throttle(throttle));
        match result {
            Err(ActuatorError::NotFinite) => {
                warn!(angle, throttle, "Non-finite actuator command, driving neutral");
                self.set_neutral()?;
            }
            other => other?,
        }
        Ok(Vec::new())
    }

    async fn shutdown(&mut self) -> Result<(), PartError> {
        self.set_neutral()?;
        info!("Actuators set to neutral");
        Ok(())
    }
}
