//! Operator controller part
//!
//! Reads line commands from any async reader (stdin on the car, a byte
//! slice in tests) on a background task and publishes the operator state:
//!
//! | Command                      | Effect                              |
//! |------------------------------|-------------------------------------|
//! | `angle F` / `a F`            | steering, clamped to -1.0..=1.0     |
//! | `throttle F` / `t F`         | throttle, clamped to -1.0..=1.0     |
//! | `center` / `c`               | steering 0.0                        |
//! | `mode [LABEL]` / `m [LABEL]` | set mode, or cycle when no label    |
//! | `record [on\|off\|toggle]` / `r` | recording switch (toggle default) |
//! | `stop` / `s`                 | throttle 0.0, back to `user` mode   |
//!
//! Outputs: `user/angle`, `user/throttle`, `user/mode`, `recording`.

use async_trait::async_trait;
use donkey_car_core::mode::{DriveMode, ParseModeError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PartError;
use crate::memory::Value;
use crate::vehicle::Part;

/// Operator control state published every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub angle: f32,
    pub throttle: f32,
    pub mode: DriveMode,
    pub recording: bool,
}

impl ControllerState {
    pub fn new(mode: DriveMode) -> Self {
        Self {
            angle: 0.0,
            throttle: 0.0,
            mode,
            recording: false,
        }
    }

    /// Apply one command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Angle(v) => self.angle = v.clamp(-1.0, 1.0),
            Command::Throttle(v) => self.throttle = v.clamp(-1.0, 1.0),
            Command::Center => self.angle = 0.0,
            Command::Mode(Some(mode)) => self.mode = mode,
            Command::Mode(None) => self.mode = self.mode.next(),
            Command::Record(Switch::On) => self.recording = true,
            Command::Record(Switch::Off) => self.recording = false,
            Command::Record(Switch::Toggle) => self.recording = !self.recording,
            Command::Stop => {
                self.throttle = 0.0;
                self.mode = DriveMode::User;
            }
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(DriveMode::User)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
    Toggle,
}

/// Parsed operator command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Angle(f32),
    Throttle(f32),
    Center,
    Mode(Option<DriveMode>),
    Record(Switch),
    Stop,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command `{0}`")]
    Unknown(String),

    #[error("`{0}` needs a numeric argument")]
    MissingNumber(&'static str),

    #[error("Invalid number `{0}`")]
    InvalidNumber(String),

    #[error("{0}: `{1}`")]
    InvalidMode(ParseModeError, String),

    #[error("Invalid record switch `{0}` (expected on, off or toggle)")]
    InvalidSwitch(String),
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let arg = words.next();

    let number = |name: &'static str| -> Result<f32, CommandError> {
        let text = arg.ok_or(CommandError::MissingNumber(name))?;
        let value: f32 = text
            .parse()
            .map_err(|_| CommandError::InvalidNumber(text.to_string()))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(CommandError::InvalidNumber(text.to_string()))
        }
    };

    let command = match verb {
        "angle" | "a" => Command::Angle(number("angle")?),
        "throttle" | "t" => Command::Throttle(number("throttle")?),
        "center" | "c" => Command::Center,
        "mode" | "m" => match arg {
            None => Command::Mode(None),
            Some(label) => Command::Mode(Some(
                label
                    .parse()
                    .map_err(|e| CommandError::InvalidMode(e, label.to_string()))?,
            )),
        },
        "record" | "r" => Command::Record(match arg {
            None | Some("toggle") => Switch::Toggle,
            Some("on") => Switch::On,
            Some("off") => Switch::Off,
            Some(other) => return Err(CommandError::InvalidSwitch(other.to_string())),
        }),
        "stop" | "s" => Command::Stop,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Threaded controller part reading commands from `R`.
pub struct ConsoleController<R> {
    reader: Option<R>,
    sender: Option<watch::Sender<ControllerState>>,
    state: watch::Receiver<ControllerState>,
    task: Option<JoinHandle<()>>,
}

impl<R> ConsoleController<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, initial_mode: DriveMode) -> Self {
        let (sender, state) = watch::channel(ControllerState::new(initial_mode));
        Self {
            reader: Some(reader),
            sender: Some(sender),
            state,
            task: None,
        }
    }

    /// Current operator state.
    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }
}

async fn read_commands<R>(reader: R, sender: watch::Sender<ControllerState>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Ok(Some(command)) => {
                    let before = *sender.borrow();
                    sender.send_modify(|state| state.apply(command));
                    let after = *sender.borrow();
                    if before.mode != after.mode {
                        info!(from = %before.mode, to = %after.mode, "Drive mode changed");
                    }
                    if before.recording != after.recording {
                        info!(recording = after.recording, "Recording switched");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ignoring controller input"),
            },
            Ok(None) => {
                debug!("Controller input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Controller input failed");
                break;
            }
        }
    }
}

#[async_trait]
impl<R> Part for ConsoleController<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        "controller"
    }

    async fn start(&mut self) -> Result<(), PartError> {
        let (Some(reader), Some(sender)) = (self.reader.take(), self.sender.take()) else {
            return Err(PartError::Background("controller already started".into()));
        };
        self.task = Some(tokio::spawn(read_commands(reader, sender)));
        Ok(())
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        let state = self.state();
        Ok(vec![
            Value::Float(state.angle),
            Value::Float(state.throttle),
            Value::Str(state.mode.label().to_string()),
            Value::Bool(state.recording),
        ])
    }

    async fn shutdown(&mut self) -> Result<(), PartError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::BufReader;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("angle 0.5"), Ok(Some(Command::Angle(0.5))));
        assert_eq!(parse_command(" t -0.25 "), Ok(Some(Command::Throttle(-0.25))));
        assert_eq!(parse_command("c"), Ok(Some(Command::Center)));
        assert_eq!(
            parse_command("mode local_angle"),
            Ok(Some(Command::Mode(Some(DriveMode::LocalAngle))))
        );
        assert_eq!(parse_command("m"), Ok(Some(Command::Mode(None))));
        assert_eq!(parse_command("record on"), Ok(Some(Command::Record(Switch::On))));
        assert_eq!(parse_command("r"), Ok(Some(Command::Record(Switch::Toggle))));
        assert_eq!(parse_command("stop"), Ok(Some(Command::Stop)));
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("# comment"), Ok(None));
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(matches!(parse_command("fly"), Err(CommandError::Unknown(_))));
        assert_eq!(parse_command("angle"), Err(CommandError::MissingNumber("angle")));
        assert!(matches!(parse_command("t fast"), Err(CommandError::InvalidNumber(_))));
        assert!(matches!(parse_command("t NaN"), Err(CommandError::InvalidNumber(_))));
        assert!(matches!(parse_command("mode autopilot"), Err(CommandError::InvalidMode(..))));
        assert!(matches!(parse_command("record maybe"), Err(CommandError::InvalidSwitch(_))));
    }

    #[test]
    fn apply_clamps_and_stops() {
        let mut state = ControllerState::default();
        state.apply(Command::Angle(3.0));
        state.apply(Command::Throttle(-2.0));
        assert_eq!(state.angle, 1.0);
        assert_eq!(state.throttle, -1.0);

        state.apply(Command::Mode(None));
        assert_eq!(state.mode, DriveMode::LocalAngle);

        state.apply(Command::Stop);
        assert_eq!(state.throttle, 0.0);
        assert_eq!(state.mode, DriveMode::User);
        assert_eq!(state.angle, 1.0);

        state.apply(Command::Record(Switch::Toggle));
        assert!(state.recording);
        state.apply(Command::Record(Switch::Off));
        assert!(!state.recording);
    }

    #[tokio::test]
    async fn publishes_initial_state_before_start() {
        let reader = BufReader::new(&b""[..]);
        let mut controller = ConsoleController::new(reader, DriveMode::LocalAngle);
        let out = controller.run(&[]).await.unwrap();
        assert_eq!(
            out,
            vec![
                Value::Float(0.0),
                Value::Float(0.0),
                Value::Str("local_angle".into()),
                Value::Bool(false),
            ]
        );
    }

    #[tokio::test]
    async fn applies_commands_from_reader() {
        let input: &'static [u8] = b"angle 0.3\nthrottle 0.6\nbogus\nmode local\nrecord on\n";
        let mut controller = ConsoleController::new(BufReader::new(input), DriveMode::User);
        controller.start().await.unwrap();

        for _ in 0..50 {
            if controller.state().recording {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let state = controller.state();
        controller.shutdown().await.unwrap();

        assert_eq!(state.angle, 0.3);
        assert_eq!(state.throttle, 0.6);
        assert_eq!(state.mode, DriveMode::LocalPilot);
        assert!(state.recording);
    }
}
