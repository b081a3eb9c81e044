use async_trait::async_trait;

use crate::error::PartError;
use crate::memory::Value;

/// A unit of work the drive loop runs once per tick.
///
/// Implementations must be `Send` so the loop can hold them as
/// `Box<dyn Part>` on a multi-threaded runtime.
///
/// # Lifecycle
///
/// 1. `start()` - once before the first tick, only for threaded parts;
///    spawns the background task that produces values
/// 2. `run(inputs)` - every tick the run condition allows
/// 3. `shutdown()` - once when the loop stops
#[async_trait]
pub trait Part: Send {
    /// Name used in logs and statistics.
    fn name(&self) -> &str;

    /// Start background work.
    async fn start(&mut self) -> Result<(), PartError> {
        Ok(())
    }

    /// Consume this tick's inputs and return one value per output channel.
    ///
    /// Threaded parts return their latest background value without
    /// blocking.
    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError>;

    /// Release hardware and stop background work.
    async fn shutdown(&mut self) -> Result<(), PartError> {
        Ok(())
    }
}

/// How a part is connected to vehicle memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wiring {
    /// Channels read before `run`, in argument order.
    pub inputs: Vec<String>,
    /// Channels written with the values `run` returns.
    pub outputs: Vec<String>,
    /// Channel that must hold `Bool(true)` for the part to run.
    pub run_condition: Option<String>,
    /// Part produces values from a background task.
    pub threaded: bool,
}

impl Wiring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs<S: AsRef<str>>(mut self, inputs: &[S]) -> Self {
        self.inputs = inputs.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn outputs<S: AsRef<str>>(mut self, outputs: &[S]) -> Self {
        self.outputs = outputs.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn run_condition(mut self, channel: &str) -> Self {
        self.run_condition = Some(channel.to_string());
        self
    }

    pub fn threaded(mut self) -> Self {
        self.threaded = true;
        self
    }
}

/// Check the input count a part was wired with.
pub fn expect_inputs(inputs: &[Value], expected: usize) -> Result<(), PartError> {
    if inputs.len() != expected {
        return Err(PartError::InputCount {
            expected,
            actual: inputs.len(),
        });
    }
    Ok(())
}
