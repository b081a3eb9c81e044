//! Camera part
//!
//! The camera runs as a threaded part: a background task pulls frames from
//! a [`FrameSource`] at the configured framerate and publishes the latest
//! one on a watch channel. Each tick reads whatever frame is newest, so a
//! slow sensor never stalls the drive loop.
//!
//! Sensor drivers stay behind [`FrameSource`]. [`SyntheticFrames`] renders
//! a moving gradient with noise for bench runs and tests.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PartError;
use crate::memory::{Image, Value};
use crate::vehicle::Part;

/// Source of camera frames.
pub trait FrameSource: Send + 'static {
    /// Capture the next frame.
    fn capture(&mut self) -> Result<Image, PartError>;
}

/// Configuration for the synthetic frame source.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    /// Max per-pixel noise amplitude.
    pub noise: u8,
    /// RNG seed for deterministic frames. None = random.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            channels: 3,
            noise: 8,
            seed: None,
        }
    }
}

/// Frame source rendering a horizontally scrolling gradient.
pub struct SyntheticFrames {
    config: SyntheticConfig,
    rng: StdRng,
    frame: u32,
}

impl SyntheticFrames {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            frame: 0,
        }
    }
}

impl FrameSource for SyntheticFrames {
    fn capture(&mut self) -> Result<Image, PartError> {
        let SyntheticConfig {
            width,
            height,
            channels,
            noise,
            ..
        } = self.config;
        let mut data = Vec::with_capacity(width as usize * height as usize * channels as usize);
        for _y in 0..height {
            for x in 0..width {
                let base = ((x + self.frame) % width.max(1)) * 255 / width.max(1);
                for _ in 0..channels {
                    let jitter = if noise == 0 {
                        0
                    } else {
                        self.rng.gen_range(0..=noise as u32)
                    };
                    data.push((base + jitter).min(255) as u8);
                }
            }
        }
        self.frame = self.frame.wrapping_add(1);
        Image::new(width, height, channels, data)
            .ok_or_else(|| PartError::Background("synthetic frame has invalid size".into()))
    }
}

/// Threaded camera part publishing `cam/image_array`.
pub struct Camera<S: FrameSource> {
    source: Option<S>,
    framerate: u32,
    latest: watch::Receiver<Option<Image>>,
    sender: Option<watch::Sender<Option<Image>>>,
    task: Option<JoinHandle<()>>,
}

impl<S: FrameSource> Camera<S> {
    pub fn new(source: S, framerate: u32) -> Self {
        let (sender, latest) = watch::channel(None);
        Self {
            source: Some(source),
            framerate: framerate.max(1),
            latest,
            sender: Some(sender),
            task: None,
        }
    }
}

#[async_trait]
impl<S: FrameSource> Part for Camera<S> {
    fn name(&self) -> &str {
        "camera"
    }

    async fn start(&mut self) -> Result<(), PartError> {
        let (Some(mut source), Some(sender)) = (self.source.take(), self.sender.take()) else {
            return Err(PartError::Background("camera already started".into()));
        };
        let period = Duration::from_micros(1_000_000 / self.framerate as u64);
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match source.capture() {
                    Ok(frame) => {
                        if sender.send(Some(frame)).is_err() {
                            debug!("Camera receiver dropped, stopping capture");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Frame capture failed"),
                }
            }
        }));
        Ok(())
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        let frame = self.latest.borrow().clone();
        Ok(vec![frame.map(Value::Image).unwrap_or(Value::Null)])
    }

    async fn shutdown(&mut self) -> Result<(), PartError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}
