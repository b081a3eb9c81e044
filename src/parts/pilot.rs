//! Pilot part and the linear steering/throttle model
//!
//! The pilot turns the latest camera frame into a control sample. Models
//! sit behind [`PilotModel`]; [`LinearPilot`] is the built-in one: the frame
//! is reduced to a coarse grid of mean intensities and each output is a
//! `tanh` of a weighted sum of those cells.
//!
//! Models are stored as JSON.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use donkey_car_core::mode::ControlSample;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModelError, PartError};
use crate::memory::{Image, Value};
use crate::vehicle::{expect_inputs, Part};

/// Grid the frame is reduced to before prediction (columns, rows).
pub const DEFAULT_GRID: (u32, u32) = (8, 8);

/// Steering/throttle predictor.
pub trait PilotModel: Send {
    fn predict(&self, image: &Image) -> ControlSample;
}

/// Mean intensity of each grid cell, scaled to -0.5..=0.5, row-major.
pub fn extract_features(image: &Image, grid: (u32, u32)) -> Vec<f32> {
    let (cols, rows) = grid;
    let mut features = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        let y0 = row * image.height / rows;
        let y1 = ((row + 1) * image.height / rows).max(y0 + 1).min(image.height);
        for col in 0..cols {
            let x0 = col * image.width / cols;
            let x1 = ((col + 1) * image.width / cols).max(x0 + 1).min(image.width);
            let mut sum = 0u64;
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += image.intensity(x, y) as u64;
                    count += 1;
                }
            }
            let mean = if count == 0 { 0.0 } else { sum as f32 / count as f32 };
            features.push(mean / 255.0 - 0.5);
        }
    }
    features
}

/// One linear output head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHead {
    pub weights: Vec<f32>,
    pub bias: f32,
}

impl LinearHead {
    pub fn zeros(len: usize) -> Self {
        Self {
            weights: vec![0.0; len],
            bias: 0.0,
        }
    }

    /// Weighted sum before the activation.
    pub fn linear(&self, features: &[f32]) -> f32 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias
    }

    pub fn output(&self, features: &[f32]) -> f32 {
        self.linear(features).tanh()
    }
}

/// Linear model over grid intensity features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPilot {
    pub grid: (u32, u32),
    pub angle: LinearHead,
    pub throttle: LinearHead,
}

impl LinearPilot {
    /// Untrained model: always predicts neutral.
    pub fn new(grid: (u32, u32)) -> Self {
        let len = (grid.0 * grid.1) as usize;
        Self {
            grid,
            angle: LinearHead::zeros(len),
            throttle: LinearHead::zeros(len),
        }
    }

    pub fn feature_len(&self) -> usize {
        (self.grid.0 * self.grid.1) as usize
    }

    pub fn predict_features(&self, features: &[f32]) -> ControlSample {
        ControlSample::new(self.angle.output(features), self.throttle.output(features))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let model: LinearPilot = serde_json::from_str(&text).map_err(|source| ModelError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        model.check_shape()?;
        info!(path = %path.display(), grid = ?model.grid, "Loaded pilot model");
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(|source| ModelError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ModelError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| ModelError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn check_shape(&self) -> Result<(), ModelError> {
        let expected = self.feature_len();
        for head in [&self.angle, &self.throttle] {
            if head.weights.len() != expected {
                return Err(ModelError::Shape {
                    expected,
                    actual: head.weights.len(),
                });
            }
        }
        Ok(())
    }
}

impl Default for LinearPilot {
    fn default() -> Self {
        Self::new(DEFAULT_GRID)
    }
}

impl PilotModel for LinearPilot {
    fn predict(&self, image: &Image) -> ControlSample {
        self.predict_features(&extract_features(image, self.grid))
    }
}

/// Pilot part: `cam/image_array` → `pilot/angle`, `pilot/throttle`.
///
/// Without a frame (camera still warming up) it predicts neutral.
pub struct Pilot {
    model: Box<dyn PilotModel>,
}

impl Pilot {
    pub fn new(model: impl PilotModel + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }
}

#[async_trait]
impl Part for Pilot {
    fn name(&self) -> &str {
        "pilot"
    }

    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        expect_inputs(inputs, 1)?;
        let sample = match &inputs[0] {
            Value::Image(image) => self.model.predict(image),
            Value::Null => ControlSample::NEUTRAL,
            _ => return Err(PartError::InputType("cam/image_array")),
        };
        Ok(vec![Value::Float(sample.angle), Value::Float(sample.throttle)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_image() -> Image {
        // Left half black, right half white, 4x2 grayscale
        Image::new(4, 2, 1, vec![0, 0, 255, 255, 0, 0, 255, 255]).unwrap()
    }

    #[test]
    fn features_follow_grid() {
        let features = extract_features(&split_image(), (2, 1));
        assert_eq!(features, vec![-0.5, 0.5]);
    }

    #[test]
    fn features_handle_grid_larger_than_image() {
        let features = extract_features(&split_image(), (8, 8));
        assert_eq!(features.len(), 64);
        assert!(features.iter().all(|f| (-0.5..=0.5).contains(f)));
    }

    #[test]
    fn untrained_model_is_neutral() {
        let model = LinearPilot::default();
        assert_eq!(model.predict(&split_image()), ControlSample::NEUTRAL);
    }

    #[test]
    fn weights_steer_toward_bright_side() {
        let mut model = LinearPilot::new((2, 1));
        model.angle.weights = vec![-1.0, 1.0];
        model.throttle.bias = 0.5;
        let sample = model.predict(&split_image());
        assert!((sample.angle - 1.0f32.tanh()).abs() < 1e-6);
        assert!((sample.throttle - 0.5f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn save_and_load_model() {
        let dir = std::env::temp_dir().join(format!("donkey_pilot_{}", std::process::id()));
        let path = dir.join("model.json");
        let mut model = LinearPilot::new((2, 2));
        model.angle.weights = vec![0.1, 0.2, 0.3, 0.4];
        model.save(&path).unwrap();

        assert_eq!(LinearPilot::load(&path).unwrap(), model);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_rejects_wrong_shape() {
        let dir = std::env::temp_dir().join(format!("donkey_pilot_shape_{}", std::process::id()));
        let path = dir.join("model.json");
        let mut model = LinearPilot::new((2, 2));
        model.throttle.weights.pop();
        model.save(&path).unwrap();

        let err = LinearPilot::load(&path).unwrap_err();
        assert!(matches!(err, ModelError::Shape { expected: 4, actual: 3 }));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn pilot_part_outputs_prediction() {
        let mut model = LinearPilot::new((2, 1));
        model.angle.bias = 0.2;
        let mut pilot = Pilot::new(model);

        let out = pilot.run(&[Value::Image(split_image())]).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0].as_f32().unwrap() - 0.2f32.tanh()).abs() < 1e-6);

        let out = pilot.run(&[Value::Null]).await.unwrap();
        assert_eq!(out, vec![Value::Float(0.0), Value::Float(0.0)]);

        assert!(pilot.run(&[Value::Float(1.0)]).await.is_err());
    }
}
