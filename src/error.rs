use std::path::PathBuf;

use donkey_car_core::servo::ActuatorError;

/// Errors raised while loading or validating the car configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised by a part while it runs.
#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("Expected {expected} inputs, got {actual}")]
    InputCount { expected: usize, actual: usize },

    #[error("Input `{0}` has the wrong type")]
    InputType(&'static str),

    #[error("Background task failed: {0}")]
    Background(String),

    #[error("Actuator error: {0}")]
    Actuator(ActuatorError),

    #[error(transparent)]
    Tub(#[from] TubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ActuatorError> for PartError {
    fn from(e: ActuatorError) -> Self {
        PartError::Actuator(e)
    }
}

/// Errors raised by the drive loop.
#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("Part `{part}` failed: {source}")]
    Part {
        part: String,
        #[source]
        source: PartError,
    },

    #[error("Part `{part}` returned {actual} outputs for {expected} channels")]
    OutputMismatch {
        part: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid loop rate: {0} Hz")]
    InvalidRate(u32),

    #[error("Vehicle has no parts")]
    NoParts,
}

/// Errors raised while reading or writing recordings.
#[derive(Debug, thiserror::Error)]
pub enum TubError {
    #[error("Tub not found: {0}")]
    NotFound(PathBuf),

    #[error("Unknown channel type `{0}`")]
    UnknownType(String),

    #[error("Tub declares {inputs} inputs but {types} types")]
    MetaMismatch { inputs: usize, types: usize },

    #[error("Existing tub {0} was recorded with different channels")]
    IncompatibleMeta(PathBuf),

    #[error("Expected {expected} values per record, got {actual}")]
    RecordLength { expected: usize, actual: usize },

    #[error("Value for `{key}` does not match declared type `{expected}`")]
    TypeMismatch { key: String, expected: String },

    #[error("Malformed image {path}: {reason}")]
    Image { path: PathBuf, reason: String },

    #[error("Image codec error in {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Record {index} is missing `{key}`")]
    MissingKey { index: usize, key: String },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the training driver.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("No tubs given")]
    NoTubs,

    #[error("Not enough records: {train} training records for batch size {batch_size}")]
    NotEnoughRecords { train: usize, batch_size: usize },

    #[error("Invalid training option `{field}`: {reason}")]
    InvalidOption { field: &'static str, reason: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Tub(#[from] TubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading or saving a pilot model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write model {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Model expects {expected} weights per head, found {actual}")]
    Shape { expected: usize, actual: usize },
}
