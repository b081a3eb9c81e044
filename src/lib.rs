//! Drive loop and training driver for a small self-driving car
//!
//! A [`Vehicle`] runs a list of [`Part`]s at a fixed rate. Each part reads
//! named channels from vehicle [`Memory`](memory::Memory) and writes its
//! outputs back; threaded parts (camera, controller) produce values in a
//! background task and hand the latest one to the loop.
//!
//! The mode logic (who drives: operator or pilot) is pure and lives in
//! `donkey_car_core`.

pub mod config;
pub mod drive;
pub mod error;
pub mod logging;
pub mod memory;
pub mod parts;
pub mod train;
pub mod tub;
pub mod vehicle;

pub use config::CarConfig;
pub use error::{ConfigError, ModelError, PartError, TrainError, TubError, VehicleError};
pub use memory::{Image, Value};
pub use vehicle::{Part, RunSummary, StopReason, Vehicle, Wiring};
