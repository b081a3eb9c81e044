//! donkey_car_core - Pure no_std control logic for the donkey car drive loop
//!
//! This crate contains the platform-agnostic decisions made on every tick
//! of the drive loop. It can be tested on host without hardware, an async
//! runtime or any feature flags.
//!
//! # Design Principles
//!
//! - **Zero cfg**: No `#[cfg(feature = ...)]` directives
//! - **Pure no_std**: No std library dependencies outside tests
//! - **Trait abstractions**: Hardware outputs injected via traits
//!
//! # Modules
//!
//! - [`mode`]: Drive mode, run-condition gate and control arbitration
//! - [`servo`]: Steering/throttle calibration and PWM tick conversion
//! - [`scheduler`]: Loop timing and per-part execution statistics

#![cfg_attr(not(test), no_std)]

pub mod mode;
pub mod scheduler;
pub mod servo;
