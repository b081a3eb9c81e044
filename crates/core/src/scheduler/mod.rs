//! Drive loop timing types and statistics
//!
//! This module provides the bookkeeping for the fixed-rate drive loop
//! without any async runtime dependencies. The loop itself lives in the
//! runtime crate and feeds measurements into these types.
//!
//! # Example
//!
//! ```rust
//! use donkey_car_core::scheduler::{LoopTiming, PartStats};
//!
//! let timing = LoopTiming::new(20);
//! let mut stats = PartStats::default();
//! stats.update(1_200, timing.period_us(), timing.period_us(), timing.budget_us());
//!
//! assert_eq!(timing.period_us(), 50_000);
//! assert_eq!(stats.overruns, 0);
//! ```

pub mod types;

pub use types::*;
