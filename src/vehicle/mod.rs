//! Fixed-rate drive loop
//!
//! [`Vehicle`] owns the parts, their wiring and the shared [`Memory`]. Each
//! tick runs every part once in declaration order:
//!
//! 1. skip the part if its run-condition channel is not `Bool(true)`
//! 2. read its input channels
//! 3. `run` it and write the returned values to its output channels
//!
//! Threaded parts (camera, controller) are started before the first tick
//! and publish their latest value from a background task, so a tick never
//! waits on hardware. A part error ends the loop; every part is shut down
//! on the way out so actuators return to neutral.

pub mod part;

use std::time::{Duration, Instant};

use donkey_car_core::scheduler::{LoopStats, LoopTiming, PartStats};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub use part::{expect_inputs, Part, Wiring};

use crate::error::VehicleError;
use crate::memory::Memory;

struct PartEntry {
    part: Box<dyn Part>,
    wiring: Wiring,
    stats: PartStats,
    last_run: Option<Instant>,
}

/// Why the drive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_loop_count` ticks completed
    LoopCountReached,
    /// Ctrl-C
    Interrupted,
}

/// Outcome of a finished drive loop.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub ticks: u64,
    pub reason: StopReason,
    pub stats: LoopStats,
}

/// Part pipeline driven at a fixed rate.
pub struct Vehicle {
    parts: Vec<PartEntry>,
    memory: Memory,
    timing: LoopTiming,
    loop_stats: LoopStats,
}

impl Vehicle {
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            memory: Memory::new(),
            timing: LoopTiming::new(20),
            loop_stats: LoopStats::default(),
        }
    }

    /// Append a part; parts run in the order they are added.
    pub fn add(&mut self, part: impl Part + 'static, wiring: Wiring) {
        info!(
            part = part.name(),
            inputs = ?wiring.inputs,
            outputs = ?wiring.outputs,
            run_condition = ?wiring.run_condition,
            threaded = wiring.threaded,
            "Adding part"
        );
        self.parts.push(PartEntry {
            part: Box::new(part),
            wiring,
            stats: PartStats::default(),
            last_run: None,
        });
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Part names in run order.
    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(|e| e.part.name()).collect()
    }

    pub fn part_stats(&self, name: &str) -> Option<&PartStats> {
        self.parts
            .iter()
            .find(|e| e.part.name() == name)
            .map(|e| &e.stats)
    }

    pub fn loop_stats(&self) -> &LoopStats {
        &self.loop_stats
    }

    /// Start threaded parts and run the loop until `max_loop_count` ticks,
    /// Ctrl-C, or a part error. Parts are shut down in every case.
    pub async fn start(
        &mut self,
        rate_hz: u32,
        max_loop_count: Option<u64>,
    ) -> Result<RunSummary, VehicleError> {
        if rate_hz == 0 || rate_hz > LoopTiming::MAX_RATE_HZ {
            return Err(VehicleError::InvalidRate(rate_hz));
        }
        if self.parts.is_empty() {
            return Err(VehicleError::NoParts);
        }
        self.timing = LoopTiming::new(rate_hz);

        let result = match self.start_threaded_parts().await {
            Ok(()) => self.drive(max_loop_count).await,
            Err(e) => Err(e),
        };
        self.stop().await;

        match &result {
            Ok(summary) => info!(ticks = summary.ticks, reason = ?summary.reason, "Drive loop finished"),
            Err(e) => error!(error = %e, "Drive loop aborted"),
        }
        result
    }

    async fn start_threaded_parts(&mut self) -> Result<(), VehicleError> {
        for entry in self.parts.iter_mut().filter(|e| e.wiring.threaded) {
            debug!(part = entry.part.name(), "Starting threaded part");
            entry
                .part
                .start()
                .await
                .map_err(|source| VehicleError::Part {
                    part: entry.part.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn drive(&mut self, max_loop_count: Option<u64>) -> Result<RunSummary, VehicleError> {
        let period = Duration::from_micros(self.timing.period_us() as u64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!(rate_hz = self.timing.rate_hz, "Starting drive loop");
        let mut ticks = 0u64;
        let mut last_tick_start: Option<Instant> = None;
        let reason = loop {
            if max_loop_count.is_some_and(|max| ticks >= max) {
                break StopReason::LoopCountReached;
            }
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut ctrl_c => {
                    info!("Interrupted, stopping drive loop");
                    break StopReason::Interrupted;
                }
            }

            let tick_start = Instant::now();
            if let Some(last) = last_tick_start {
                let actual_us = micros(tick_start.duration_since(last));
                if !self.loop_stats.record_period(actual_us, &self.timing) {
                    warn!(
                        tick = ticks,
                        actual_us,
                        period_us = self.timing.period_us(),
                        "Jitter violation: tick period outside tolerance"
                    );
                }
            }
            last_tick_start = Some(tick_start);

            self.update_parts().await?;
            let tick_us = micros(tick_start.elapsed());

            self.loop_stats.record_tick(tick_us, &self.timing);
            if !self.timing.is_within_budget(tick_us) {
                warn!(
                    tick = ticks,
                    tick_us,
                    period_us = self.timing.period_us(),
                    "Tick overran the loop period"
                );
            }
            ticks += 1;
        };

        Ok(RunSummary {
            ticks,
            reason,
            stats: self.loop_stats,
        })
    }

    /// Run every part once (one tick).
    pub async fn update_parts(&mut self) -> Result<(), VehicleError> {
        let target_us = self.timing.period_us();
        let budget_us = self.timing.budget_us();

        for entry in self.parts.iter_mut() {
            if let Some(condition) = &entry.wiring.run_condition {
                if self.memory.get_one(condition).as_bool() != Some(true) {
                    entry.stats.record_skip();
                    continue;
                }
            }

            let inputs = self.memory.get(&entry.wiring.inputs);
            let started = Instant::now();
            let outputs = entry
                .part
                .run(&inputs)
                .await
                .map_err(|source| VehicleError::Part {
                    part: entry.part.name().to_string(),
                    source,
                })?;

            let period_us = entry
                .last_run
                .map(|last| micros(started.duration_since(last)))
                .unwrap_or(target_us);
            entry.last_run = Some(started);
            entry
                .stats
                .update(micros(started.elapsed()), period_us, target_us, budget_us);

            if entry.wiring.outputs.is_empty() {
                continue;
            }
            self.memory
                .put(&entry.wiring.outputs, outputs)
                .map_err(|(expected, actual)| VehicleError::OutputMismatch {
                    part: entry.part.name().to_string(),
                    expected,
                    actual,
                })?;
        }
        Ok(())
    }

    /// Shut every part down in order and log timing statistics.
    pub async fn stop(&mut self) {
        info!("Shutting down parts");
        for entry in self.parts.iter_mut() {
            if let Err(e) = entry.part.shutdown().await {
                warn!(part = entry.part.name(), error = %e, "Part shutdown failed");
            }
        }

        let stats: Vec<PartStats> = self.parts.iter().map(|e| e.stats).collect();
        self.loop_stats.update_overruns(&stats);
        for entry in &self.parts {
            info!(
                part = entry.part.name(),
                runs = entry.stats.execution_count,
                skipped = entry.stats.skipped_count,
                avg_us = entry.stats.avg_execution_us,
                max_us = entry.stats.max_execution_us,
                overruns = entry.stats.overruns,
                "Part timing"
            );
        }
        info!(
            ticks = self.loop_stats.tick_count,
            late_ticks = self.loop_stats.late_ticks,
            jitter_violations = self.loop_stats.jitter_violations,
            utilization = self.loop_stats.utilization_percent,
            "Loop timing"
        );
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        Self::new()
    }
}

fn micros(d: Duration) -> u32 {
    d.as_micros().min(u32::MAX as u128) as u32
}
