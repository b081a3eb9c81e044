//! Core types for the drive loop scheduler
//!
//! - Loop timing (configured rate)
//! - Part statistics (runtime monitoring)
//! - Loop statistics (global metrics)

/// Fixed-rate loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Target loop rate in Hz (1-1000)
    pub rate_hz: u32,
}

impl LoopTiming {
    /// Highest supported loop rate
    pub const MAX_RATE_HZ: u32 = 1000;

    pub const fn new(rate_hz: u32) -> Self {
        Self { rate_hz }
    }

    /// Loop period in microseconds
    #[inline]
    pub const fn period_us(&self) -> u32 {
        if self.rate_hz == 0 {
            return 0;
        }
        1_000_000 / self.rate_hz
    }

    /// Execution budget for one tick: the whole period
    #[inline]
    pub const fn budget_us(&self) -> u32 {
        self.period_us()
    }

    /// Check if a tick finished within its period
    #[inline]
    pub const fn is_within_budget(&self, execution_us: u32) -> bool {
        execution_us <= self.budget_us()
    }

    /// Check if period deviation is within tolerance (5%)
    #[inline]
    pub fn is_period_acceptable(&self, actual_period_us: u32) -> bool {
        let target = self.period_us();
        let tolerance = target / 20;
        let lower = target.saturating_sub(tolerance);
        let upper = target.saturating_add(tolerance);
        actual_period_us >= lower && actual_period_us <= upper
    }
}

/// Timing of one part across ticks
///
/// Execution time and the gap between consecutive runs are smoothed with
/// an EMA (new = (sample + 9 * old) / 10). The first sample seeds the
/// average.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartStats {
    /// Duration of the latest `run` call (us)
    pub last_execution_us: u32,
    /// Smoothed `run` duration (us)
    pub avg_execution_us: u32,
    /// Slowest `run` seen (us)
    pub max_execution_us: u32,
    /// Runs that took longer than the tick budget
    pub overruns: u32,
    /// Gap between the latest two runs (us)
    pub last_period_us: u32,
    /// Smoothed distance of that gap from the loop period (us)
    pub avg_jitter_us: u32,
    /// Runs performed
    pub execution_count: u64,
    /// Ticks on which the run condition held the part back
    pub skipped_count: u64,
}

impl PartStats {
    /// Fold in one `run` call.
    ///
    /// `period_us` is the time since the part last ran, `target_period_us`
    /// the loop period and `budget_us` the longest acceptable run.
    pub fn update(
        &mut self,
        execution_us: u32,
        period_us: u32,
        target_period_us: u32,
        budget_us: u32,
    ) {
        self.execution_count = self.execution_count.saturating_add(1);
        self.last_execution_us = execution_us;
        self.last_period_us = period_us;
        self.max_execution_us = self.max_execution_us.max(execution_us);
        if execution_us > budget_us {
            self.overruns = self.overruns.saturating_add(1);
        }

        self.avg_execution_us = smooth(self.avg_execution_us, execution_us);
        self.avg_jitter_us = smooth(self.avg_jitter_us, period_us.abs_diff(target_period_us));
    }

    /// Count a tick where the part did not run
    pub fn record_skip(&mut self) {
        self.skipped_count = self.skipped_count.saturating_add(1);
    }
}

/// EMA step; a zero average takes the sample as is.
#[inline]
fn smooth(avg: u32, sample: u32) -> u32 {
    if avg == 0 {
        return sample;
    }
    ((sample as u64 + 9 * avg as u64) / 10) as u32
}

/// Global drive loop statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopStats {
    /// Share of the period spent running parts (0-100)
    pub utilization_percent: u8,

    /// Total overruns across all parts
    pub total_overruns: u32,

    /// Ticks over the loop period
    pub late_ticks: u32,

    /// Tick starts more than 5 % away from the loop period
    pub jitter_violations: u32,

    /// Completed ticks
    pub tick_count: u64,
}

impl LoopStats {
    /// Record one completed tick
    pub fn record_tick(&mut self, tick_us: u32, timing: &LoopTiming) {
        self.tick_count = self.tick_count.saturating_add(1);
        if !timing.is_within_budget(tick_us) {
            self.late_ticks = self.late_ticks.saturating_add(1);
        }
        self.update_utilization(tick_us as u64, timing.period_us() as u64);
    }

    /// Record the gap between two tick starts.
    ///
    /// Returns `false` (and counts a violation) when the gap is outside
    /// the 5 % tolerance.
    pub fn record_period(&mut self, period_us: u32, timing: &LoopTiming) -> bool {
        let ok = timing.is_period_acceptable(period_us);
        if !ok {
            self.jitter_violations = self.jitter_violations.saturating_add(1);
        }
        ok
    }

    /// Update utilization percentage
    ///
    /// # Arguments
    ///
    /// * `busy_us` - Time spent running parts in the window
    /// * `window_us` - Duration of the window in microseconds
    pub fn update_utilization(&mut self, busy_us: u64, window_us: u64) {
        if window_us > 0 {
            let load = (busy_us * 100) / window_us;
            self.utilization_percent = load.min(100) as u8;
        }
    }

    /// Sum overruns from all parts
    pub fn update_overruns(&mut self, part_stats: &[PartStats]) {
        self.total_overruns = part_stats.iter().map(|s| s.overruns).sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_timing_period_calculation() {
        assert_eq!(LoopTiming::new(20).period_us(), 50_000);
        assert_eq!(LoopTiming::new(400).period_us(), 2500);
        assert_eq!(LoopTiming::new(0).period_us(), 0);
    }

    #[test]
    fn test_loop_timing_budget_check() {
        let timing = LoopTiming::new(20);
        assert!(timing.is_within_budget(49_999));
        assert!(timing.is_within_budget(50_000));
        assert!(!timing.is_within_budget(50_001));
    }

    #[test]
    fn test_loop_timing_period_tolerance() {
        let timing = LoopTiming::new(20); // 50_000us, 5% = 2500us

        assert!(timing.is_period_acceptable(50_000));
        assert!(timing.is_period_acceptable(47_500));
        assert!(timing.is_period_acceptable(52_500));
        assert!(!timing.is_period_acceptable(46_000));
        assert!(!timing.is_period_acceptable(54_000));
    }

    #[test]
    fn test_part_stats_camera_read_at_20hz() {
        let timing = LoopTiming::new(20);
        let (target, budget) = (timing.period_us(), timing.budget_us());
        let mut stats = PartStats::default();

        stats.update(800, target, target, budget);
        assert_eq!(
            (stats.last_execution_us, stats.avg_execution_us, stats.max_execution_us),
            (800, 800, 800)
        );
        assert_eq!(stats.avg_jitter_us, 0);
        assert_eq!(stats.overruns, 0);

        // One slow frame pulls the average up by a tenth
        stats.update(1800, target, target, budget);
        assert_eq!(stats.avg_execution_us, 900);
        assert_eq!(stats.max_execution_us, 1800);

        // Frame slower than the whole loop period
        stats.update(51_000, target, target, budget);
        assert_eq!(stats.max_execution_us, 51_000);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.execution_count, 3);
    }

    #[test]
    fn test_part_stats_tracks_late_ticks_as_jitter() {
        let mut stats = PartStats::default();

        stats.update(100, 53_000, 50_000, 50_000);
        assert_eq!(stats.avg_jitter_us, 3000);
        assert_eq!(stats.last_period_us, 53_000);

        // Early tick counts the same as a late one
        stats.update(100, 48_000, 50_000, 50_000);
        assert_eq!(stats.avg_jitter_us, 2900);
    }

    #[test]
    fn test_part_stats_counts_skips_separately() {
        let mut stats = PartStats::default();
        stats.record_skip();
        stats.record_skip();
        stats.update(10, 50_000, 50_000, 50_000);
        assert_eq!(stats.skipped_count, 2);
        assert_eq!(stats.execution_count, 1);
    }

    #[test]
    fn test_loop_stats_record_period() {
        let timing = LoopTiming::new(20);
        let mut stats = LoopStats::default();

        assert!(stats.record_period(51_000, &timing));
        assert!(stats.record_period(48_000, &timing));
        assert_eq!(stats.jitter_violations, 0);

        assert!(!stats.record_period(60_000, &timing));
        assert!(!stats.record_period(30_000, &timing));
        assert_eq!(stats.jitter_violations, 2);
    }

    #[test]
    fn test_loop_stats_utilization() {
        let mut stats = LoopStats::default();

        stats.update_utilization(500, 1000);
        assert_eq!(stats.utilization_percent, 50);

        stats.update_utilization(1200, 1000);
        assert_eq!(stats.utilization_percent, 100);

        stats.update_utilization(50, 1000);
        assert_eq!(stats.utilization_percent, 5);

        // Zero window leaves the value untouched
        stats.update_utilization(50, 0);
        assert_eq!(stats.utilization_percent, 5);
    }

    #[test]
    fn test_loop_stats_record_tick() {
        let timing = LoopTiming::new(20);
        let mut stats = LoopStats::default();

        stats.record_tick(25_000, &timing);
        assert_eq!(stats.tick_count, 1);
        assert_eq!(stats.late_ticks, 0);
        assert_eq!(stats.utilization_percent, 50);

        stats.record_tick(60_000, &timing);
        assert_eq!(stats.tick_count, 2);
        assert_eq!(stats.late_ticks, 1);
        assert_eq!(stats.utilization_percent, 100);
    }

    #[test]
    fn test_loop_stats_overruns() {
        let mut stats = LoopStats::default();
        let parts = [
            PartStats {
                overruns: 5,
                ..Default::default()
            },
            PartStats {
                overruns: 3,
                ..Default::default()
            },
        ];
        stats.update_overruns(&parts);
        assert_eq!(stats.total_overruns, 8);
    }
}
