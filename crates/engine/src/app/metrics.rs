use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub total_ticks: u64,
}

impl LoopMetricsSnapshot {
    fn over(ticks: u64, tick_time_sum: Duration, elapsed: Duration, total_ticks: u64) -> Self {
        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if ticks == 0 {
            0.0
        } else {
            (tick_time_sum.as_secs_f32() / ticks as f32) * 1000.0
        };
        Self {
            tps: ticks as f32 / elapsed_seconds,
            tick_time_ms,
            total_ticks,
        }
    }
}

/// Per-interval loop metrics plus running totals for the whole session.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    session_start: Instant,
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    total_ticks: u64,
    tick_time_sum: Duration,
    total_tick_time: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub(crate) fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            session_start: start,
            interval_start: start,
            interval,
            ticks: 0,
            total_ticks: 0,
            tick_time_sum: Duration::ZERO,
            total_tick_time: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_time: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_time);
        self.total_tick_time = self.total_tick_time.saturating_add(tick_time);
    }

    /// Closes the current interval once it has run its length.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }
        let snapshot = LoopMetricsSnapshot::over(
            u64::from(self.ticks),
            self.tick_time_sum,
            elapsed,
            self.total_ticks,
        );
        self.interval_start = now;
        self.ticks = 0;
        self.tick_time_sum = Duration::ZERO;
        Some(snapshot)
    }

    /// Averages since the accumulator started, independent of intervals.
    pub(crate) fn session_snapshot(&self, now: Instant) -> LoopMetricsSnapshot {
        LoopMetricsSnapshot::over(
            self.total_ticks,
            self.total_tick_time,
            now.saturating_duration_since(self.session_start),
            self.total_ticks,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_expected_values() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));

        for _ in 0..4 {
            accumulator.record_tick(Duration::from_millis(2));
        }

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.tick_time_ms - 2.0).abs() < 0.001);
        assert_eq!(snapshot.total_ticks, 4);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(2));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn session_snapshot_spans_every_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(1));
        accumulator.record_tick(Duration::from_millis(3));
        let _ = accumulator.maybe_snapshot(base + Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(2));

        let interval = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second interval");
        assert_eq!(interval.total_ticks, 3);
        assert!((interval.tps - 1.0).abs() < 0.05);

        let session = accumulator.session_snapshot(base + Duration::from_secs(2));
        assert_eq!(session.total_ticks, 3);
        assert!((session.tps - 1.5).abs() < 0.05);
        assert!((session.tick_time_ms - 2.0).abs() < 0.001);
    }

    #[test]
    fn session_snapshot_without_ticks_is_zeroed() {
        let base = Instant::now();
        let accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        let session = accumulator.session_snapshot(base);
        assert_eq!(session.total_ticks, 0);
        assert_eq!(session.tick_time_ms, 0.0);
        assert_eq!(session.tps, 0.0);
    }
}
