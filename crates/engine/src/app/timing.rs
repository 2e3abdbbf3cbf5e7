//! Tick-driven timing primitives.
//!
//! Every suspension in the shop is a state holding one of these plus a
//! resumption check made once per fixed tick.

/// Runs once from zero to `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    duration_seconds: f32,
    elapsed_seconds: f32,
}

impl Countdown {
    pub fn new(duration_seconds: f32) -> Self {
        Self {
            duration_seconds: sanitize_seconds(duration_seconds),
            elapsed_seconds: 0.0,
        }
    }

    /// Advances the countdown and reports whether it has finished.
    pub fn tick(&mut self, fixed_dt_seconds: f32) -> bool {
        self.elapsed_seconds =
            (self.elapsed_seconds + sanitize_seconds(fixed_dt_seconds)).min(self.duration_seconds);
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_seconds >= self.duration_seconds
    }

    /// Linear progress in `[0, 1]`. A zero-length countdown is always complete.
    pub fn progress(&self) -> f32 {
        if self.duration_seconds <= 0.0 {
            return 1.0;
        }
        (self.elapsed_seconds / self.duration_seconds).clamp(0.0, 1.0)
    }

    pub fn remaining_seconds(&self) -> f32 {
        (self.duration_seconds - self.elapsed_seconds).max(0.0)
    }

    pub fn reset(&mut self) {
        self.elapsed_seconds = 0.0;
    }
}

/// Fires at a fixed interval; fires at most once per tick however large the
/// step, so a long hitch never produces a burst of polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollInterval {
    interval_seconds: f32,
    accumulated_seconds: f32,
}

impl PollInterval {
    pub fn new(interval_seconds: f32) -> Self {
        Self {
            interval_seconds: sanitize_seconds(interval_seconds),
            accumulated_seconds: 0.0,
        }
    }

    pub fn tick(&mut self, fixed_dt_seconds: f32) -> bool {
        self.accumulated_seconds += sanitize_seconds(fixed_dt_seconds);
        if self.accumulated_seconds + f32::EPSILON < self.interval_seconds {
            return false;
        }
        self.accumulated_seconds = 0.0;
        true
    }

    pub fn reset(&mut self) {
        self.accumulated_seconds = 0.0;
    }

    pub fn interval_seconds(&self) -> f32 {
        self.interval_seconds
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stopwatch {
    elapsed_seconds: f32,
}

impl Stopwatch {
    pub fn tick(&mut self, fixed_dt_seconds: f32) {
        self.elapsed_seconds += sanitize_seconds(fixed_dt_seconds);
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }

    pub fn reset(&mut self) {
        self.elapsed_seconds = 0.0;
    }
}

/// Smoothstep easing on `[0, 1]`.
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn sanitize_seconds(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
