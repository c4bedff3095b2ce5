//! Fixed-timestep simulation clock
//!
//! Host frames arrive with arbitrary jitter; the clock turns their wall-clock
//! deltas into a whole number of fixed logical steps using an accumulator.
//! Time is kept as `Duration` (integer nanoseconds) so the number of steps
//! for a given total delivered time does not depend on how it was sliced.

use std::time::Duration;

use crate::settings::Settings;

/// Fixed-step accumulator driving update-then-render
#[derive(Debug, Clone)]
pub struct FixedClock {
    step: Duration,
    max_substeps: u32,
    max_frame_delta: Duration,
    accumulator: Duration,
    armed: bool,
    cancelled: bool,
    ticks: u64,
    dropped: Duration,
}

impl FixedClock {
    pub fn new(tick_rate_hz: u32, max_substeps: u32, max_frame_delta: Duration) -> Self {
        let rate = u64::from(tick_rate_hz.max(1));
        Self {
            step: Duration::from_nanos((1_000_000_000 + rate / 2) / rate),
            max_substeps: max_substeps.max(1),
            max_frame_delta,
            accumulator: Duration::ZERO,
            armed: false,
            cancelled: false,
            ticks: 0,
            dropped: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.tick_rate_hz,
            settings.max_substeps,
            secs_to_duration(settings.max_frame_delta),
        )
    }

    /// Length of one logical step
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Start delivering ticks. Has no effect once cancelled.
    pub fn arm(&mut self) -> bool {
        if self.cancelled {
            log::debug!("clock arm ignored: cancelled");
            return false;
        }
        self.armed = true;
        true
    }

    /// Stop delivering ticks; any partial step is discarded so resuming does
    /// not replay paused wall-clock time.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.accumulator = Duration::ZERO;
    }

    /// Permanently stop the clock. Safe to call any number of times.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            log::debug!("clock cancelled after {} ticks", self.ticks);
        }
        self.cancelled = true;
        self.disarm();
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Reset tick counter and accumulator for a fresh session
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.ticks = 0;
        self.dropped = Duration::ZERO;
    }

    /// Feed a frame's wall-clock delta; returns how many fixed steps to run.
    pub fn advance(&mut self, frame_dt: Duration) -> u32 {
        if !self.armed {
            return 0;
        }

        let mut accumulator = self.accumulator + frame_dt.min(self.max_frame_delta);
        let mut steps = 0u32;
        while accumulator >= self.step && steps < self.max_substeps {
            accumulator -= self.step;
            steps += 1;
        }

        // Drop backlog we cannot catch up on (spiral-of-death guard)
        if accumulator >= self.step {
            self.dropped += accumulator;
            log::trace!("clock dropped {:?} of backlog", accumulator);
            accumulator = Duration::ZERO;
        }

        self.accumulator = accumulator;
        self.ticks += u64::from(steps);
        steps
    }

    /// Convenience for hosts that measure frames in seconds
    pub fn advance_secs(&mut self, frame_dt: f32) -> u32 {
        self.advance(secs_to_duration(frame_dt))
    }

    /// Logical steps delivered since the last reset
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated time: delivered steps times the step length
    pub fn simulated_elapsed(&self) -> Duration {
        self.step * self.ticks.min(u64::from(u32::MAX)) as u32
    }

    /// Fraction of a step waiting in the accumulator (render interpolation)
    pub fn interpolation(&self) -> f32 {
        self.accumulator.as_secs_f32() / self.step.as_secs_f32()
    }

    /// Total wall-clock backlog discarded by the substep cap
    pub fn dropped(&self) -> Duration {
        self.dropped
    }
}

/// Converts host timestamps (milliseconds, e.g. rAF) into frame deltas
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    last_ms: Option<f64>,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta since the previous call; the first call yields zero.
    pub fn delta(&mut self, now_ms: f64) -> Duration {
        let delta = match self.last_ms {
            Some(last) if now_ms.is_finite() && now_ms > last => {
                Duration::from_secs_f64((now_ms - last) / 1000.0)
            }
            _ => Duration::ZERO,
        };
        if now_ms.is_finite() {
            self.last_ms = Some(now_ms);
        }
        delta
    }

    /// Forget the previous timestamp (after pause or tab switch)
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

fn secs_to_duration(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> FixedClock {
        let mut clock = FixedClock::new(60, 8, Duration::from_millis(250));
        clock.arm();
        clock
    }

    #[test]
    fn test_unarmed_clock_delivers_nothing() {
        let mut clock = FixedClock::new(60, 8, Duration::from_millis(250));
        assert_eq!(clock.advance(Duration::from_secs(1)), 0);
        assert_eq!(clock.ticks(), 0);
    }

    #[test]
    fn test_jitter_does_not_change_simulated_time() {
        let mut steady = clock();
        let mut jittery = clock();
        let step = steady.step();

        // 120 steps of wall time delivered evenly...
        let mut steady_steps = 0;
        for _ in 0..120 {
            steady_steps += steady.advance(step);
        }

        // ...and in lumpy, delayed frames with the same total
        let pattern = [0u32, 3, 0, 0, 1, 2, 0, 4, 2];
        let mut jitter_steps = 0;
        let mut delivered = 0u32;
        let mut i = 0;
        while delivered < 120 {
            let n = pattern[i % pattern.len()].min(120 - delivered);
            jitter_steps += jittery.advance(step * n);
            delivered += n;
            i += 1;
        }

        assert_eq!(steady_steps, 120);
        assert_eq!(jitter_steps, 120);
        assert_eq!(steady.simulated_elapsed(), jittery.simulated_elapsed());
        // Each logical step covers exactly one step of simulated time
        assert_eq!(steady.simulated_elapsed(), step * 120);
    }

    #[test]
    fn test_partial_steps_accumulate() {
        let mut clock = clock();
        let half = clock.step() / 2;
        assert_eq!(clock.advance(half), 0);
        assert!((clock.interpolation() - 0.5).abs() < 1e-3);
        let rest = clock.step() - half;
        assert_eq!(clock.advance(rest), 1);
    }

    #[test]
    fn test_substep_cap_drops_backlog() {
        let mut clock = FixedClock::new(60, 4, Duration::from_secs(10));
        clock.arm();
        let steps = clock.advance(Duration::from_secs(1));
        assert_eq!(steps, 4);
        assert!(clock.dropped() > Duration::ZERO);
        assert_eq!(clock.interpolation(), 0.0);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut clock = FixedClock::new(60, 100, Duration::from_millis(100));
        clock.arm();
        // A 5 second stall only counts as 100ms: five whole steps at 60 Hz
        assert_eq!(clock.advance(Duration::from_secs(5)), 5);
    }

    #[test]
    fn test_cancel_is_idempotent_and_final() {
        let mut clock = clock();
        clock.cancel();
        clock.cancel();
        assert!(!clock.is_armed());
        assert!(!clock.arm());
        assert_eq!(clock.advance(Duration::from_secs(1)), 0);
    }

    #[test]
    fn test_disarm_discards_partial_step() {
        let mut clock = clock();
        clock.advance(clock.step() * 3 / 4);
        clock.disarm();
        clock.arm();
        assert_eq!(clock.advance(clock.step() / 2), 0);
    }

    #[test]
    fn test_advance_secs_ignores_bad_deltas() {
        let mut clock = clock();
        assert_eq!(clock.advance_secs(-1.0), 0);
        assert_eq!(clock.advance_secs(f32::NAN), 0);
        assert_eq!(clock.advance_secs(0.06), 3);
    }

    #[test]
    fn test_frame_timer() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.delta(1000.0), Duration::ZERO);
        assert!((timer.delta(1016.0).as_secs_f64() - 0.016).abs() < 1e-6);
        timer.reset();
        assert_eq!(timer.delta(5000.0), Duration::ZERO);
        // Time going backwards yields zero
        assert_eq!(timer.delta(4000.0), Duration::ZERO);
    }
}
