//! Frame timing for the impact demo
//!
//! Handles clamped frame deltas and the looping phase that drives the
//! before/after pose interpolation.

use serde::{Deserialize, Serialize};

/// Configuration for frame time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// How many simulated seconds pass per real second
    pub time_scale: f32,
    /// Maximum delta time so a stalled frame does not skip a whole cycle
    pub max_delta_time: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            max_delta_time: 0.25,
        }
    }
}

/// Frame time tracking
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    /// Configuration
    pub config: TimeConfig,
    /// Time since start in seconds
    pub total_time: f64,
    /// Delta time for this frame (clamped and scaled)
    pub delta_time: f32,
    /// Unscaled delta time
    pub unscaled_delta_time: f32,
    /// Frame counter
    pub frame_count: u64,
    /// Whether time is frozen
    pub paused: bool,
}

impl FrameClock {
    /// Create a new clock with custom config
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Update the clock with the raw delta from the previous frame
    pub fn update(&mut self, raw_delta: f32) {
        self.unscaled_delta_time = raw_delta.clamp(0.0, self.config.max_delta_time);
        self.frame_count += 1;

        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        self.delta_time = self.unscaled_delta_time * self.config.time_scale;
        self.total_time += self.delta_time as f64;
    }

    /// Toggle pause state
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Set the time scale (0.0 = frozen, 1.0 = normal, 2.0 = double speed)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.config.time_scale = scale.max(0.0);
    }
}

/// Position inside the looping animation cycle, always in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationPhase {
    value: f32,
    /// Seconds for one full before-to-after sweep
    cycle_seconds: f32,
}

impl Default for AnimationPhase {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AnimationPhase {
    /// Start a phase at 0 with the given cycle length.
    /// Non-positive cycle lengths fall back to one second.
    pub fn new(cycle_seconds: f32) -> Self {
        let cycle_seconds = if cycle_seconds > 0.0 { cycle_seconds } else { 1.0 };
        Self {
            value: 0.0,
            cycle_seconds,
        }
    }

    /// Current phase in `[0, 1)`
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn cycle_seconds(&self) -> f32 {
        self.cycle_seconds
    }

    /// Accumulate a frame delta and wrap back into `[0, 1)`
    pub fn advance(&mut self, delta: f32) {
        let next = (self.value + delta / self.cycle_seconds).rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative inputs
        self.value = if next >= 1.0 { 0.0 } else { next };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::default();
        clock.update(0.016);

        assert!(clock.delta_time > 0.0);
        assert_eq!(clock.frame_count, 1);

        clock.toggle_pause();
        clock.update(0.016);
        assert_eq!(clock.delta_time, 0.0);
        assert_eq!(clock.frame_count, 2);

        clock.toggle_pause();
        clock.update(0.016);
        assert!(clock.delta_time > 0.0);
    }

    #[test]
    fn test_frame_clock_clamps_stalls() {
        let mut clock = FrameClock::default();
        clock.update(3.0);
        assert_eq!(clock.delta_time, 0.25);

        clock.update(-1.0);
        assert_eq!(clock.delta_time, 0.0);
    }

    #[test]
    fn test_frame_clock_time_scale() {
        let mut clock = FrameClock::default();
        clock.set_time_scale(2.0);
        clock.update(0.1);
        assert!((clock.delta_time - 0.2).abs() < 1e-6);

        clock.set_time_scale(-3.0);
        assert_eq!(clock.config.time_scale, 0.0);
    }

    #[test]
    fn test_phase_wraps() {
        let mut phase = AnimationPhase::new(1.0);
        phase.advance(0.7);
        assert!((phase.value() - 0.7).abs() < 1e-6);

        phase.advance(0.5);
        assert!((phase.value() - 0.2).abs() < 1e-5);
        assert!(phase.value() < 1.0);
    }

    #[test]
    fn test_phase_cycle_length() {
        let mut phase = AnimationPhase::new(4.0);
        phase.advance(1.0);
        assert!((phase.value() - 0.25).abs() < 1e-6);

        let fallback = AnimationPhase::new(0.0);
        assert_eq!(fallback.cycle_seconds(), 1.0);
    }
}
