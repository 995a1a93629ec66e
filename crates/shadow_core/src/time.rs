//! Frame timing

use std::time::{Duration, Instant};

/// Timing information for a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Frame counter, starting at 1 for the first ticked frame
    pub frame: u64,
    /// Seconds since the previous frame
    pub delta: f32,
    /// Seconds since the clock started
    pub elapsed: f64,
}

impl FrameTime {
    /// Delta time in milliseconds
    pub fn delta_ms(&self) -> f64 {
        self.delta as f64 * 1000.0
    }
}

/// Measures frame-to-frame time for the main loop
pub struct FrameClock {
    start: Instant,
    last: Instant,
    elapsed: Duration,
    frame: u64,
    max_delta: Duration,
}

impl FrameClock {
    /// Create a clock starting now
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            elapsed: Duration::ZERO,
            frame: 0,
            max_delta: Duration::from_millis(250),
        }
    }

    /// Clamp large deltas (debugger pauses, lag spikes) to `max`
    pub fn with_max_delta(mut self, max: Duration) -> Self {
        self.max_delta = max;
        self
    }

    /// Advance by wall-clock time since the previous tick
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = now.duration_since(self.last);
        self.last = now;
        self.advance(delta)
    }

    /// Advance by an explicit amount
    pub fn advance(&mut self, delta: Duration) -> FrameTime {
        let delta = delta.min(self.max_delta);
        self.elapsed += delta;
        self.frame += 1;
        FrameTime {
            frame: self.frame,
            delta: delta.as_secs_f32(),
            elapsed: self.elapsed.as_secs_f64(),
        }
    }

    /// Number of frames ticked so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Wall-clock time since the clock was created
    pub fn since_start(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
