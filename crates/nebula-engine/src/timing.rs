//! Frame timestamps and FPS tracking.

use std::time::{Duration, Instant};

use nebula_kernel::FrameTime;

/// Monotonic frame clock, in milliseconds since the window was created.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    origin: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Starts the clock now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Restarts from zero.
    pub fn reset(&mut self) {
        self.origin = Instant::now();
    }

    /// Timestamp for a frame delivered now.
    #[must_use]
    pub fn now(&self) -> FrameTime {
        self.at(Instant::now())
    }

    /// Timestamp for a frame delivered at `instant`. Instants before the
    /// origin read as zero.
    #[must_use]
    pub fn at(&self, instant: Instant) -> FrameTime {
        let elapsed = instant.saturating_duration_since(self.origin);
        FrameTime::from_millis(elapsed.as_secs_f64() * 1000.0)
    }
}

/// FPS counter for the overlay.
#[derive(Debug)]
pub struct FpsCounter {
    /// Frame count since last update
    frame_count: u32,
    /// Time of last FPS calculation
    last_update: Instant,
    /// Update interval
    update_interval: Duration,
    /// Current FPS value
    current_fps: f32,
    /// Current frame time in ms
    current_frame_time: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    /// Create a new FPS counter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            last_update: Instant::now(),
            update_interval: Duration::from_millis(500),
            current_fps: 0.0,
            current_frame_time: 0.0,
        }
    }

    /// Tick the counter. Returns (fps, frame_time_ms) as of the last update.
    pub fn tick(&mut self) -> (f32, f32) {
        self.frame_count += 1;

        let elapsed = self.last_update.elapsed();
        if elapsed >= self.update_interval {
            let secs = elapsed.as_secs_f32();
            self.current_fps = self.frame_count as f32 / secs;
            self.current_frame_time = (secs / self.frame_count as f32) * 1000.0;
            self.frame_count = 0;
            self.last_update = Instant::now();
        }

        (self.current_fps, self.current_frame_time)
    }
}
