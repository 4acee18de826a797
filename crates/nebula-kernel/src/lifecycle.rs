//! Engine lifecycle state and frame timestamps.

/// Lifecycle of an engine: `Uninitialized → Running → Disposed`.
///
/// `R` is whatever the engine owns while running. Disposal moves it out so
/// the engine can release it, and the state can never return to `Running`.
#[derive(Debug, Default)]
pub enum Lifecycle<R> {
    /// Constructed but `init` has not succeeded yet.
    #[default]
    Uninitialized,
    /// Initialized and ticking.
    Running(R),
    /// Disposed. Every further call is ignored.
    Disposed,
}

impl<R> Lifecycle<R> {
    /// Whether the engine is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// Whether the engine has been disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Running state, if any.
    #[must_use]
    pub const fn running(&self) -> Option<&R> {
        match self {
            Self::Running(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable running state, if any.
    pub fn running_mut(&mut self) -> Option<&mut R> {
        match self {
            Self::Running(r) => Some(r),
            _ => None,
        }
    }

    /// Moves to `Disposed`, returning the running state if there was one.
    pub fn dispose(&mut self) -> Option<R> {
        match std::mem::replace(self, Self::Disposed) {
            Self::Running(r) => Some(r),
            _ => None,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The frame was simulated, drawn, and the next frame was requested.
    Rendered,
    /// The frame was simulated but nothing could be drawn; the loop continues.
    Skipped,
    /// The engine is not running; nothing happened and no frame was requested.
    Stopped,
}

/// Timestamp handed to a tick, in milliseconds of host time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct FrameTime {
    millis: f64,
}

impl FrameTime {
    /// Creates a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: f64) -> Self {
        Self { millis }
    }

    /// Creates a timestamp from seconds.
    #[must_use]
    pub fn from_secs(secs: f64) -> Self {
        Self {
            millis: secs * 1000.0,
        }
    }

    /// Milliseconds.
    #[must_use]
    pub const fn millis(self) -> f64 {
        self.millis
    }

    /// Seconds.
    #[must_use]
    pub fn secs(self) -> f64 {
        self.millis / 1000.0
    }
}
