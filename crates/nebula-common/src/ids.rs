//! ID types for host and GPU resources.
//!
//! Every resource an engine acquires from its host or device is named by
//! one of these handles so that release can be verified and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Global counter for drawing surface IDs.
static SURFACE_COUNTER: AtomicU64 = AtomicU64::new(1);

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name($inner);

        impl $name {
            /// Creates a handle from a raw value.
            #[must_use]
            pub const fn from_raw(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw handle value.
            #[must_use]
            pub const fn raw(self) -> $inner {
                self.0
            }
        }
    };
}

handle_type!(
    /// A registered host event listener.
    ListenerId(u32)
);

handle_type!(
    /// A pending animation-frame request.
    FrameHandle(u64)
);

handle_type!(
    /// A GPU buffer owned by a device.
    BufferId(u32)
);

handle_type!(
    /// A compiled GPU program (shader pair plus pipeline state).
    ProgramId(u32)
);

/// Identifies one drawing surface attached to a host layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Creates a new unique surface ID.
    #[must_use]
    pub fn new() -> Self {
        Self(SURFACE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}
