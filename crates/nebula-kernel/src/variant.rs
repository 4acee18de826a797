//! Engine variant selector.

use serde::{Deserialize, Serialize};

/// Which background engine is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineVariant {
    /// CPU 2D particle system.
    #[default]
    Particles2D,
    /// GPU 3D point field.
    GpuField,
}

impl EngineVariant {
    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Particles2D => "2D particles",
            Self::GpuField => "GPU particle field",
        }
    }

    /// The variant a toggle switches to.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Particles2D => Self::GpuField,
            Self::GpuField => Self::Particles2D,
        }
    }
}
