//! # Nebula Kernel
//!
//! The two ambient background engines and the seams they draw through.
//!
//! This crate provides:
//! - [`Particle2DEngine`]: a CPU particle simulation drawn on a 2D canvas
//! - [`GpuParticleField`]: an instanced 3D point field inside a nebula shell
//! - Host-window, canvas and GPU device traits the engines are written against
//! - wgpu backends for the canvas and the device
//!
//! ## Lifecycle
//!
//! Every engine is `Uninitialized → Running → Disposed`. Running engines
//! own exactly one drawing surface, one listener per input kind and at most
//! one pending animation frame. `dispose` returns all of them to the host
//! and is idempotent.
//!
//! ## Frames
//!
//! The host delivers animation frames by calling `tick`. Resizes are
//! recorded when they arrive and applied at the start of the next tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod batch;
pub mod canvas;
pub mod gpu;
pub mod host;
pub mod layer;
pub mod lifecycle;
pub mod particle;
pub mod particles_2d;
pub mod pool;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod variant;
pub mod wgpu_canvas;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::canvas::*;
    pub use crate::gpu::{FieldSettings, GpuDevice, GpuParticleField, WgpuDevice};
    pub use crate::host::*;
    pub use crate::layer::*;
    pub use crate::lifecycle::*;
    pub use crate::particles_2d::*;
    pub use crate::pool::*;
    pub use crate::variant::*;
    pub use crate::wgpu_canvas::*;
}

pub use prelude::*;
