//! # Nebula Common
//!
//! Common types shared by the Nebula background engines.
//!
//! This crate provides:
//! - The engine error taxonomy
//! - HSL/RGBA color math
//! - Handle types for listeners, frames, buffers, programs and surfaces
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod color;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::color::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
