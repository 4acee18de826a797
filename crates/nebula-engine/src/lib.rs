//! # Nebula Engine
//!
//! Hosts the ambient background behind an application window.
//!
//! This crate provides:
//! - [`BackgroundController`]: mounts one background engine, swaps engines
//!   and owns the control overlay
//! - Host adapters translating window input for the engines
//! - [`NebulaConfig`]: window and engine settings loaded from TOML
//!
//! The `nebula` binary wires these to a winit window, a wgpu compositor and
//! an egui overlay.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod adapters;
pub mod config;
pub mod controller;
pub mod overlay;

mod e2e_tests;

pub use adapters::{to_ndc, HostEvent, KeyPress};
pub use config::NebulaConfig;
pub use controller::{ActiveEngine, BackgroundController, ControllerSettings, EngineFactory};
pub use overlay::{OverlayState, OverlayView, HELP_TEXT};
