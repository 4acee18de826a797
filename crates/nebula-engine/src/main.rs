//! # Nebula
//!
//! Windowed host for the ambient background engines: a 2D canvas particle
//! system and a GPU point field, switchable from an overlay (Alt+B).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod renderer;
mod timing;
mod ui;
mod window_host;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("nebula=info".parse()?))
        .init();

    info!("Nebula starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    app::run()?;

    info!("Nebula shutdown complete");
    Ok(())
}
