//! # Hinterland Engine
//!
//! Headless entry point for Hinterland.
//!
//! Loads the engine configuration, then walks a player along a scripted
//! route while the world map streams chunks in and out around it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod route;
mod timing;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("hinterland=info".parse()?))
        .init();

    info!("Hinterland starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = config::EngineConfig::load();
    app::run(config)?;

    info!("Hinterland shutdown complete");
    Ok(())
}
